pub mod outbound;
pub mod routing;

pub use outbound::{DEFAULT_SEND_TIMEOUT, OutboundSink, SessionRoute, SinkError};
pub use routing::{RoutingTarget, SessionRouting};
