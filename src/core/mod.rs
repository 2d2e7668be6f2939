pub mod backends;
pub mod codec;
pub mod coordinator;
pub mod runtime;
pub mod session;

// Re-export commonly used types for convenience
pub use backends::{BackendKind, BackendRegistry, LookupBackend};
pub use codec::{AudioFrame, FrameCodec, OutboundFrame, WireEvent};
pub use coordinator::{ToolCoordinator, ToolOutcome, ToolResult};
pub use runtime::{ConversationRuntime, RuntimeError, RuntimeFactory};
pub use session::{OutboundSink, SessionRoute, SessionRouting};
