//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `session` - Voice session WebSocket

pub mod api;
pub mod session;

pub use session::session_handler;
