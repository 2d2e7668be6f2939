pub mod auth;

// Re-export middleware functions
pub use auth::{Auth, auth_middleware};
