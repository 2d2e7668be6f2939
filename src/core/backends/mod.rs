//! External lookup backends reachable through the tool-call coordinator.

pub mod accounts;
pub mod agent;
pub mod base;
pub mod knowledge_base;

pub use accounts::{AccountBackend, AccountQuery, AccountSource};
pub use agent::AgentBackend;
pub use base::{
    BackendError, BackendKind, BackendRegistry, BackendResult, LookupBackend, LookupHit,
    LookupRequest, LookupResponse,
};
pub use knowledge_base::KnowledgeBaseBackend;
