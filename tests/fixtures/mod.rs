//! Test Fixtures Module
//!
//! Shared helpers for the integration tests:
//! - Audio fixtures (programmatically generated PCM)
//! - Lookup backend doubles
//! - Account records and account sources
//! - A scripted conversational runtime

// Each test binary uses a different subset of the fixtures
#![allow(dead_code)]

pub mod account_fixtures;
pub mod audio_fixtures;
pub mod backend_fixtures;
pub mod runtime_fixtures;

pub use account_fixtures::*;
pub use audio_fixtures::*;
pub use backend_fixtures::*;
pub use runtime_fixtures::*;
