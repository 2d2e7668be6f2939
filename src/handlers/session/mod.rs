//! Voice session WebSocket handlers
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **Text frames**: `{"event":"media","data":"<base64 pcm16>"}`, bare base64
//!   PCM, or `{"type":"config",...}` / `{"type":"ping"}` control messages
//! - **Binary frames**: raw PCM16LE mono at the target sample rate
//!
//! ## Server → Client
//!
//! - **media**: synthesized speech at the target sample rate
//! - **stop**: barge-in, discard queued playback
//! - **kb_processing**: a lookup has started
//! - **knowledge_base**: lookup result for display

mod handler;

pub use handler::{IDLE_TIMEOUT, SessionParams, handle_session, session_handler};
