//! Audio frame codec
//!
//! Converts between the JSON wire protocol (base64 PCM media events and
//! control messages) and raw PCM frames, resampling between the wire's
//! target rate and the conversational runtime's native rate.

pub mod frame;
pub mod resampler;
pub mod serializer;
pub mod wire;

pub use frame::{AudioFrame, OutboundFrame};
pub use resampler::{ResampleError, StreamResampler};
pub use serializer::{
    CLIP_DAMPING, CLIP_THRESHOLD, CodecConfig, CodecError, CodecResult, DEFAULT_TARGET_SAMPLE_RATE,
    FrameCodec, MAX_ENCODED_MEDIA_CHARS, MIN_FRAME_BYTES,
};
pub use wire::{ControlMessage, SessionConfigMessage, WireEvent};
