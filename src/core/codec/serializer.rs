//! Per-session frame codec.
//!
//! Converts between wire messages and PCM frames, owning one resampling
//! context per direction. Encoding suppresses degenerate audio quietly;
//! decoding drops malformed input quietly but surfaces resampling failures.

use base64::{Engine, prelude::BASE64_STANDARD};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::frame::{
    AudioFrame, BYTES_PER_SAMPLE, OutboundFrame, bytes_to_samples, is_silent, peak_amplitude,
    samples_to_bytes, scale,
};
use super::resampler::{ResampleError, StreamResampler};
use super::wire::{ControlMessage, WireEvent};
use crate::core::session::SessionRouting;

/// Wire audio sample rate unless configured otherwise.
pub const DEFAULT_TARGET_SAMPLE_RATE: u32 = 16_000;

/// Outbound frames shorter than this are dropped.
pub const MIN_FRAME_BYTES: usize = 32;

/// Hard ceiling on the base64 payload of one media event.
pub const MAX_ENCODED_MEDIA_CHARS: usize = 1_000_000;

/// Peak magnitude at or above which a frame is damped.
pub const CLIP_THRESHOLD: u16 = 30_000;

/// Gain applied to frames that reach the clip threshold.
pub const CLIP_DAMPING: f32 = 0.8;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Inbound resampling failed: {0}")]
    Resample(#[from] ResampleError),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Sample rates negotiated for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Rate of all audio on the wire.
    pub target_sample_rate: u32,
    /// Rate the conversational runtime consumes.
    pub native_sample_rate: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: DEFAULT_TARGET_SAMPLE_RATE,
            native_sample_rate: DEFAULT_TARGET_SAMPLE_RATE,
        }
    }
}

pub struct FrameCodec {
    config: CodecConfig,
    inbound: StreamResampler,
    outbound: StreamResampler,
    routing: Option<SessionRouting>,
}

impl FrameCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            inbound: StreamResampler::new(),
            outbound: StreamResampler::new(),
            routing: None,
        }
    }

    /// Apply `config` control messages to this routing handle.
    pub fn with_routing(mut self, routing: SessionRouting) -> Self {
        self.routing = Some(routing);
        self
    }

    pub fn config(&self) -> CodecConfig {
        self.config
    }

    /// Encode an outbound frame or interruption.
    ///
    /// Returns `None` for audio that should not reach the wire.
    pub fn encode(&mut self, frame: OutboundFrame) -> Option<WireEvent> {
        match frame {
            OutboundFrame::Interruption => {
                self.outbound.reset();
                Some(WireEvent::Stop)
            }
            OutboundFrame::Audio(frame) => self.encode_audio(&frame),
        }
    }

    fn encode_audio(&mut self, frame: &AudioFrame) -> Option<WireEvent> {
        if frame.is_empty() {
            debug!("Dropping empty outbound frame");
            return None;
        }
        if frame.len() < MIN_FRAME_BYTES {
            debug!(bytes = frame.len(), "Dropping undersized outbound frame");
            return None;
        }
        if !frame.is_whole_samples() {
            warn!(bytes = frame.len(), "Dropping outbound frame with partial sample");
            return None;
        }

        let mut samples = frame.samples();
        if is_silent(&samples) {
            debug!(bytes = frame.len(), "Dropping silent outbound frame");
            return None;
        }

        let peak = peak_amplitude(&samples);
        if peak >= CLIP_THRESHOLD {
            scale(&mut samples, CLIP_DAMPING);
            debug!(peak, "Damped near-clipping outbound frame");
        }

        let target = self.config.target_sample_rate;
        if frame.sample_rate() != target {
            match self.outbound.resample(&samples, frame.sample_rate(), target) {
                Ok(resampled) if resampled.is_empty() => {
                    // Fully absorbed into the resampler carry; emitted with the next frame.
                    return None;
                }
                Ok(resampled) => samples = resampled,
                Err(e) => {
                    warn!(
                        error = %e,
                        from = frame.sample_rate(),
                        to = target,
                        "Outbound resampling failed, sending original audio"
                    );
                }
            }
        }

        let data = BASE64_STANDARD.encode(samples_to_bytes(&samples));
        if data.len() > MAX_ENCODED_MEDIA_CHARS {
            warn!(
                encoded_len = data.len(),
                limit = MAX_ENCODED_MEDIA_CHARS,
                "Dropping oversized outbound frame"
            );
            return None;
        }

        Some(WireEvent::Media { data })
    }

    /// Decode an inbound text frame.
    ///
    /// `Ok(None)` covers control messages and every malformed-input case.
    pub fn decode(&mut self, payload: &str) -> CodecResult<Option<AudioFrame>> {
        let payload = payload.trim();
        if payload.is_empty() {
            debug!("Ignoring empty inbound message");
            return Ok(None);
        }

        if payload.starts_with('{') {
            match serde_json::from_str::<Value>(payload) {
                Ok(value) => return self.decode_json(value),
                Err(e) => debug!(error = %e, "Inbound message is not JSON, trying base64"),
            }
        }

        self.decode_base64(payload)
    }

    /// Decode an inbound binary frame carrying raw PCM at the target rate.
    pub fn decode_pcm(&mut self, pcm: &[u8]) -> CodecResult<Option<AudioFrame>> {
        if pcm.is_empty() {
            debug!("Ignoring empty binary frame");
            return Ok(None);
        }
        if pcm.len() % BYTES_PER_SAMPLE != 0 {
            warn!(bytes = pcm.len(), "Dropping inbound audio with partial sample");
            return Ok(None);
        }

        let samples = bytes_to_samples(pcm);
        let CodecConfig {
            target_sample_rate,
            native_sample_rate,
        } = self.config;

        let samples = if native_sample_rate != target_sample_rate {
            self.inbound
                .resample(&samples, target_sample_rate, native_sample_rate)?
        } else {
            samples
        };

        if samples.is_empty() {
            return Ok(None);
        }

        Ok(Some(AudioFrame::from_samples(&samples, native_sample_rate)))
    }

    fn decode_base64(&mut self, data: &str) -> CodecResult<Option<AudioFrame>> {
        match BASE64_STANDARD.decode(data) {
            Ok(pcm) => self.decode_pcm(&pcm),
            Err(e) => {
                warn!(error = %e, "Dropping undecodable inbound message");
                Ok(None)
            }
        }
    }

    fn decode_json(&mut self, value: Value) -> CodecResult<Option<AudioFrame>> {
        if value.get("type").is_some() {
            match serde_json::from_value::<ControlMessage>(value) {
                Ok(control) => self.apply_control(control),
                Err(e) => warn!(error = %e, "Ignoring unrecognized control message"),
            }
            return Ok(None);
        }

        if value.get("event").is_some() {
            match serde_json::from_value::<WireEvent>(value) {
                Ok(WireEvent::Media { data }) => return self.decode_base64(&data),
                Ok(other) => debug!(?other, "Ignoring non-media inbound event"),
                Err(e) => warn!(error = %e, "Ignoring unrecognized inbound event"),
            }
            return Ok(None);
        }

        warn!("Ignoring unrecognized JSON message");
        Ok(None)
    }

    fn apply_control(&self, control: ControlMessage) {
        match control {
            ControlMessage::Ping => debug!("Received ping"),
            ControlMessage::Config(config) => {
                let target = config.routing_target();
                if target.is_none() {
                    debug!("Config message without agent identifiers");
                }
                match &self.routing {
                    Some(routing) => routing.install(target),
                    None => debug!("No routing handle attached, ignoring config message"),
                }
            }
        }
    }
}
