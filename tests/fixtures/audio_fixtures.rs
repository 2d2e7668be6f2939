//! Audio Test Fixtures
//!
//! Generated 16-bit signed mono PCM at any sample rate, so tests never
//! depend on audio files.

use std::f32::consts::PI;

use base64::{Engine, prelude::BASE64_STANDARD};
use voicebridge_gateway::core::codec::frame::bytes_to_samples;
use voicebridge_gateway::core::codec::{AudioFrame, WireEvent};

/// Rates every codec property is checked against.
pub const RATES: [u32; 4] = [8000, 16000, 24000, 48000];

/// Number of samples in `ms` milliseconds at `sample_rate`.
pub fn samples_for(ms: u32, sample_rate: u32) -> usize {
    (sample_rate as u64 * ms as u64 / 1000) as usize
}

/// Generate a sine tone; `amplitude` is a fraction of full scale.
pub fn sine(ms: u32, sample_rate: u32, frequency: f32, amplitude: f32) -> Vec<i16> {
    let max_amplitude = amplitude * i16::MAX as f32;
    let angular_freq = 2.0 * PI * frequency / sample_rate as f32;

    (0..samples_for(ms, sample_rate))
        .map(|i| ((angular_freq * i as f32).sin() * max_amplitude) as i16)
        .collect()
}

/// A sine tone wrapped as a frame.
pub fn sine_frame(ms: u32, sample_rate: u32, amplitude: f32) -> AudioFrame {
    AudioFrame::from_samples(&sine(ms, sample_rate, 440.0, amplitude), sample_rate)
}

/// Root-mean-square level of `samples`.
pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}

/// Decoded PCM samples carried by a media event.
pub fn media_samples(event: &WireEvent) -> Vec<i16> {
    let WireEvent::Media { data } = event else {
        panic!("expected media event, got {event:?}");
    };
    bytes_to_samples(&BASE64_STANDARD.decode(data).expect("valid base64"))
}
