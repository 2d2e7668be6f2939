//! PCM frame types and sample helpers.
//!
//! All audio handled by the gateway is 16-bit signed little-endian linear PCM,
//! single channel. A frame carries its sample rate so the codec can decide
//! whether resampling is needed.

use bytes::Bytes;

/// Number of channels carried by every frame.
pub const CHANNELS: u16 = 1;

/// Bytes per 16-bit sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Immutable buffer of mono PCM16LE audio tagged with its sample rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    data: Bytes,
    sample_rate: u32,
}

impl AudioFrame {
    /// Wrap raw PCM bytes.
    pub fn new(data: impl Into<Bytes>, sample_rate: u32) -> Self {
        Self {
            data: data.into(),
            sample_rate,
        }
    }

    /// Build a frame from decoded samples.
    pub fn from_samples(samples: &[i16], sample_rate: u32) -> Self {
        Self::new(samples_to_bytes(samples), sample_rate)
    }

    /// A frame of digital silence lasting `duration_ms`.
    pub fn silence(duration_ms: u32, sample_rate: u32) -> Self {
        let samples = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
        Self::new(vec![0u8; samples * BYTES_PER_SAMPLE], sample_rate)
    }

    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn num_channels(&self) -> u16 {
        CHANNELS
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whole samples only; a trailing odd byte makes the frame invalid.
    #[inline]
    pub fn is_whole_samples(&self) -> bool {
        self.data.len() % BYTES_PER_SAMPLE == 0
    }

    /// Number of whole samples in the frame.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.data.len() / BYTES_PER_SAMPLE
    }

    /// Duration of the frame in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_samples() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Decode the frame into samples.
    pub fn samples(&self) -> Vec<i16> {
        bytes_to_samples(&self.data)
    }
}

/// Frames handed to the encoder by the outbound path.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// Synthesized audio from the conversational runtime.
    Audio(AudioFrame),
    /// The user started speaking; queued playback must be discarded.
    Interruption,
}

/// Interpret little-endian bytes as 16-bit samples. A trailing odd byte is ignored.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Serialize samples as little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Largest absolute sample value.
pub fn peak_amplitude(samples: &[i16]) -> u16 {
    samples
        .iter()
        .map(|s| s.unsigned_abs())
        .max()
        .unwrap_or(0)
}

/// True when every sample is exactly zero.
pub fn is_silent(samples: &[i16]) -> bool {
    samples.iter().all(|&s| s == 0)
}

/// Scale every sample by `factor`, truncating toward zero.
pub fn scale(samples: &mut [i16], factor: f32) {
    for sample in samples.iter_mut() {
        *sample = (*sample as f32 * factor) as i16;
    }
}
