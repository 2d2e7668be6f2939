//! Streaming sample-rate conversion.
//!
//! Linear interpolation that carries its read position and the last input
//! sample across calls, so consecutive chunks of one stream join without
//! clicks or drift. Each direction of a session owns its own instance.

use thiserror::Error;

/// Lowest sample rate accepted by the resampler.
pub const MIN_SAMPLE_RATE: u32 = 1000;

/// Highest sample rate accepted by the resampler.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResampleError {
    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedRate(u32),
}

/// Stateful linear-interpolation resampler for one audio stream.
#[derive(Debug, Default)]
pub struct StreamResampler {
    rates: Option<(u32, u32)>,
    /// Last input sample of the previous chunk, index 0 of the next window.
    carry: Option<f32>,
    /// Fractional read position relative to `carry`.
    position: f64,
}

impl StreamResampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any carried state; the next chunk starts a fresh stream.
    pub fn reset(&mut self) {
        self.carry = None;
        self.position = 0.0;
    }

    /// Convert `samples` from `from_rate` to `to_rate`.
    ///
    /// A change of rate pair resets the stream state.
    pub fn resample(
        &mut self,
        samples: &[i16],
        from_rate: u32,
        to_rate: u32,
    ) -> Result<Vec<i16>, ResampleError> {
        validate_rate(from_rate)?;
        validate_rate(to_rate)?;

        if from_rate == to_rate {
            return Ok(samples.to_vec());
        }
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        if self.rates != Some((from_rate, to_rate)) {
            self.rates = Some((from_rate, to_rate));
            self.reset();
        }

        let step = from_rate as f64 / to_rate as f64;

        let mut window = Vec::with_capacity(samples.len() + 1);
        if let Some(carry) = self.carry {
            window.push(carry);
        }
        window.extend(samples.iter().map(|&s| s as f32));

        let last_index = (window.len() - 1) as f64;
        let mut position = self.position;
        let mut out = Vec::with_capacity((samples.len() as f64 / step).ceil() as usize + 1);

        while position < last_index {
            let idx = position.floor() as usize;
            let frac = (position - idx as f64) as f32;
            let value = window[idx] + (window[idx + 1] - window[idx]) * frac;
            out.push(value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16);
            position += step;
        }

        self.position = position - last_index;
        self.carry = window.last().copied();

        Ok(out)
    }
}

fn validate_rate(rate: u32) -> Result<(), ResampleError> {
    if (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
        Ok(())
    } else {
        Err(ResampleError::UnsupportedRate(rate))
    }
}
