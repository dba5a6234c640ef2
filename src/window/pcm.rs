// PCM window - little-endian PCM bytes with interleaved multi-dimensional samples
//
// A logical sample is `dimensions` consecutive values; each value is one PCM
// frame of `channels` channels. Decoding averages the channels of a frame into
// one value in [-1, 1] and happens once, on first access to the values.
//
// 8-bit PCM is unsigned, 16/24/32-bit PCM is signed two's complement.
// Padding copies whole logical samples byte for byte, so the leading
// samples of a padded window keep their exact encoding.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::cache::CacheContext;
use crate::error::WindowError;

use super::index;
use super::pad::{pad_frames, PadType};
use super::{DataWindow, WindowPayload};

/// Window of PCM-encoded samples
pub type PcmWindow = DataWindow<PcmPayload>;

/// PCM sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcmFormat {
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl PcmFormat {
    pub fn new(bits_per_sample: u16, channels: u16) -> Result<Self, WindowError> {
        let format = Self {
            bits_per_sample,
            channels,
        };
        format.validate()?;
        Ok(format)
    }

    /// 16-bit mono
    pub fn mono16() -> Self {
        Self {
            bits_per_sample: 16,
            channels: 1,
        }
    }

    pub fn validate(&self) -> Result<(), WindowError> {
        if !matches!(self.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(WindowError::InvalidFormat {
                reason: format!(
                    "bits per sample must be 8, 16, 24 or 32, got {}",
                    self.bits_per_sample
                ),
            });
        }
        if !(1..=8).contains(&self.channels) {
            return Err(WindowError::InvalidFormat {
                reason: format!("channel count must be 1..=8, got {}", self.channels),
            });
        }
        Ok(())
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    fn decode_one(&self, bytes: &[u8]) -> f64 {
        match self.bits_per_sample {
            8 => (bytes[0] as f64 - 128.0) / 128.0,
            16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64 / 32768.0,
            24 => {
                // sign-extend through the top byte of an i32
                let raw = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
                raw as f64 / 8_388_608.0
            }
            _ => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64 / 2_147_483_648.0,
        }
    }

    /// Inverse of `decode_one`: same full-scale factor, clamped to the integer range.
    fn encode_one(&self, value: f64, out: &mut Vec<u8>) {
        let value = if value.is_nan() { 0.0 } else { value };
        match self.bits_per_sample {
            8 => out.push((value * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8),
            16 => {
                let raw = (value * 32_768.0).round().clamp(-32_768.0, 32_767.0) as i16;
                out.extend_from_slice(&raw.to_le_bytes());
            }
            24 => {
                let raw = (value * 8_388_608.0)
                    .round()
                    .clamp(-8_388_608.0, 8_388_607.0) as i32;
                out.extend_from_slice(&raw.to_le_bytes()[..3]);
            }
            _ => {
                let raw = (value * 2_147_483_648.0)
                    .round()
                    .clamp(-2_147_483_648.0, 2_147_483_647.0) as i32;
                out.extend_from_slice(&raw.to_le_bytes());
            }
        }
    }

    /// Average the channels of each frame into one value per frame.
    pub fn decode(&self, bytes: &[u8]) -> Vec<f64> {
        let width = self.bytes_per_sample();
        let channels = self.channels as usize;
        bytes
            .chunks_exact(self.bytes_per_frame())
            .map(|frame| {
                let sum: f64 = frame
                    .chunks_exact(width)
                    .map(|sample| self.decode_one(sample))
                    .sum();
                sum / channels as f64
            })
            .collect()
    }

    /// Encode one value per frame, writing the same value to every channel.
    pub fn encode(&self, values: &[f64]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(values.len() * self.bytes_per_frame());
        for &value in values {
            for _ in 0..self.channels {
                self.encode_one(value, &mut bytes);
            }
        }
        bytes
    }
}

/// Shared PCM byte buffer plus the visible byte range
#[derive(Debug)]
pub struct PcmPayload {
    bytes: Arc<[u8]>,
    offset: usize,
    len: usize,
    format: PcmFormat,
    dimensions: usize,
    decoded: OnceCell<Vec<f64>>,
}

impl PcmPayload {
    pub fn new(bytes: Vec<u8>, format: PcmFormat, dimensions: usize) -> Result<Self, WindowError> {
        format.validate()?;
        if dimensions == 0 {
            return Err(WindowError::invalid("dimensions must be at least 1"));
        }
        let len = bytes.len();
        if len % format.bytes_per_frame() != 0 {
            return Err(WindowError::InvalidFormat {
                reason: format!(
                    "{} bytes is not a whole number of {}-byte frames",
                    len,
                    format.bytes_per_frame()
                ),
            });
        }
        let frames = len / format.bytes_per_frame();
        if frames % dimensions != 0 {
            return Err(WindowError::InvalidFormat {
                reason: format!(
                    "{} frames is not a multiple of {} interleaved dimensions",
                    frames, dimensions
                ),
            });
        }
        Ok(Self {
            bytes: bytes.into(),
            offset: 0,
            len,
            format,
            dimensions,
            decoded: OnceCell::new(),
        })
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[self.offset..self.offset + self.len]
    }

    fn bytes_per_logical_sample(&self) -> usize {
        self.format.bytes_per_frame() * self.dimensions
    }

    fn view(&self, start: usize, end: usize) -> Self {
        let width = self.bytes_per_logical_sample();
        Self {
            bytes: Arc::clone(&self.bytes),
            offset: self.offset + start * width,
            len: (end - start) * width,
            format: self.format,
            dimensions: self.dimensions,
            decoded: OnceCell::new(),
        }
    }
}

impl WindowPayload for PcmPayload {
    fn values(&self) -> &[f64] {
        self.decoded.get_or_init(|| self.format.decode(self.bytes()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn sample_len(&self) -> usize {
        self.len / self.bytes_per_logical_sample()
    }

    fn new_sub_window(
        parent: &DataWindow<Self>,
        new_start_msec: f64,
        start: usize,
        end: usize,
    ) -> Result<DataWindow<Self>, WindowError> {
        parent.derive(
            new_start_msec,
            end - start,
            parent.sliced_independent(start, end),
            parent.payload().view(start, end),
        )
    }

    fn uncached_pad(
        parent: &DataWindow<Self>,
        duration_msec: f64,
        pad_type: PadType,
    ) -> Result<DataWindow<Self>, WindowError> {
        let source = parent.payload();
        let new_count = index::sample_count(duration_msec, parent.samples_per_second());
        let silence = source.format.encode(&vec![0.0; source.dimensions]);
        let bytes = pad_frames(
            source.bytes(),
            source.bytes_per_logical_sample(),
            new_count,
            pad_type,
            &silence,
        )?;
        let payload = PcmPayload::new(bytes, source.format, source.dimensions)?;
        parent.derive(parent.start_msec(), new_count, None, payload)
    }
}

impl DataWindow<PcmPayload> {
    /// Window starting at `start_msec` over raw PCM bytes.
    ///
    /// `samples_per_second` counts logical samples, each `dimensions` frames wide.
    pub fn from_pcm(
        ctx: &CacheContext,
        start_msec: f64,
        samples_per_second: f64,
        format: PcmFormat,
        dimensions: usize,
        bytes: Vec<u8>,
    ) -> Result<Self, WindowError> {
        if !(samples_per_second.is_finite() && samples_per_second > 0.0) {
            return Err(WindowError::invalid(format!(
                "sampling rate must be positive, got {}",
                samples_per_second
            )));
        }
        let payload = PcmPayload::new(bytes, format, dimensions)?;
        let end_msec = start_msec + index::offset_msec(payload.sample_len(), samples_per_second);
        Self::from_parts(
            Arc::clone(ctx.window_cache()),
            start_msec,
            end_msec,
            samples_per_second,
            None,
            payload,
        )
    }

    /// Encode `values` (one per frame, interleaved by dimension) and build a window.
    pub fn from_values(
        ctx: &CacheContext,
        start_msec: f64,
        samples_per_second: f64,
        format: PcmFormat,
        dimensions: usize,
        values: &[f64],
    ) -> Result<Self, WindowError> {
        format.validate()?;
        Self::from_pcm(
            ctx,
            start_msec,
            samples_per_second,
            format,
            dimensions,
            format.encode(values),
        )
    }
}
