// FFT module - Fast Fourier Transform computation
//
// This module handles FFT computation with proper windowing to reduce
// spectral leakage. The power spectrum is used by the spectral extractors.

use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::{Mutex, PoisonError};

/// Smallest transform size; shorter signals are zero-padded up to it
const MIN_FFT_SIZE: usize = 16;

/// FFT processor that computes power spectra from signal windows
pub struct FftProcessor {
    fft_planner: Mutex<FftPlanner<f64>>,
}

impl FftProcessor {
    pub fn new() -> Self {
        Self {
            fft_planner: Mutex::new(FftPlanner::new()),
        }
    }

    /// Transform size used for a signal of `len` samples
    pub fn fft_size(len: usize) -> usize {
        len.max(MIN_FFT_SIZE).next_power_of_two()
    }

    /// Compute the one-sided power spectrum of `signal`
    ///
    /// Applies a Hann window, zero-pads to a power of two and returns
    /// `(frequencies_hz, power)` for bins `0..=fft_size/2`.
    pub fn power_spectrum(&self, signal: &[f64], samples_per_second: f64) -> (Vec<f64>, Vec<f64>) {
        let len = signal.len();
        let fft_size = Self::fft_size(len);

        let mut buffer: Vec<Complex<f64>> = Vec::with_capacity(fft_size);
        for (i, &sample) in signal.iter().enumerate() {
            let hann = if len > 1 {
                0.5 * (1.0 - ((2.0 * std::f64::consts::PI * i as f64) / (len as f64 - 1.0)).cos())
            } else {
                1.0
            };
            buffer.push(Complex::new(sample * hann, 0.0));
        }
        buffer.resize(fft_size, Complex::new(0.0, 0.0));

        let fft = {
            let mut planner = self
                .fft_planner
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            planner.plan_fft_forward(fft_size)
        };
        fft.process(&mut buffer);

        let bin_width = samples_per_second / fft_size as f64;
        let bins = fft_size / 2 + 1;
        let frequencies = (0..bins).map(|i| i as f64 * bin_width).collect();
        let power = buffer[..bins]
            .iter()
            .map(|c| c.norm_sqr() / fft_size as f64)
            .collect();
        (frequencies, power)
    }
}

impl Default for FftProcessor {
    fn default() -> Self {
        Self::new()
    }
}
