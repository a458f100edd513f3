use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Helper that wraps the `rustfft` planner for reuse across range rows.
pub struct FftHelper {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex32>,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let buffer = vec![Complex32::zero(); size];
        Self { fft, buffer }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Zero-pads `input` to the planned size and returns the forward transform.
    /// Samples beyond the planned size are dropped.
    pub fn forward(&mut self, input: &[Complex32]) -> &[Complex32] {
        self.buffer.fill(Complex32::zero());
        let take = input.len().min(self.buffer.len());
        self.buffer[..take].copy_from_slice(&input[..take]);
        self.fft.process(&mut self.buffer);
        &self.buffer
    }

    /// Magnitude spectrum with the zero-frequency bin moved to the centre.
    pub fn shifted_magnitudes(&mut self, input: &[Complex32]) -> Vec<f32> {
        let spectrum = self.forward(input);
        let half = spectrum.len() / 2;
        spectrum[half..]
            .iter()
            .chain(spectrum[..half].iter())
            .map(|c| c.norm())
            .collect()
    }
}
