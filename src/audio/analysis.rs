use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::backend::AudioFrame;

/// Amplitude snapshot of the most recent capture window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSnapshot {
    /// RMS amplitude in `[0.0, 1.0]`
    pub rms: f32,
    /// Peak absolute amplitude in `[0.0, 1.0]`
    pub peak: f32,
}

/// Read-only analysis tap wired in parallel to the encoding path.
///
/// Holds a sliding window of the most recent samples and answers level
/// queries for mic-check style UIs. Cloning yields another handle onto the
/// same window; the tap never affects segment production.
#[derive(Clone)]
pub struct AnalysisTap {
    inner: Arc<Mutex<Window>>,
}

struct Window {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl AnalysisTap {
    /// Create a tap holding the most recent `window_samples` samples.
    pub fn new(window_samples: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Window {
                samples: VecDeque::with_capacity(window_samples),
                capacity: window_samples.max(1),
            })),
        }
    }

    /// Feed a captured frame into the window.
    pub fn ingest(&self, frame: &AudioFrame) {
        let mut window = self.inner.lock().expect("analysis window poisoned");
        for &sample in &frame.samples {
            if window.samples.len() == window.capacity {
                window.samples.pop_front();
            }
            window.samples.push_back(sample as f32 / i16::MAX as f32);
        }
    }

    /// RMS and peak amplitude over the current window.
    pub fn levels(&self) -> LevelSnapshot {
        let window = self.inner.lock().expect("analysis window poisoned");
        if window.samples.is_empty() {
            return LevelSnapshot { rms: 0.0, peak: 0.0 };
        }

        let mean_sq: f32 = window.samples.iter().map(|s| s * s).sum::<f32>()
            / window.samples.len() as f32;
        let peak = window
            .samples
            .iter()
            .map(|s| s.abs())
            .fold(0.0_f32, f32::max);

        LevelSnapshot {
            rms: mean_sq.sqrt().min(1.0),
            peak: peak.min(1.0),
        }
    }

    /// Per-band RMS amplitude bars across the window, oldest band first.
    ///
    /// The window is divided into `num_bands` equal-width chunks; the RMS of
    /// each chunk becomes one bar value in `[0.0, 1.0]`. Short windows are
    /// padded with trailing zeros.
    pub fn bands(&self, num_bands: usize) -> Vec<f32> {
        if num_bands == 0 {
            return Vec::new();
        }

        let window = self.inner.lock().expect("analysis window poisoned");
        if window.samples.is_empty() {
            return vec![0.0; num_bands];
        }

        let samples: Vec<f32> = window.samples.iter().copied().collect();
        let chunk_size = (samples.len() / num_bands).max(1);

        let mut bars: Vec<f32> = samples
            .chunks(chunk_size)
            .take(num_bands)
            .map(|chunk| {
                let mean_sq: f32 =
                    chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32;
                mean_sq.sqrt().min(1.0)
            })
            .collect();

        bars.resize(num_bands, 0.0);
        bars
    }
}
