/// Per-frame energy measurement. Stateless; runs once per frame on the
/// audio delivery thread, so it must not allocate or panic.
pub struct EnergyAnalyzer {
    epsilon: f32,
}

impl EnergyAnalyzer {
    pub fn new() -> Self {
        Self { epsilon: 1e-10 }
    }

    /// Normalized RMS energy in [0, 1]: sqrt(mean(sample^2)) / 32768.
    ///
    /// An empty frame yields 0.0, which classifies as silence.
    pub fn normalized_rms(&self, frame: &[i16]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }

        let sum_squares: i64 = frame
            .iter()
            .map(|&sample| {
                let s = sample as i64;
                s * s
            })
            .sum();

        let mean_square = sum_squares as f64 / frame.len() as f64;
        (mean_square.sqrt() / 32768.0) as f32
    }

    /// dBFS view of a normalized RMS value, for logs and diagnostics.
    pub fn rms_to_dbfs(&self, rms: f32) -> f32 {
        if rms <= self.epsilon {
            return -100.0;
        }
        20.0 * rms.log10()
    }
}

impl Default for EnergyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
