use serde::{Deserialize, Serialize};

/// Running mean and variance (Welford).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        let std_dev = if self.n_vals > 1 {
            (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
        } else {
            f64::NAN
        };
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev,
            sem: std_dev / (self.n_vals as f64).sqrt(),
        }
    }
}

/// Uniform-width histogram over the closed range `[min, max]`.
///
/// Bins are half-open except the last, which also holds `max`.
/// Values outside the range are counted separately.
pub struct Histogram {
    min: f64,
    max: f64,
    width: f64,
    counts: Vec<u64>,
    n_outside: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistogramReport {
    /// Left edge of each bin.
    pub edges: Vec<f64>,
    pub width: f64,
    pub counts: Vec<u64>,
    pub n_outside: u64,
}

impl Histogram {
    pub fn new(min: f64, max: f64, n_bins: usize) -> Self {
        Self {
            min,
            max,
            width: (max - min) / n_bins as f64,
            counts: vec![0; n_bins],
            n_outside: 0,
        }
    }

    pub fn add(&mut self, val: f64) {
        if val == self.max {
            if let Some(last) = self.counts.last_mut() {
                *last += 1;
            }
            return;
        }
        let idx = ((val - self.min) / self.width).floor();
        if idx >= 0.0 && (idx as usize) < self.counts.len() {
            self.counts[idx as usize] += 1;
        } else {
            self.n_outside += 1;
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn centers(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.counts.len()).map(|idx| self.min + (idx as f64 + 0.5) * self.width)
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn report(&self) -> HistogramReport {
        HistogramReport {
            edges: (0..self.counts.len())
                .map(|idx| self.min + idx as f64 * self.width)
                .collect(),
            width: self.width,
            counts: self.counts.clone(),
            n_outside: self.n_outside,
        }
    }
}
