//! Fixed-capacity trailing window used by the rolling indicators.
//!
//! Keeps the last `capacity` observations and reports statistics only once the
//! window is full and every value in it is defined, mirroring how a trailing
//! rolling aggregate with `min_periods == window` behaves.

use std::collections::VecDeque;

/// A trailing window over `f64` observations.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
    /// Number of NaN values currently inside the window.
    missing: usize,
}

impl RollingWindow {
    /// Create an empty window holding at most `capacity` values.
    ///
    /// # Example
    /// ```
    /// use close_forecast::RollingWindow;
    /// let mut window = RollingWindow::new(3);
    /// window.push(1.0);
    /// assert!(window.mean().is_nan());
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            missing: 0,
        }
    }

    /// Append a value, evicting the oldest one when at capacity.
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.values.len() >= self.capacity {
            if let Some(evicted) = self.values.pop_front() {
                if evicted.is_nan() {
                    self.missing -= 1;
                }
            }
        }
        if value.is_nan() {
            self.missing += 1;
        }
        self.values.push_back(value);
    }

    /// Number of values currently held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Window length.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Full and free of undefined values.
    pub fn is_ready(&self) -> bool {
        self.capacity > 0 && self.values.len() == self.capacity && self.missing == 0
    }

    /// Arithmetic mean, NaN until the window is ready.
    pub fn mean(&self) -> f64 {
        if !self.is_ready() {
            return f64::NAN;
        }
        self.values.iter().sum::<f64>() / self.capacity as f64
    }

    /// Sample standard deviation (n - 1 denominator), NaN until ready.
    ///
    /// Two-pass over the window; a single-value window has no sample deviation.
    pub fn sample_std(&self) -> f64 {
        if !self.is_ready() || self.capacity < 2 {
            return f64::NAN;
        }
        let mean = self.mean();
        let sum_sq: f64 = self.values.iter().map(|v| (v - mean) * (v - mean)).sum();
        (sum_sq / (self.capacity - 1) as f64).sqrt()
    }
}
