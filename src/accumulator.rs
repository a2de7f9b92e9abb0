//! Online statistics
//!
//! Welford running mean and sum of squared deviations, one triple per key.
//! Each sample is folded in once in O(1); history is never stored.

use thiserror::Error;

use crate::XmcError;

/// Key-level accumulator failures, without variable context
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatError {
    #[error("key {key} out of range (bound {bound})")]
    IndexOutOfRange { key: usize, bound: usize },
    #[error("no samples at key {key}")]
    NoSamples { key: usize },
    #[error("variance needs at least 2 samples at key {key}, have {count}")]
    InsufficientSamples { key: usize, count: u64 },
    #[error("accumulator length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}

impl StatError {
    /// Attach the owning variable's name.
    pub fn for_variable(self, name: &str) -> XmcError {
        let name = name.to_string();
        match self {
            StatError::IndexOutOfRange { key, bound } => {
                XmcError::IndexOutOfRange { name, key, bound }
            }
            StatError::NoSamples { key } => XmcError::NoSamples { name, key },
            StatError::InsufficientSamples { key, count } => {
                XmcError::InsufficientSamples { name, key, count }
            }
            StatError::LengthMismatch { expected, got } => XmcError::LengthMismatch {
                context: "accumulator",
                expected,
                got,
            },
        }
    }
}

/// Running statistics for a single key
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeyStats {
    /// Samples observed since the last reset
    pub count: u64,
    /// Running mean
    pub mean: f64,
    /// Sum of squared deviations from the running mean
    pub sum_sq_dev: f64,
}

impl KeyStats {
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.sum_sq_dev += delta * delta2;
    }

    /// Combine two partial accumulations (Chan et al. parallel variance).
    pub fn merge(&self, other: &KeyStats) -> KeyStats {
        if self.count == 0 {
            return *other;
        }
        if other.count == 0 {
            return *self;
        }

        let count = self.count + other.count;
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = count as f64;
        let delta = other.mean - self.mean;

        KeyStats {
            count,
            mean: self.mean + delta * n_b / n,
            sum_sq_dev: self.sum_sq_dev + other.sum_sq_dev + delta * delta * n_a * n_b / n,
        }
    }

    /// Bessel-corrected sample variance, `None` below two samples.
    pub fn sample_variance(&self) -> Option<f64> {
        if self.count < 2 {
            None
        } else {
            Some(self.sum_sq_dev / (self.count - 1) as f64)
        }
    }
}

/// Per-key Welford accumulator owned by a numeric variable
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatAccumulator {
    keys: Vec<KeyStats>,
}

impl StatAccumulator {
    pub fn new(key_count: usize) -> Self {
        Self {
            keys: vec![KeyStats::default(); key_count],
        }
    }

    /// Zero every key and resize to `key_count`.
    pub fn reset(&mut self, key_count: usize) {
        self.keys.clear();
        self.keys.resize(key_count, KeyStats::default());
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn stats(&self, key: usize) -> Result<&KeyStats, StatError> {
        self.keys.get(key).ok_or(StatError::IndexOutOfRange {
            key,
            bound: self.keys.len(),
        })
    }

    pub fn update(&mut self, key: usize, value: f64) -> Result<(), StatError> {
        let bound = self.keys.len();
        let stats = self
            .keys
            .get_mut(key)
            .ok_or(StatError::IndexOutOfRange { key, bound })?;
        stats.update(value);
        Ok(())
    }

    pub fn mean(&self, key: usize) -> Result<f64, StatError> {
        let stats = self.stats(key)?;
        if stats.count == 0 {
            return Err(StatError::NoSamples { key });
        }
        Ok(stats.mean)
    }

    pub fn variance(&self, key: usize) -> Result<f64, StatError> {
        let stats = self.stats(key)?;
        stats
            .sample_variance()
            .ok_or(StatError::InsufficientSamples {
                key,
                count: stats.count,
            })
    }

    pub fn stddev(&self, key: usize) -> Result<f64, StatError> {
        self.variance(key).map(f64::sqrt)
    }

    pub fn sample_count(&self, key: usize) -> Result<u64, StatError> {
        self.stats(key).map(|stats| stats.count)
    }

    /// Fold another accumulator with the same key layout into this one.
    pub fn merge(&mut self, other: &StatAccumulator) -> Result<(), StatError> {
        if other.keys.len() != self.keys.len() {
            return Err(StatError::LengthMismatch {
                expected: self.keys.len(),
                got: other.keys.len(),
            });
        }

        for (mine, theirs) in self.keys.iter_mut().zip(other.keys.iter()) {
            *mine = mine.merge(theirs);
        }
        Ok(())
    }
}
