//! Running mean and variance over fixed-length vectors (Welford's method).

use crate::error::{Error, Result};

/// Element-wise running statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl RunningStats {
    /// Statistics over vectors of `len` elements.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; len],
            m2: vec![0.0; len],
        }
    }

    /// Number of accumulated vectors.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Adds one observation.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `data` has the wrong length.
    #[allow(clippy::cast_precision_loss)]
    pub fn add<T: Copy + Into<f64>>(&mut self, data: &[T]) -> Result<()> {
        if data.len() != self.mean.len() {
            return Err(Error::ShapeMismatch {
                expected: self.mean.len(),
                actual: data.len(),
            });
        }

        self.count += 1;
        let n = self.count as f64;
        for ((mean, m2), &value) in self.mean.iter_mut().zip(&mut self.m2).zip(data) {
            let value: f64 = value.into();
            let delta = value - *mean;
            *mean += delta / n;
            *m2 += delta * (value - *mean);
        }
        Ok(())
    }

    /// Element-wise mean.
    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Element-wise sample variance (`n - 1` denominator).
    ///
    /// # Errors
    /// Returns [`Error::NotEnoughSamples`] for fewer than two observations.
    #[allow(clippy::cast_precision_loss)]
    pub fn variance(&self) -> Result<Vec<f64>> {
        if self.count < 2 {
            return Err(Error::NotEnoughSamples {
                statistic: "variance",
                count: self.count,
            });
        }
        let denominator = (self.count - 1) as f64;
        Ok(self.m2.iter().map(|m2| m2 / denominator).collect())
    }

    /// Element-wise sample standard deviation.
    ///
    /// # Errors
    /// Returns [`Error::NotEnoughSamples`] for fewer than two observations.
    pub fn std(&self) -> Result<Vec<f64>> {
        Ok(self.variance()?.into_iter().map(f64::sqrt).collect())
    }

    /// Element-wise standard error of the mean.
    ///
    /// # Errors
    /// Returns [`Error::NotEnoughSamples`] for fewer than two observations.
    #[allow(clippy::cast_precision_loss)]
    pub fn sem(&self) -> Result<Vec<f64>> {
        let scale = 1.0 / (self.count as f64).sqrt();
        Ok(self.std()?.into_iter().map(|s| s * scale).collect())
    }
}
