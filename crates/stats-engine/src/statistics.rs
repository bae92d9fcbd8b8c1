//! Pooled Summary Statistics
//!
//! Every sample contributes its x, y and z readings to one flat pool of
//! observations. Min, max, sum and median are taken over that pool; the
//! count is the number of samples.

use crate::Sample;
use tracing::trace;

/// Summary of a set of samples
///
/// An empty input produces `min_value = +inf`, `max_value = -inf` and no
/// median. Use [`Summary::min`] and [`Summary::max`] to read the extremes
/// without treating the sentinels as readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Smallest observation, `+inf` when empty
    pub min_value: f64,
    /// Largest observation, `-inf` when empty
    pub max_value: f64,
    /// Number of samples (not observations)
    pub total_count: usize,
    /// Sum of all observations; can overflow to infinity for readings near `f64::MAX`
    pub total_sum: f64,
    /// Median of the observation pool, `None` when empty
    pub median: Option<f64>,
}

impl Summary {
    /// The summary of no samples at all
    pub const EMPTY: Self = Self {
        min_value: f64::INFINITY,
        max_value: f64::NEG_INFINITY,
        total_count: 0,
        total_sum: 0.0,
        median: None,
    };

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min_value)
    }

    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max_value)
    }

    /// Number of pooled observations
    pub fn observation_count(&self) -> usize {
        self.total_count * 3
    }

    /// Mean of the observation pool
    pub fn mean(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.total_sum / self.observation_count() as f64)
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Reduce samples into a pooled [`Summary`]
///
/// The result depends only on the multiset of observations. The pool is
/// sorted with a total order before anything is accumulated, so the sum is
/// bit-identical for any ordering of the input.
pub fn aggregate<I>(samples: I) -> Summary
where
    I: IntoIterator<Item = Sample>,
{
    let mut total_count = 0;
    let mut pool = Vec::new();

    for sample in samples {
        total_count += 1;
        pool.extend(sample.observations());
    }

    if pool.is_empty() {
        return Summary::EMPTY;
    }

    pool.sort_unstable_by(f64::total_cmp);

    let n = pool.len();
    let median = if n % 2 == 1 {
        pool[n / 2]
    } else {
        midpoint(pool[n / 2 - 1], pool[n / 2])
    };

    trace!(samples = total_count, observations = n, "aggregated pool");

    Summary {
        min_value: pool[0],
        max_value: pool[n - 1],
        total_count,
        total_sum: pool.iter().sum(),
        median: Some(median),
    }
}

/// Mean of two sorted finite values without overflowing
fn midpoint(lo: f64, hi: f64) -> f64 {
    if lo.is_sign_negative() == hi.is_sign_negative() {
        lo + (hi - lo) / 2.0
    } else {
        (lo + hi) / 2.0
    }
}
