//! Day-offset sampling for long time series.

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_MIN_BUCKET: u32 = 12;
pub const DEFAULT_MAX_BUCKET: u32 = 30;

/// Picks which day offsets a series query fetches.
///
/// Output is ascending, starts at 0, ends at the requested range and never
/// holds more than `max_bucket + 1` points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSampler {
    min_bucket: u32,
    max_bucket: u32,
}

impl Default for DateSampler {
    fn default() -> Self {
        Self {
            min_bucket: DEFAULT_MIN_BUCKET,
            max_bucket: DEFAULT_MAX_BUCKET,
        }
    }
}

impl DateSampler {
    pub fn new(min_bucket: u32, max_bucket: u32) -> EngineResult<Self> {
        if min_bucket == 0 || max_bucket < 2 || min_bucket > max_bucket {
            return Err(EngineError::Configuration(format!(
                "invalid sampling buckets {}..={}",
                min_bucket, max_bucket
            )));
        }
        Ok(Self {
            min_bucket,
            max_bucket,
        })
    }

    /// Offsets (in days before today) to fetch for a `day_diff`-day range.
    pub fn sample(&self, day_diff: u32) -> Vec<u32> {
        if day_diff == 0 {
            return vec![0];
        }

        if day_diff <= self.max_bucket {
            return (0..=day_diff).collect();
        }

        // first exact divisor wins, so shorter steps are preferred
        if let Some(buckets) = (self.min_bucket..=self.max_bucket).find(|b| day_diff % b == 0) {
            let step = day_diff / buckets;
            return (0..=buckets).map(|i| i * step).collect();
        }

        let step = day_diff / (self.max_bucket - 1);
        let mut offsets: Vec<u32> = (0..self.max_bucket - 1).map(|i| i * step).collect();
        offsets.push(day_diff);
        offsets
    }
}

/// Sample with the default 12..=30 bucket window.
pub fn sample(day_diff: u32) -> Vec<u32> {
    DateSampler::default().sample(day_diff)
}
