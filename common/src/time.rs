//! Date utilities and constants for bankrate.

use chrono::{Duration, Local, NaiveDate};

/// Shared rate constants.
pub mod constants {
    use chrono::NaiveDate;

    /// Day the national currency was redenominated.
    pub const DENOMINATION_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2016, 7, 1) {
        Some(date) => date,
        None => panic!("invalid denomination date"),
    };

    /// Factor between pre- and post-redenomination values.
    pub const DENOMINATION_MULTIPLIER: u32 = 10_000;

    /// Largest accepted "days ago" offset for a query.
    pub const MAX_DAYS_AGO: u32 = 2400;

    /// Date layout used inside cache keys.
    pub const CACHE_DATE_FORMAT: &str = "%Y-%m-%d";
}

/// Multiplier that applies to every rate published on `date`.
pub fn denomination_multiplier(date: NaiveDate) -> u32 {
    if date < constants::DENOMINATION_DATE {
        constants::DENOMINATION_MULTIPLIER
    } else {
        1
    }
}

/// Date that lies `days` days before `today`.
pub fn date_from_offset(today: NaiveDate, days: u32) -> NaiveDate {
    today - Duration::days(i64::from(days))
}

/// Map day offsets onto calendar dates relative to `today`.
pub fn dates_from_offsets(today: NaiveDate, offsets: &[u32]) -> Vec<NaiveDate> {
    offsets
        .iter()
        .map(|&days| date_from_offset(today, days))
        .collect()
}

/// Source of "today" for the caching policy.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to one day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
