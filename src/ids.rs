//! Identifier and timestamp helpers shared by every table.
//!
//! Ids are random v4 UUID strings, the same shape remote stores hand out.
//! Modification stamps are wall-clock milliseconds, bumped when needed so a
//! single process never hands out the same stamp twice.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{Result, StoreError};

pub const MILLIS_PER_DAY: i64 = 86_400_000;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Source of `lastModified` stamps.
///
/// `now_millis` is strictly increasing across calls, even if the wall clock
/// stalls or steps backwards.
#[derive(Debug, Default)]
pub struct Clock {
    last: AtomicI64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saturates at `i64::MAX` rather than wrapping if a remote stamp pushed
    /// the clock that far.
    pub fn now_millis(&self) -> i64 {
        let wall = wall_clock_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = if wall > prev { wall } else { prev.saturating_add(1) };
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Never hand out a stamp at or below `seen`. Used after applying remote
    /// rows so later local edits always win over what was just pulled.
    pub fn observe(&self, seen: i64) {
        self.last.fetch_max(seen, Ordering::AcqRel);
    }
}

fn wall_clock_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Attendance rows are keyed by the UTC midnight of the day, in epoch ms.
pub fn day_stamp(date: NaiveDate) -> i64 {
    let days = date.num_days_from_ce() as i64 - EPOCH_DAYS_FROM_CE;
    days * MILLIS_PER_DAY
}

/// UTC midnight of the day containing `stamp`.
pub fn day_floor(stamp: i64) -> i64 {
    stamp.div_euclid(MILLIS_PER_DAY) * MILLIS_PER_DAY
}

pub fn is_day_stamp(stamp: i64) -> bool {
    stamp.rem_euclid(MILLIS_PER_DAY) == 0
}

pub fn date_from_stamp(stamp: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(stamp).map(|dt| dt.date_naive())
}

/// Parse `YYYY-MM-DD` into a day stamp.
pub fn parse_day(raw: &str) -> Result<i64> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(day_stamp)
        .map_err(|_| StoreError::InvalidInput(format!("date must be YYYY-MM-DD: {raw}")))
}

/// `YYYY-MM` month key for a stamp, matching SQLite's
/// `strftime('%Y-%m', stamp / 1000, 'unixepoch')`.
pub fn month_key(stamp: i64) -> Option<String> {
    date_from_stamp(stamp).map(|d| format!("{:04}-{:02}", d.year(), d.month()))
}

// 1970-01-01 counted from 0001-01-01 (CE day 1).
const EPOCH_DAYS_FROM_CE: i64 = 719_163;
