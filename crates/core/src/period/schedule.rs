//! Period boundaries derived from an account book's period length and refresh day.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::DateRange;

/// Budget period length configured on an account book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodLength {
    /// One period per month, starting on the refresh day.
    #[default]
    Monthly,
    /// One period per year, starting on the refresh day of January.
    Yearly,
}

/// Schedule arithmetic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Refresh day outside 1..=31.
    #[error("Invalid refresh day: {0}")]
    InvalidRefreshDay(u32),

    /// Date arithmetic left the representable calendar.
    #[error("Date out of range near {0}")]
    DateOutOfRange(NaiveDate),
}

/// Computes period boundaries.
///
/// A boundary is the refresh day of a month, clamped to the month's length
/// (refresh day 31 falls on Feb 28/29). Monthly schedules have a boundary in
/// every month, yearly schedules only in January.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSchedule {
    length: PeriodLength,
    refresh_day: u32,
}

impl PeriodSchedule {
    /// Creates a schedule.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::InvalidRefreshDay` unless `1 <= refresh_day <= 31`.
    pub fn new(length: PeriodLength, refresh_day: u32) -> Result<Self, ScheduleError> {
        if !(1..=31).contains(&refresh_day) {
            return Err(ScheduleError::InvalidRefreshDay(refresh_day));
        }
        Ok(Self {
            length,
            refresh_day,
        })
    }

    /// Monthly schedule refreshing on the 1st.
    #[must_use]
    pub const fn monthly() -> Self {
        Self {
            length: PeriodLength::Monthly,
            refresh_day: 1,
        }
    }

    /// Period length.
    #[must_use]
    pub const fn length(&self) -> PeriodLength {
        self.length
    }

    /// Refresh day of month.
    #[must_use]
    pub const fn refresh_day(&self) -> u32 {
        self.refresh_day
    }

    /// Returns the end date of a period starting at `start`.
    ///
    /// The period runs until the day before the first boundary strictly after
    /// `start`, so a misaligned legacy start realigns on the next boundary.
    pub fn end_for(&self, start: NaiveDate) -> Result<NaiveDate, ScheduleError> {
        self.next_boundary_after(start)?
            .pred_opt()
            .ok_or(ScheduleError::DateOutOfRange(start))
    }

    /// Returns the period enclosing `date`.
    pub fn bounds_containing(&self, date: NaiveDate) -> Result<DateRange, ScheduleError> {
        let start = self.last_boundary_on_or_before(date)?;
        let end = self.end_for(start)?;
        Ok(DateRange::new(start, end))
    }

    fn boundary(&self, year: i32, month: u32) -> Result<NaiveDate, ScheduleError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(ScheduleError::DateOutOfRange(
            NaiveDate::MIN,
        ))?;
        let day = self.refresh_day.min(days_in_month(first)?);
        first
            .with_day(day)
            .ok_or(ScheduleError::DateOutOfRange(first))
    }

    fn next_boundary_after(&self, date: NaiveDate) -> Result<NaiveDate, ScheduleError> {
        match self.length {
            PeriodLength::Monthly => {
                let current = self.boundary(date.year(), date.month())?;
                if current > date {
                    return Ok(current);
                }
                let (year, month) = shift_month(date.year(), date.month(), 1);
                self.boundary(year, month)
            }
            PeriodLength::Yearly => {
                let current = self.boundary(date.year(), 1)?;
                if current > date {
                    return Ok(current);
                }
                self.boundary(date.year() + 1, 1)
            }
        }
    }

    fn last_boundary_on_or_before(&self, date: NaiveDate) -> Result<NaiveDate, ScheduleError> {
        match self.length {
            PeriodLength::Monthly => {
                let current = self.boundary(date.year(), date.month())?;
                if current <= date {
                    return Ok(current);
                }
                let (year, month) = shift_month(date.year(), date.month(), -1);
                self.boundary(year, month)
            }
            PeriodLength::Yearly => {
                let current = self.boundary(date.year(), 1)?;
                if current <= date {
                    return Ok(current);
                }
                self.boundary(date.year() - 1, 1)
            }
        }
    }
}

impl Default for PeriodSchedule {
    fn default() -> Self {
        Self::monthly()
    }
}

fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    // month is 1-based; work in a 0-based month index
    let index = year * 12 + month.cast_signed() - 1 + delta;
    (index.div_euclid(12), index.rem_euclid(12).cast_unsigned() + 1)
}

fn days_in_month(first: NaiveDate) -> Result<u32, ScheduleError> {
    let (year, month) = shift_month(first.year(), first.month(), 1);
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .ok_or(ScheduleError::DateOutOfRange(first))
}
