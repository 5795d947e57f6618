//! Fiscal period derivation.
//!
//! Fiscal periods follow the calendar: the fiscal year is the calendar year of the
//! date, quarters are three-month blocks starting in January. Periods are computed
//! explicitly when a row is built rather than as storage defaults.

use crate::{
    core::DateRange,
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;

/// Year, quarter and month a financial event is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalPeriod {
    /// Calendar year
    pub year: i32,
    /// Quarter, 1-4
    pub quarter: i32,
    /// Month, 1-12
    pub month: i32,
}

impl FiscalPeriod {
    /// Derives the period containing `date` (UTC).
    #[must_use]
    pub fn from_date(date: DateTime<Utc>) -> Self {
        // month() is 1-based and always fits in i32
        let month = i32::try_from(date.month()).unwrap_or(1);
        Self {
            year: date.year(),
            quarter: (month - 1) / 3 + 1,
            month,
        }
    }

    /// Label such as `2025-Q3`
    #[must_use]
    pub fn quarter_label(&self) -> String {
        format!("{}-Q{}", self.year, self.quarter)
    }
}

/// Checks a quarter number supplied by a caller.
#[must_use]
pub const fn is_valid_quarter(quarter: i32) -> bool {
    quarter >= 1 && quarter <= 4
}

/// Checks a month number supplied by a caller.
#[must_use]
pub const fn is_valid_month(month: i32) -> bool {
    month >= 1 && month <= 12
}

fn month_start(year: i32, month: i32) -> Result<DateTime<Utc>> {
    let (year, month) = if month > 12 { (year + 1, 1) } else { (year, month) };
    let month = u32::try_from(month).map_err(|_| Error::validation("Invalid month"))?;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| Error::validation(format!("Invalid fiscal year {year}")))
}

/// `[start, end)` of a fiscal quarter.
pub fn quarter_bounds(year: i32, quarter: i32) -> Result<DateRange> {
    period_bounds(year, Some(quarter), None)
}

/// `[start, end)` of a fiscal year, or of one quarter or month inside it.
///
/// When both are given the month must fall inside the quarter.
pub fn period_bounds(year: i32, quarter: Option<i32>, month: Option<i32>) -> Result<DateRange> {
    if let Some(q) = quarter {
        if !is_valid_quarter(q) {
            return Err(Error::validation(format!("Quarter must be 1-4, got {q}")));
        }
    }
    if let Some(m) = month {
        if !is_valid_month(m) {
            return Err(Error::validation(format!("Month must be 1-12, got {m}")));
        }
        if let Some(q) = quarter {
            if (m - 1) / 3 + 1 != q {
                return Err(Error::validation(format!(
                    "Month {m} is not in quarter {q}"
                )));
            }
        }
    }

    let (first, months) = match (quarter, month) {
        (_, Some(m)) => (m, 1),
        (Some(q), None) => ((q - 1) * 3 + 1, 3),
        (None, None) => (1, 12),
    };
    let start = month_start(year, first)?;
    let end = month_start(year, first + months)?;
    Ok(DateRange::new(Some(start), Some(end)))
}
