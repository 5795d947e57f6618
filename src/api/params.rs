//! Query-string types and parsing helpers shared by the handlers.

use crate::{
    core::DateRange,
    entities::{Account, CommissionStatus, TransactionType},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// Parses `YYYY-MM-DD` or RFC 3339.
///
/// A bare date used as an upper bound means "through the end of that day", so it is
/// turned into midnight of the following day to fit the half-open [`DateRange`].
pub fn parse_date(value: &str, upper_bound: bool) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }

    let day = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        Error::validation(format!(
            "Invalid date '{value}', expected YYYY-MM-DD or RFC 3339"
        ))
    })?;
    let day = if upper_bound {
        day.succ_opt()
            .ok_or_else(|| Error::validation(format!("Date '{value}' is out of range")))?
    } else {
        day
    };
    Ok(day.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Builds a range from optional `startDate` / `endDate` strings.
pub fn date_range(start: Option<&str>, end: Option<&str>) -> Result<DateRange> {
    let start = start
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_date(s, false))
        .transpose()?;
    let end = end
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_date(s, true))
        .transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(Error::validation("startDate must be before endDate"));
        }
    }
    Ok(DateRange::new(start, end))
}

/// `?startDate&endDate`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    /// Inclusive start
    pub start_date: Option<String>,
    /// Inclusive end
    pub end_date: Option<String>,
}

impl RangeQuery {
    /// Parsed range
    pub fn range(&self) -> Result<DateRange> {
        date_range(self.start_date.as_deref(), self.end_date.as_deref())
    }
}

/// Query of `GET /admin/finance/ledger`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub transaction_type: Option<TransactionType>,
    pub account: Option<Account>,
    pub fiscal_year: Option<i32>,
    pub fiscal_quarter: Option<i32>,
    pub fiscal_month: Option<i32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub user_id: Option<i64>,
    pub order_id: Option<i64>,
    pub commission_id: Option<i64>,
    pub settlement_batch_id: Option<String>,
}

/// Query of `GET /admin/finance/reports/tax`
#[derive(Debug, Default, Deserialize)]
pub struct TaxQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
    pub quarter: Option<i32>,
    pub month: Option<i32>,
}

/// Query of `GET /admin/finance/export`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    /// `json` (default) or `csv`
    pub format: Option<String>,
    /// `orders`, `commissions`, `ledger` or `all` (default)
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Query of `GET /commissions/history`
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<CommissionStatus>,
}

/// Query of `GET /commissions/admin/report`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<CommissionStatus>,
    pub user_id: Option<i64>,
}

/// Body of `POST /admin/finance/commissions/{id}/cancel`
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    /// Stored in the commission notes
    pub reason: Option<String>,
}
