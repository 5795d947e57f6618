//! Core business logic - framework-agnostic accounting operations.
//!
//! Modules here only depend on `SeaORM` and the entity definitions. The HTTP layer in
//! `crate::api` turns their results into JSON.

/// Commission accrual, cancellation, balances and reports
pub mod commission;
/// Admin dashboard aggregation
pub mod dashboard;
/// JSON and CSV data export
pub mod export;
/// Fiscal period derivation
pub mod fiscal;
/// Double-entry ledger posting and queries
pub mod ledger;
/// Order creation, fulfillment and refunds
pub mod order;
/// Batch commission payout
pub mod payout;
/// Estimated tax liability report
pub mod tax;
/// Platform users
pub mod user;

use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select};
use serde::Serialize;

/// Largest page size any listing accepts
pub const MAX_PAGE_SIZE: u64 = 100;

/// Highest page number whose row offset still fits SQLite's signed 64-bit `OFFSET`
pub const MAX_PAGE: u64 = i64::MAX.unsigned_abs() / MAX_PAGE_SIZE;

/// Half-open `[start, end)` time window; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    /// Inclusive lower bound
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Creates a range from optional bounds.
    #[must_use]
    pub const fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Restricts `query` to rows whose `column` falls inside the range.
    pub fn apply<E>(&self, query: Select<E>, column: E::Column) -> Select<E>
    where
        E: EntityTrait,
    {
        let query = match self.start {
            Some(start) => query.filter(column.gte(start)),
            None => query,
        };
        match self.end {
            Some(end) => query.filter(column.lt(end)),
            None => query,
        }
    }
}

/// Page position and totals returned with every paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based page number
    pub page: u64,
    /// Page size
    pub limit: u64,
    /// Total matching rows
    pub total: u64,
    /// Total pages at this page size
    pub pages: u64,
}

impl Pagination {
    /// Builds pagination metadata for `total` rows.
    #[must_use]
    pub const fn new(page: u64, limit: u64, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            pages: total.div_ceil(limit),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Rows on this page
    pub items: Vec<T>,
    /// Position and totals
    pub pagination: Pagination,
}

/// Normalises a requested page/limit pair: page ≥ 1, `1 ≤ limit ≤ MAX_PAGE_SIZE`.
///
/// # Errors
/// [`Error::Validation`] when `page` is above [`MAX_PAGE`].
pub fn page_params(
    page: Option<u64>,
    limit: Option<u64>,
    default_limit: u64,
) -> Result<(u64, u64)> {
    let page = page.unwrap_or(1).max(1);
    if page > MAX_PAGE {
        return Err(Error::validation(format!(
            "page must be at most {MAX_PAGE}, got {page}"
        )));
    }
    let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
    Ok((page, limit))
}
