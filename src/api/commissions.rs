//! Commission endpoints under `/commissions`.
//!
//! `balance` and `history` always act on the caller's own commissions; the user id
//! comes from the bearer token, never from the request.

use super::{
    AppState,
    auth::{AdminUser, AuthUser},
    finance::query_error,
    params::{HistoryQuery, ReportQuery, date_range},
    response::{ApiSuccess, success},
};
use crate::{
    core::{
        Page,
        commission::{self, CommissionBalance, CommissionReportFilter, UserCommissionSummary},
        page_params,
    },
    entities::CommissionModel,
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};

const DEFAULT_HISTORY_LIMIT: u64 = 20;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/balance", get(get_balance))
        .route("/history", get(get_history))
        .route("/admin/report", get(get_admin_report))
}

async fn get_balance(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiSuccess<CommissionBalance>>> {
    let balance = commission::get_balance(&state.db, user.id).await?;
    Ok(success(balance))
}

async fn get_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: std::result::Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<ApiSuccess<Page<CommissionModel>>>> {
    let Query(query) = query.map_err(|e| query_error(&e))?;
    let (page, limit) = page_params(query.page, query.limit, DEFAULT_HISTORY_LIMIT)?;
    let history = commission::get_history(&state.db, user.id, page, limit, query.status).await?;
    Ok(success(history))
}

async fn get_admin_report(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    query: std::result::Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Json<ApiSuccess<Vec<UserCommissionSummary>>>> {
    let Query(query) = query.map_err(|e| query_error(&e))?;
    let filter = CommissionReportFilter {
        range: date_range(query.start_date.as_deref(), query.end_date.as_deref())?,
        status: query.status,
        user_id: query.user_id,
    };
    let report = commission::admin_report(&state.db, filter).await?;
    Ok(success(report))
}
