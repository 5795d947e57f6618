//! Admin finance endpoints under `/admin/finance`.

use super::{
    AppState,
    auth::AdminUser,
    params::{CancelRequest, ExportQuery, LedgerQuery, RangeQuery, TaxQuery, date_range},
    response::{ApiSuccess, success},
};
use crate::{
    core::{
        Page, commission,
        dashboard::{self, FinancialDashboard},
        export::{self, ExportFormat, ExportKind, ExportPayload},
        ledger::{self, AccountBalance, LedgerFilter},
        order::{self, Refund},
        page_params,
        payout::{self, BatchPayoutRequest, BatchPayoutResult},
        tax::{self, TaxReport},
    },
    entities::{CommissionModel, LedgerModel},
    errors::{Error, Result},
};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Datelike, Utc};
use serde::Serialize;

const DEFAULT_LEDGER_LIMIT: u64 = 50;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/ledger", get(get_ledger))
        .route("/accounts", get(get_accounts))
        .route("/commissions/process-batch", post(process_batch))
        .route("/commissions/:id/cancel", post(cancel_commission))
        .route("/orders/:id/refund", post(refund_order))
        .route("/reports/tax", get(get_tax_report))
        .route("/export", get(get_export))
}

pub(super) fn query_error(rejection: &QueryRejection) -> Error {
    Error::validation(format!("Invalid query string: {}", rejection.body_text()))
}

pub(super) fn path_error(rejection: &PathRejection) -> Error {
    Error::validation(format!("Invalid path parameter: {}", rejection.body_text()))
}

async fn get_dashboard(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    query: std::result::Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<ApiSuccess<FinancialDashboard>>> {
    let Query(query) = query.map_err(|e| query_error(&e))?;
    let dashboard = dashboard::financial_dashboard(&state.db, query.range()?).await?;
    Ok(success(dashboard))
}

async fn get_ledger(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    query: std::result::Result<Query<LedgerQuery>, QueryRejection>,
) -> Result<Json<ApiSuccess<Page<LedgerModel>>>> {
    let Query(query) = query.map_err(|e| query_error(&e))?;
    let (page, limit) = page_params(query.page, query.limit, DEFAULT_LEDGER_LIMIT)?;

    let filter = LedgerFilter {
        transaction_type: query.transaction_type,
        account: query.account,
        fiscal_year: query.fiscal_year,
        fiscal_quarter: query.fiscal_quarter,
        fiscal_month: query.fiscal_month,
        range: date_range(query.start_date.as_deref(), query.end_date.as_deref())?,
        order_id: query.order_id,
        commission_id: query.commission_id,
        user_id: query.user_id,
        settlement_batch_id: query.settlement_batch_id,
    };

    let entries = ledger::list_entries(&state.db, &filter, page, limit).await?;
    Ok(success(entries))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrialBalance {
    accounts: Vec<AccountBalance>,
    total_debits: f64,
    total_credits: f64,
}

async fn get_accounts(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    query: std::result::Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<ApiSuccess<TrialBalance>>> {
    let Query(query) = query.map_err(|e| query_error(&e))?;
    let filter = LedgerFilter {
        range: query.range()?,
        ..Default::default()
    };

    let accounts = ledger::account_balances(&state.db, &filter).await?;
    let total_debits = accounts.iter().map(|a| a.debits).sum();
    let total_credits = accounts.iter().map(|a| a.credits).sum();
    Ok(success(TrialBalance {
        accounts,
        total_debits,
        total_credits,
    }))
}

async fn process_batch(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    body: std::result::Result<Json<BatchPayoutRequest>, JsonRejection>,
) -> Result<Json<ApiSuccess<BatchPayoutResult>>> {
    let Json(request) =
        body.map_err(|e| Error::validation(format!("Invalid request body: {}", e.body_text())))?;
    let result = payout::process_batch(&state.db, request, admin.id).await?;
    Ok(success(result))
}

async fn cancel_commission(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    id: std::result::Result<Path<i64>, PathRejection>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<ApiSuccess<CommissionModel>>> {
    let Path(id) = id.map_err(|e| path_error(&e))?;
    let reason = body.and_then(|Json(b)| b.reason);
    let cancelled = commission::cancel_commission(&state.db, id, admin.id, reason).await?;
    Ok(success(cancelled))
}

async fn refund_order(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<ApiSuccess<Refund>>> {
    let Path(id) = id.map_err(|e| path_error(&e))?;
    let refund = order::refund_order(&state.db, id, admin.id).await?;
    Ok(success(refund))
}

async fn get_tax_report(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    query: std::result::Result<Query<TaxQuery>, QueryRejection>,
) -> Result<Json<ApiSuccess<TaxReport>>> {
    let Query(query) = query.map_err(|e| query_error(&e))?;
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let report = tax::tax_report(
        &state.db,
        year,
        query.quarter,
        query.month,
        state.config.tax,
    )
    .await?;
    Ok(success(report))
}

async fn get_export(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    query: std::result::Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| query_error(&e))?;
    let format: ExportFormat = query.format.as_deref().unwrap_or("json").parse()?;
    let kind: ExportKind = query.kind.as_deref().unwrap_or("all").parse()?;
    let range = date_range(query.start_date.as_deref(), query.end_date.as_deref())?;

    tracing::info!(admin_id = admin.id, ?format, ?kind, "export requested");

    Ok(match export::export(&state.db, format, kind, range).await? {
        ExportPayload::Json(doc) => success(doc).into_response(),
        ExportPayload::Csv(text) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"finance-export.csv\"",
                ),
            ],
            text,
        )
            .into_response(),
    })
}
