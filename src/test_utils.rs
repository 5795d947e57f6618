//! Shared test utilities for the finance service.
//!
//! This module provides common helper functions for setting up test databases
//! and creating orders, commissions and users with sensible defaults.

use crate::{
    core::{
        commission::DEFAULT_COMMISSION_RATE,
        fiscal::FiscalPeriod,
        order::{self, NewOrder, NewOrderItem},
        user,
    },
    entities::{self, CommissionStatus, Order, OrderStatus, commission},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a regular (non-admin) user.
pub async fn create_test_user(
    db: &DatabaseConnection,
    email: &str,
) -> Result<entities::user::Model> {
    user::create_user(db, email, "Test User", false).await
}

/// Creates the admin user `admin@example.com`.
pub async fn create_test_admin(db: &DatabaseConnection) -> Result<entities::user::Model> {
    user::create_user(db, "admin@example.com", "Test Admin", true).await
}

/// Opens a pending order with a single ticket line.
///
/// # Defaults
/// * `event_id`: `"evt_test"`
/// * one line of quantity 1 at `amount`
/// * USD → USD at rate 1.0
pub async fn create_pending_order(
    db: &DatabaseConnection,
    session: &str,
    amount: f64,
) -> Result<entities::order::Model> {
    order::create_order(
        db,
        NewOrder {
            event_id: "evt_test".to_string(),
            user_id: None,
            items: vec![NewOrderItem {
                ticket_id: "general".to_string(),
                quantity: 1,
                price_per_unit: amount,
            }],
            original_currency: "USD".to_string(),
            currency: "USD".to_string(),
            conversion_rate: 1.0,
            stripe_session_id: session.to_string(),
            tax_jurisdiction: None,
        },
    )
    .await
}

/// Creates a completed order without a commission or ledger rows.
pub async fn create_completed_order(
    db: &DatabaseConnection,
    session: &str,
    amount: f64,
) -> Result<entities::order::Model> {
    let pending = create_pending_order(db, session, amount).await?;
    order::transition_order(db, pending.id, OrderStatus::Completed).await
}

/// Creates a completed order whose `created_at` is back-dated to `created_at`.
pub async fn create_order_at(
    db: &DatabaseConnection,
    session: &str,
    amount: f64,
    created_at: DateTime<Utc>,
) -> Result<entities::order::Model> {
    let completed = create_completed_order(db, session, amount).await?;
    let mut active: entities::order::ActiveModel = completed.into();
    active.created_at = Set(created_at);
    active.update(db).await.map_err(Into::into)
}

/// Runs the full fulfillment path for a new order.
///
/// The commission is earned by `earner@example.com`, created on first use.
pub async fn create_fulfilled_order(
    db: &DatabaseConnection,
    session: &str,
    amount: f64,
) -> Result<(entities::order::Model, entities::commission::Model)> {
    let earner = match user::find_by_email(db, "earner@example.com").await? {
        Some(existing) => existing,
        None => create_test_user(db, "earner@example.com").await?,
    };
    let pending = create_pending_order(db, session, amount).await?;
    let fulfilled = order::fulfill_order(db, pending.id, earner.id, None).await?;
    Ok((fulfilled.order, fulfilled.commission))
}

/// Inserts a commission of exactly `amount` in the given status.
///
/// A completed backing order is created for it; no ledger rows are written.
pub async fn insert_commission(
    db: &DatabaseConnection,
    user_id: i64,
    amount: f64,
    status: CommissionStatus,
) -> Result<entities::commission::Model> {
    let seq = Order::find().count(db).await?;
    let order_amount = amount / DEFAULT_COMMISSION_RATE;
    let order = create_completed_order(db, &format!("cs_seed_{seq}"), order_amount).await?;

    let now = Utc::now();
    let period = FiscalPeriod::from_date(now);
    commission::ActiveModel {
        order_id: Set(order.id),
        event_id: Set(order.event_id),
        user_id: Set(user_id),
        order_amount: Set(order_amount),
        commission_rate: Set(DEFAULT_COMMISSION_RATE),
        commission_amount: Set(amount),
        currency: Set(order.currency),
        status: Set(status),
        paid_to_user: Set(status == CommissionStatus::Paid),
        paid_date: Set((status == CommissionStatus::Paid).then_some(now)),
        payment_method: Set(None),
        settlement_batch_id: Set(None),
        reconciled_by: Set(None),
        notes: Set(None),
        fiscal_year: Set(period.year),
        fiscal_quarter: Set(period.quarter),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}
