//! Commission entity - The platform's cut of a completed order.
//!
//! `commission_amount` is fixed when the row is created. Afterwards only the status,
//! payout and settlement fields change. `pending` moves to `paid` (batch payout) or
//! `cancelled` (admin action or refund); both are terminal.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Commission lifecycle status
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    /// Accrued, not yet settled
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Settled in a payout batch
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Voided before settlement
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl CommissionStatus {
    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

/// How a settlement batch was paid out
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Wire or ACH transfer
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    /// Stripe Connect payout
    #[sea_orm(string_value = "stripe")]
    Stripe,
    /// PayPal payout
    #[sea_orm(string_value = "paypal")]
    Paypal,
    /// Paper check
    #[sea_orm(string_value = "check")]
    Check,
    /// Anything else, described in the batch notes
    #[sea_orm(string_value = "other")]
    Other,
}

impl PaymentMethod {
    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BankTransfer => "bank_transfer",
            Self::Stripe => "stripe",
            Self::Paypal => "paypal",
            Self::Check => "check",
            Self::Other => "other",
        }
    }
}

/// Commission database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commissions")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the commission
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order this commission was derived from (one commission per order)
    #[sea_orm(unique)]
    pub order_id: i64,
    /// Event the order belongs to
    pub event_id: String,
    /// User the commission is owed to
    pub user_id: i64,
    /// Order total the rate was applied to
    pub order_amount: f64,
    /// Rate applied, e.g. `0.02`
    pub commission_rate: f64,
    /// `order_amount × commission_rate`, fixed at creation
    pub commission_amount: f64,
    /// Currency of `order_amount` and `commission_amount`
    pub currency: String,
    /// Lifecycle status
    pub status: CommissionStatus,
    /// Whether the money has left the platform
    pub paid_to_user: bool,
    /// When the payout happened
    pub paid_date: Option<DateTimeUtc>,
    /// How the payout was made
    pub payment_method: Option<PaymentMethod>,
    /// Batch this commission was settled in
    pub settlement_batch_id: Option<String>,
    /// Admin who settled or cancelled the commission
    pub reconciled_by: Option<i64>,
    /// Free-form notes from the admin action
    pub notes: Option<String>,
    /// Fiscal year of `created_at`
    pub fiscal_year: i32,
    /// Fiscal quarter (1-4) of `created_at`
    pub fiscal_quarter: i32,
    /// When the commission was accrued
    pub created_at: DateTimeUtc,
    /// When the commission was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Commission and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each commission belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    /// Each commission is owed to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
