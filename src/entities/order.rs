//! Order entity - One row per checkout.
//!
//! `original_amount` is the sum of the ticket lines in the buyer's currency;
//! `total_amount` is that sum multiplied by `conversion_rate` into the settlement
//! currency. Status only ever moves forward: `pending → completed | failed` and
//! `completed → refunded`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order lifecycle status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Checkout session created, payment not confirmed
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Payment confirmed and fulfilled
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Payment failed or session expired
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Completed order that was refunded
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl OrderStatus {
    /// Whether the lifecycle allows moving from `self` to `to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Completed | Self::Failed) | (Self::Completed, Self::Refunded)
        )
    }

    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Event the tickets belong to
    pub event_id: String,
    /// Buyer, `None` for guest checkout
    pub user_id: Option<i64>,
    /// Sum of ticket lines in the buyer's currency
    pub original_amount: f64,
    /// Buyer's currency code
    pub original_currency: String,
    /// Multiplier from the original currency into `currency`
    pub conversion_rate: f64,
    /// Amount charged in the settlement currency
    pub total_amount: f64,
    /// Settlement currency code
    pub currency: String,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Stripe checkout session id
    #[sea_orm(unique)]
    pub stripe_session_id: String,
    /// Tax jurisdiction the sale is reported under, copied onto its ledger rows
    pub tax_jurisdiction: Option<String>,
    /// When the order was created
    pub created_at: DateTimeUtc,
    /// When the order was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One order has many ticket lines
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    /// One order accrues at most one commission
    #[sea_orm(has_one = "super::commission::Entity")]
    Commission,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::commission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
