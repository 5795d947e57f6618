//! Order business logic - Creation, fulfillment and refunds.
//!
//! Orders are created `pending` when a checkout session opens and move forward only:
//! `pending → completed | failed`, `completed → refunded`. Fulfillment and refunds
//! touch three tables (orders, commissions, ledger) and always run inside a single
//! database transaction so the ledger can never disagree with the order it describes.

use crate::{
    core::{
        DateRange, commission,
        ledger::{self, NewLedgerEntry},
    },
    entities::{
        Account, CommissionModel, CommissionStatus, Order, OrderItem, OrderStatus,
        TransactionType, order, order_item,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};

/// A ticket line of a new order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    /// Ticket type
    pub ticket_id: String,
    /// Number of tickets, at least one
    pub quantity: i32,
    /// Unit price in the original currency
    pub price_per_unit: f64,
}

/// Everything needed to open an order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// Event the tickets are for
    pub event_id: String,
    /// Buyer, `None` for guest checkout
    pub user_id: Option<i64>,
    /// Ticket lines
    pub items: Vec<NewOrderItem>,
    /// Buyer's currency
    pub original_currency: String,
    /// Settlement currency
    pub currency: String,
    /// Multiplier from `original_currency` into `currency`
    pub conversion_rate: f64,
    /// Stripe checkout session id
    pub stripe_session_id: String,
    /// Tax jurisdiction for the sale, e.g. `US-CA`
    #[serde(default)]
    pub tax_jurisdiction: Option<String>,
}

impl NewOrder {
    /// Sum of `quantity × price_per_unit` over all lines.
    #[must_use]
    pub fn original_amount(&self) -> f64 {
        self.items
            .iter()
            .map(|item| f64::from(item.quantity) * item.price_per_unit)
            .sum()
    }

    /// `original_amount × conversion_rate`
    #[must_use]
    pub fn total_amount(&self) -> f64 {
        self.original_amount() * self.conversion_rate
    }

    fn validate(&self) -> Result<()> {
        if self.stripe_session_id.trim().is_empty() {
            return Err(Error::validation("Stripe session id cannot be empty"));
        }
        if self.event_id.trim().is_empty() {
            return Err(Error::validation("Event id cannot be empty"));
        }
        if self.items.is_empty() {
            return Err(Error::validation("An order needs at least one ticket line"));
        }
        for item in &self.items {
            if item.quantity <= 0 {
                return Err(Error::validation(format!(
                    "Quantity for ticket {} must be positive",
                    item.ticket_id
                )));
            }
            if !item.price_per_unit.is_finite() || item.price_per_unit < 0.0 {
                return Err(Error::InvalidAmount {
                    amount: item.price_per_unit,
                });
            }
        }
        if self
            .tax_jurisdiction
            .as_deref()
            .is_some_and(|j| j.trim().is_empty())
        {
            return Err(Error::validation("Tax jurisdiction cannot be blank"));
        }
        if !self.conversion_rate.is_finite() || self.conversion_rate <= 0.0 {
            return Err(Error::InvalidAmount {
                amount: self.conversion_rate,
            });
        }
        Ok(())
    }
}

/// Opens a pending order with its ticket lines.
///
/// Amounts are computed here from the lines, never taken from the caller, so
/// `total_amount` always equals the line totals times the conversion rate.
pub async fn create_order(db: &DatabaseConnection, new_order: NewOrder) -> Result<order::Model> {
    new_order.validate()?;

    let txn = db.begin().await?;

    let duplicate = Order::find()
        .filter(order::Column::StripeSessionId.eq(new_order.stripe_session_id.as_str()))
        .one(&txn)
        .await?;
    if duplicate.is_some() {
        return Err(Error::Duplicate {
            entity: "Order",
            key: new_order.stripe_session_id,
        });
    }

    let now = Utc::now();
    let original_amount = new_order.original_amount();
    let total_amount = new_order.total_amount();

    let created = order::ActiveModel {
        event_id: Set(new_order.event_id),
        user_id: Set(new_order.user_id),
        original_amount: Set(original_amount),
        original_currency: Set(new_order.original_currency),
        conversion_rate: Set(new_order.conversion_rate),
        total_amount: Set(total_amount),
        currency: Set(new_order.currency),
        status: Set(OrderStatus::Pending),
        stripe_session_id: Set(new_order.stripe_session_id),
        tax_jurisdiction: Set(new_order.tax_jurisdiction),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let lines = new_order.items.into_iter().map(|item| order_item::ActiveModel {
        order_id: Set(created.id),
        ticket_id: Set(item.ticket_id),
        quantity: Set(item.quantity),
        price_per_unit: Set(item.price_per_unit),
        ..Default::default()
    });
    OrderItem::insert_many(lines)
        .exec_without_returning(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        order_id = created.id,
        total = created.total_amount,
        currency = %created.currency,
        "created order"
    );
    Ok(created)
}

/// Retrieves an order by id.
pub async fn get_order(db: &DatabaseConnection, order_id: i64) -> Result<Option<order::Model>> {
    Order::find_by_id(order_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the ticket lines of an order.
pub async fn get_order_items(
    db: &DatabaseConnection,
    order_id: i64,
) -> Result<Vec<order_item::Model>> {
    OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves orders created inside `range`, optionally in one status, oldest first.
pub async fn list_orders(
    db: &DatabaseConnection,
    range: DateRange,
    status: Option<OrderStatus>,
) -> Result<Vec<order::Model>> {
    let mut query = range.apply(Order::find(), order::Column::CreatedAt);
    if let Some(status) = status {
        query = query.filter(order::Column::Status.eq(status));
    }
    query
        .order_by_asc(order::Column::CreatedAt)
        .order_by_asc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Moves an order to `to` if the lifecycle allows it.
async fn transition<C>(db: &C, order: order::Model, to: OrderStatus) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    if !order.status.can_transition_to(to) {
        return Err(Error::InvalidTransition {
            entity: "Order",
            id: order.id,
            from: order.status.as_str().to_string(),
            to: to.as_str().to_string(),
        });
    }

    let mut active: order::ActiveModel = order.into();
    active.status = Set(to);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Moves an order to a new status on its own (e.g. `pending → failed`).
///
/// Use [`fulfill_order`] and [`refund_order`] for the transitions that carry money.
pub async fn transition_order(
    db: &DatabaseConnection,
    order_id: i64,
    to: OrderStatus,
) -> Result<order::Model> {
    let order = Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;
    transition(db, order, to).await
}

/// Tags a ledger row with the order's tax jurisdiction, if it has one.
fn in_order_jurisdiction(entry: NewLedgerEntry, order: &order::Model) -> NewLedgerEntry {
    match &order.tax_jurisdiction {
        Some(jurisdiction) => entry.in_jurisdiction(jurisdiction.clone()),
        None => entry,
    }
}

/// Result of fulfilling an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fulfillment {
    /// The completed order
    pub order: order::Model,
    /// Its commission
    pub commission: CommissionModel,
    /// `false` when the order had already been fulfilled earlier
    pub newly_fulfilled: bool,
}

/// Completes a paid order: status, commission and ledger in one transaction.
///
/// Posts a `sale` row (cash / revenue) for the order total and a `commission` row
/// (commission expense / commission payable) for the accrued amount. Fulfilling an
/// already-completed order returns the existing commission without writing anything,
/// so repeated webhook deliveries are harmless.
pub async fn fulfill_order(
    db: &DatabaseConnection,
    order_id: i64,
    earner_user_id: i64,
    commission_rate: Option<f64>,
) -> Result<Fulfillment> {
    let txn = db.begin().await?;

    let order = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;

    if order.status == OrderStatus::Completed {
        if let Some(existing) = commission::get_commission_for_order(&txn, order.id).await? {
            txn.commit().await?;
            tracing::debug!(order_id, "order already fulfilled");
            return Ok(Fulfillment {
                order,
                commission: existing,
                newly_fulfilled: false,
            });
        }
    }

    let order = if order.status == OrderStatus::Completed {
        order
    } else {
        transition(&txn, order, OrderStatus::Completed).await?
    };

    let accrued =
        commission::accrue_commission(&txn, &order, earner_user_id, commission_rate).await?;

    let sale = NewLedgerEntry::new(
        TransactionType::Sale,
        Account::Cash,
        Account::Revenue,
        order.total_amount,
        order.currency.clone(),
        order.updated_at,
    )
    .described(format!("Ticket sale for order {}", order.id))
    .for_order(order.id)
    .for_event(order.event_id.clone())
    .for_user(order.user_id);
    let entries = vec![sale, commission::accrual_entry(&accrued)]
        .into_iter()
        .map(|entry| in_order_jurisdiction(entry, &order))
        .collect();

    ledger::post_entries(&txn, entries).await?;
    txn.commit().await?;

    tracing::info!(
        order_id,
        commission_id = accrued.id,
        total = order.total_amount,
        "fulfilled order"
    );
    Ok(Fulfillment {
        order,
        commission: accrued,
        newly_fulfilled: true,
    })
}

/// Result of refunding an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    /// The refunded order
    pub order: order::Model,
    /// Commission after the refund (cancelled if it was still pending)
    pub commission: Option<CommissionModel>,
    /// Whether the refund cancelled the commission
    pub commission_cancelled: bool,
}

/// Refunds a completed order.
///
/// Posts a `refund` row (refunds / cash) for the order total. A commission that is still
/// pending is cancelled with a reversing `adjustment` row; one that was already paid out
/// is left alone for manual recovery.
pub async fn refund_order(
    db: &DatabaseConnection,
    order_id: i64,
    admin_id: i64,
) -> Result<Refund> {
    let txn = db.begin().await?;

    let order = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;
    let order = transition(&txn, order, OrderStatus::Refunded).await?;

    let refund = NewLedgerEntry::new(
        TransactionType::Refund,
        Account::Refunds,
        Account::Cash,
        order.total_amount,
        order.currency.clone(),
        order.updated_at,
    )
    .described(format!("Refund of order {}", order.id))
    .for_order(order.id)
    .for_event(order.event_id.clone())
    .for_user(order.user_id)
    .posted_by(Some(admin_id));
    ledger::post_entry(&txn, in_order_jurisdiction(refund, &order)).await?;

    let existing = commission::get_commission_for_order(&txn, order.id).await?;

    let (commission, commission_cancelled) = match existing {
        Some(c) if c.status == CommissionStatus::Pending => {
            let cancelled = commission::cancel_pending(
                &txn,
                c,
                Some(admin_id),
                Some(format!("Order {} refunded", order.id)),
            )
            .await?;
            (Some(cancelled), true)
        }
        other => (other, false),
    };

    txn.commit().await?;

    tracing::info!(order_id, admin_id, commission_cancelled, "refunded order");
    Ok(Refund {
        order,
        commission,
        commission_cancelled,
    })
}
