//! Order item entity - A ticket line of an order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning order
    pub order_id: i64,
    /// Ticket type purchased
    pub ticket_id: String,
    /// Number of tickets
    pub quantity: i32,
    /// Unit price in the order's original currency
    pub price_per_unit: f64,
}

impl Model {
    /// `quantity × price_per_unit`
    #[must_use]
    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.price_per_unit
    }
}

/// Defines relationships between `OrderItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
