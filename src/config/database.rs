//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust models
//! without hand-written SQL.

use crate::entities::{Commission, Order, OrderItem, TransactionLedger, User};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Establishes a connection to the database at `url`.
pub async fn connect(url: &str) -> Result<DatabaseConnection> {
    Database::connect(url).await.map_err(Into::into)
}

/// Creates all tables that do not exist yet.
///
/// Parents are created before children so foreign keys resolve on backends that check them.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut users = schema.create_table_from_entity(User);
    let mut orders = schema.create_table_from_entity(Order);
    let mut order_items = schema.create_table_from_entity(OrderItem);
    let mut commissions = schema.create_table_from_entity(Commission);
    let mut ledger = schema.create_table_from_entity(TransactionLedger);

    for statement in [
        users.if_not_exists(),
        orders.if_not_exists(),
        order_items.if_not_exists(),
        commissions.if_not_exists(),
        ledger.if_not_exists(),
    ] {
        db.execute(builder.build(&*statement)).await?;
    }

    Ok(())
}
