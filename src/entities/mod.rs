//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod commission;
pub mod order;
pub mod order_item;
pub mod transaction_ledger;
pub mod user;

// Re-export specific types to avoid conflicts
pub use commission::{
    Column as CommissionColumn, CommissionStatus, Entity as Commission, Model as CommissionModel,
    PaymentMethod,
};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Column as OrderItemColumn, Entity as OrderItem, Model as OrderItemModel};
pub use transaction_ledger::{
    Account, Column as LedgerColumn, Entity as TransactionLedger, Model as LedgerModel,
    TransactionType,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
