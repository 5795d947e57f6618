//! User entity - Platform accounts that can earn commissions or administer finance.
//!
//! Only the fields the finance service needs are modelled: identity, contact e-mail and
//! the admin flag checked by the admin-only endpoints.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login e-mail, unique across the platform
    #[sea_orm(unique)]
    pub email: String,
    /// Display name
    pub name: String,
    /// Whether the user may access `/admin/finance/*`
    pub is_admin: bool,
    /// When the account was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user earns many commissions
    #[sea_orm(has_many = "super::commission::Entity")]
    Commissions,
}

impl Related<super::commission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
