//! User business logic - Lookup and admin seeding.

use crate::{
    entities::{User, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};

/// Creates a user. E-mails are unique.
pub async fn create_user(
    db: &DatabaseConnection,
    email: &str,
    name: &str,
    is_admin: bool,
) -> Result<user::Model> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(Error::validation(format!("Invalid e-mail address '{email}'")));
    }
    if find_by_email(db, &email).await?.is_some() {
        return Err(Error::Duplicate {
            entity: "User",
            key: email,
        });
    }

    let created = user::ActiveModel {
        email: Set(email),
        name: Set(name.to_string()),
        is_admin: Set(is_admin),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = created.id, is_admin, "created user");
    Ok(created)
}

/// Retrieves a user by id.
pub async fn get_user(db: &DatabaseConnection, user_id: i64) -> Result<Option<user::Model>> {
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Retrieves a user by e-mail (case-insensitive).
pub async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Email.eq(email.trim().to_lowercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Makes sure an admin account exists for `email`.
///
/// Creates the user if needed and promotes an existing non-admin. Used at startup to
/// seed the first administrator.
pub async fn ensure_admin(db: &DatabaseConnection, email: &str) -> Result<user::Model> {
    match find_by_email(db, email).await? {
        Some(existing) if existing.is_admin => Ok(existing),
        Some(existing) => {
            let mut active: user::ActiveModel = existing.into();
            active.is_admin = Set(true);
            let promoted = active.update(db).await?;
            tracing::info!(user_id = promoted.id, "promoted user to admin");
            Ok(promoted)
        }
        None => create_user(db, email, "Administrator", true).await,
    }
}
