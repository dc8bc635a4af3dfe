//! User business logic - account creation, lookup and deactivation.
//!
//! Authentication lives outside this crate; these functions only maintain the
//! rows the order and messaging engines validate against.

use crate::{
    core::{EngineContext, status::UserRole},
    entities::{User, user},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};

/// Creates an active user account.
///
/// # Errors
/// Returns an error if the name or email is empty, or the insert fails.
pub async fn create_user(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    full_name: &str,
    email: &str,
    phone: Option<String>,
    role: UserRole,
) -> Result<user::Model> {
    if full_name.trim().is_empty() {
        return Err(Error::validation("User name cannot be empty"));
    }
    if email.trim().is_empty() {
        return Err(Error::validation("User email cannot be empty"));
    }

    let user = user::ActiveModel {
        full_name: Set(full_name.trim().to_string()),
        email: Set(email.trim().to_lowercase()),
        phone: Set(phone),
        role: Set(role.as_str().to_string()),
        is_active: Set(true),
        created_at: Set(ctx.clock.now()),
        ..Default::default()
    };
    user.insert(db).await.map_err(Into::into)
}

/// Finds a user by id, active or not.
pub async fn get_user_by_id(db: &DatabaseConnection, user_id: i64) -> Result<Option<user::Model>> {
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Deactivates an account. Deactivated buyers cannot place new orders.
pub async fn deactivate_user(db: &DatabaseConnection, user_id: i64) -> Result<user::Model> {
    let mut user: user::ActiveModel = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?
        .into();
    user.is_active = Set(false);
    user.update(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_user_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let ctx = EngineContext::detached();

        let result = create_user(&db, &ctx, "  ", "a@b.c", None, UserRole::Buyer).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let result = create_user(&db, &ctx, "Amal", "", None, UserRole::Buyer).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_and_deactivate_user() -> Result<()> {
        let db = setup_test_db().await?;
        let ctx = EngineContext::detached();

        let user = create_user(
            &db,
            &ctx,
            " Amal Haddad ",
            "Amal@Example.com",
            Some("555-0101".to_string()),
            UserRole::Farmer,
        )
        .await?;
        assert_eq!(user.full_name, "Amal Haddad");
        assert_eq!(user.email, "amal@example.com");
        assert_eq!(user.role, "farmer");
        assert!(user.is_active);

        let deactivated = deactivate_user(&db, user.id).await?;
        assert!(!deactivated.is_active);

        let found = get_user_by_id(&db, user.id).await?.unwrap();
        assert!(!found.is_active);

        Ok(())
    }

    #[tokio::test]
    async fn test_deactivate_missing_user() -> Result<()> {
        let db = setup_test_db().await?;
        let result = deactivate_user(&db, 999).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::NotFound {
                entity: "user",
                id: 999
            }
        ));
        Ok(())
    }
}
