//! Product business logic - listing creation, lookup and soft deactivation.
//!
//! Stock is deliberately not editable here: remaining quantity only moves through
//! order confirmation/cancellation and [`crate::core::stock::adjust_stock`], all of
//! which lock the row first.

use crate::{
    core::{EngineContext, status::ProductStatus},
    entities::{Product, User, product},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Fields a farmer supplies when listing a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Listing title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Price per unit
    pub price: f64,
    /// Unit of measure (e.g., "kg")
    pub unit: String,
    /// Optional category
    pub category: Option<String>,
    /// Initial stock
    pub quantity: i32,
}

/// The product can be ordered at all: listed and with stock left.
#[must_use]
pub fn is_available(product: &product::Model) -> bool {
    product.status == ProductStatus::Active.as_str() && product.remaining_quantity > 0
}

/// `quantity` is positive and covered by the remaining stock.
#[must_use]
pub const fn can_order_quantity(product: &product::Model, quantity: i32) -> bool {
    quantity > 0 && quantity <= product.remaining_quantity
}

/// Lists a new product for a farmer, with remaining stock equal to the initial quantity.
///
/// # Errors
/// Returns an error if:
/// - The title is empty or whitespace-only
/// - The price is negative or not finite
/// - The quantity is negative
/// - The farmer does not exist
pub async fn create_product(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    farmer_id: i64,
    new_product: NewProduct,
) -> Result<product::Model> {
    if new_product.title.trim().is_empty() {
        return Err(Error::validation("Product title cannot be empty"));
    }
    if !new_product.price.is_finite() || new_product.price < 0.0 {
        return Err(Error::validation(format!(
            "Invalid product price {}",
            new_product.price
        )));
    }
    if new_product.quantity < 0 {
        return Err(Error::validation("Product quantity cannot be negative"));
    }

    User::find_by_id(farmer_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", farmer_id))?;

    let now = ctx.clock.now();
    let status = ProductStatus::Active.after_stock_change(new_product.quantity);
    let product = product::ActiveModel {
        farmer_id: Set(farmer_id),
        title: Set(new_product.title.trim().to_string()),
        description: Set(new_product.description),
        price: Set(new_product.price),
        unit: Set(new_product.unit),
        category: Set(new_product.category),
        original_quantity: Set(new_product.quantity),
        remaining_quantity: Set(new_product.quantity),
        status: Set(status.as_str().to_string()),
        order_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    product.insert(db).await.map_err(Into::into)
}

/// Retrieves a specific product by its unique ID.
pub async fn get_product_by_id(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// All of a farmer's listings that are not deactivated, newest first.
pub async fn get_listed_products_for_farmer(
    db: &DatabaseConnection,
    farmer_id: i64,
) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::FarmerId.eq(farmer_id))
        .filter(product::Column::Status.ne(ProductStatus::Inactive.as_str()))
        .order_by_desc(product::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Withdraws a listing. The row is kept so existing orders stay intact.
///
/// # Errors
/// Returns an error if the product does not exist, is already inactive, or
/// `farmer_id` does not own it.
pub async fn deactivate_product(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    product_id: i64,
    farmer_id: i64,
) -> Result<product::Model> {
    let existing = Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))?;

    if existing.farmer_id != farmer_id {
        return Err(Error::validation("Only the owning farmer can withdraw a product"));
    }
    if existing.status == ProductStatus::Inactive.as_str() {
        return Err(Error::not_found("product", product_id));
    }

    let mut product: product::ActiveModel = existing.into();
    product.status = Set(ProductStatus::Inactive.as_str().to_string());
    product.updated_at = Set(ctx.clock.now());
    product.update(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn tomatoes(quantity: i32) -> NewProduct {
        NewProduct {
            title: "Tomatoes".to_string(),
            description: None,
            price: 2.5,
            unit: "kg".to_string(),
            category: Some("vegetables".to_string()),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_create_product_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let ctx = EngineContext::detached();

        let mut blank = tomatoes(5);
        blank.title = "   ".to_string();
        let result = create_product(&db, &ctx, 1, blank).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let mut negative_price = tomatoes(5);
        negative_price.price = -1.0;
        let result = create_product(&db, &ctx, 1, negative_price).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let mut nan_price = tomatoes(5);
        nan_price.price = f64::NAN;
        let result = create_product(&db, &ctx, 1, nan_price).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let result = create_product(&db, &ctx, 1, tomatoes(-1)).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_integration() -> Result<()> {
        let (db, ctx, farmer, _buyer) = setup_with_users().await?;

        let product = create_product(&db, &ctx, farmer.id, tomatoes(12)).await?;
        assert_eq!(product.title, "Tomatoes");
        assert_eq!(product.price, 2.5);
        assert_eq!(product.original_quantity, 12);
        assert_eq!(product.remaining_quantity, 12);
        assert_eq!(product.status, "active");
        assert_eq!(product.order_count, 0);
        assert!(is_available(&product));

        let empty = create_product(&db, &ctx, farmer.id, tomatoes(0)).await?;
        assert_eq!(empty.status, "sold_out");
        assert!(!is_available(&empty));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_unknown_farmer() -> Result<()> {
        let db = setup_test_db().await?;
        let ctx = EngineContext::detached();
        let result = create_product(&db, &ctx, 404, tomatoes(3)).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::NotFound {
                entity: "user",
                id: 404
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_can_order_quantity_bounds() -> Result<()> {
        let (db, ctx, farmer, _buyer) = setup_with_users().await?;
        let product = create_product(&db, &ctx, farmer.id, tomatoes(5)).await?;

        assert!(can_order_quantity(&product, 1));
        assert!(can_order_quantity(&product, 5));
        assert!(!can_order_quantity(&product, 6));
        assert!(!can_order_quantity(&product, 0));
        assert!(!can_order_quantity(&product, -2));

        Ok(())
    }

    #[tokio::test]
    async fn test_deactivate_product() -> Result<()> {
        let (db, ctx, farmer, buyer) = setup_with_users().await?;
        let product = create_product(&db, &ctx, farmer.id, tomatoes(5)).await?;

        // Only the owner may withdraw it
        let result = deactivate_product(&db, &ctx, product.id, buyer.id).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let withdrawn = deactivate_product(&db, &ctx, product.id, farmer.id).await?;
        assert_eq!(withdrawn.status, "inactive");
        assert!(!is_available(&withdrawn));

        // Row is kept, but no longer listed
        assert!(get_product_by_id(&db, product.id).await?.is_some());
        assert!(get_listed_products_for_farmer(&db, farmer.id).await?.is_empty());

        // Second withdrawal fails
        let result = deactivate_product(&db, &ctx, product.id, farmer.id).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        Ok(())
    }
}
