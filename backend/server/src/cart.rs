//! # Cart
//!
//! Carts live in Redis (see [`crate::database`]) as product id to quantity.
//! Prices are never stored with the cart: every view re-prices lines from the
//! catalog so a promo that ended five minutes ago is already gone from the
//! total.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    catalog::{self, Product, ProductView},
    database::{cart_clear, cart_increment, cart_items, cart_remove, cart_set},
    error::AppError,
    state::AppState,
};

pub const MAX_LINE_QUANTITY: i64 = 99;

pub fn validate_quantity(quantity: i64) -> Result<i64, AppError> {
    if (1..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(AppError::invalid(format!(
            "Quantity must be between 1 and {MAX_LINE_QUANTITY}"
        )))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddItem {
    pub product_id: i64,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetQuantity {
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product: ProductView,
    pub quantity: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: i64,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Parses the raw Redis hash into product id and quantity pairs. Fields that
/// are not ids and non-positive quantities are reported as stale.
pub fn parse_items(raw: HashMap<String, i64>) -> (Vec<(i64, i64)>, Vec<String>) {
    let mut items = Vec::new();
    let mut stale = Vec::new();

    for (field, quantity) in raw {
        match field.parse::<i64>() {
            Ok(product_id) if quantity > 0 => {
                items.push((product_id, quantity.min(MAX_LINE_QUANTITY)))
            }
            _ => stale.push(field),
        }
    }

    items.sort_unstable_by_key(|(product_id, _)| *product_id);
    (items, stale)
}

/// Joins cart items with the catalog. Returns the view and the ids of items
/// whose product is gone or unlisted.
pub fn build_view(
    items: &[(i64, i64)],
    products: &HashMap<i64, Product>,
    now: DateTime<Utc>,
) -> (CartView, Vec<i64>) {
    let mut view = CartView::default();
    let mut missing = Vec::new();

    for &(product_id, quantity) in items {
        let Some(product) = products.get(&product_id).filter(|product| product.is_active) else {
            missing.push(product_id);
            continue;
        };

        let product = product.clone().view(now);
        let line_total = product.effective_price * quantity;

        view.item_count += quantity;
        view.subtotal += line_total;
        view.lines.push(CartLine {
            product,
            quantity,
            line_total,
        });
    }

    (view, missing)
}

pub async fn view_cart(state: &AppState, user_id: &str) -> Result<CartView, AppError> {
    let mut connection = state.redis_connection.clone();

    let (items, stale_fields) = parse_items(cart_items(&mut connection, user_id).await?);
    let ids: Vec<i64> = items.iter().map(|(product_id, _)| *product_id).collect();
    let products = catalog::active_products_by_id(state, &ids).await?;

    let (view, missing) = build_view(&items, &products, Utc::now());

    if !stale_fields.is_empty() {
        warn!("Dropping {} unreadable cart fields for {user_id}", stale_fields.len());
        cart_remove(&mut connection, user_id, &stale_fields).await?;
    }

    if !missing.is_empty() {
        info!("Removing unavailable products {missing:?} from cart of {user_id}");
        cart_remove(&mut connection, user_id, &missing).await?;
    }

    Ok(view)
}

pub async fn add_item(state: &AppState, user_id: &str, item: AddItem) -> Result<CartView, AppError> {
    let quantity = validate_quantity(item.quantity)?;

    if catalog::active_products_by_id(state, &[item.product_id])
        .await?
        .is_empty()
    {
        return Err(AppError::NotFound("Product"));
    }

    let mut connection = state.redis_connection.clone();
    cart_increment(&mut connection, user_id, item.product_id, quantity, MAX_LINE_QUANTITY).await?;

    view_cart(state, user_id).await
}

/// Sets a line's quantity. Zero removes the line.
pub async fn set_quantity(
    state: &AppState,
    user_id: &str,
    product_id: i64,
    quantity: i64,
) -> Result<CartView, AppError> {
    let mut connection = state.redis_connection.clone();

    if quantity == 0 {
        cart_remove(&mut connection, user_id, &[product_id]).await?;
    } else {
        let quantity = validate_quantity(quantity)?;
        cart_set(&mut connection, user_id, product_id, quantity).await?;
    }

    view_cart(state, user_id).await
}

pub async fn remove_item(state: &AppState, user_id: &str, product_id: i64) -> Result<CartView, AppError> {
    set_quantity(state, user_id, product_id, 0).await
}

pub async fn clear(state: &AppState, user_id: &str) -> Result<(), AppError> {
    let mut connection = state.redis_connection.clone();
    cart_clear(&mut connection, user_id).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(id: i64, price: i64, discount: Option<i64>, active: bool) -> Product {
        Product {
            id,
            category_id: None,
            name: format!("Donut {id}"),
            slug: format!("donut-{id}"),
            description: None,
            price,
            discount_price: discount,
            promo_starts_at: None,
            promo_ends_at: None,
            image_url: None,
            is_active: active,
            created_at: None,
        }
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(100).is_err());
        assert_eq!(validate_quantity(1).unwrap(), 1);
        assert_eq!(validate_quantity(99).unwrap(), 99);
    }

    #[test]
    fn test_parse_items_flags_stale_fields() {
        let raw = HashMap::from([
            ("2".to_string(), 3),
            ("1".to_string(), 150),
            ("oops".to_string(), 1),
            ("3".to_string(), 0),
        ]);

        let (items, mut stale) = parse_items(raw);
        stale.sort();

        assert_eq!(items, vec![(1, 99), (2, 3)]);
        assert_eq!(stale, vec!["3".to_string(), "oops".to_string()]);
    }

    #[test]
    fn test_build_view_prices_lines() {
        let products = HashMap::from([
            (1, product(1, 20_000, Some(15_000), true)),
            (2, product(2, 12_000, None, true)),
        ]);

        let (view, missing) = build_view(&[(1, 2), (2, 3)], &products, Utc::now());

        assert!(missing.is_empty());
        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.lines[0].line_total, 30_000);
        assert_eq!(view.item_count, 5);
        assert_eq!(view.subtotal, 30_000 + 36_000);
    }

    #[test]
    fn test_build_view_drops_unavailable() {
        let products = HashMap::from([(1, product(1, 20_000, None, false))]);

        let (view, missing) = build_view(&[(1, 1), (7, 2)], &products, Utc::now());

        assert!(view.is_empty());
        assert_eq!(view.subtotal, 0);
        assert_eq!(missing, vec![1, 7]);
    }
}
