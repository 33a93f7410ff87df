//! # Catalog
//!
//! Categories and products. Prices are whole Rupiah.
//!
//! Every product write is pushed to the search index right away. A failed
//! sync only logs, because `process reindex` rebuilds the index from scratch.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::{
    activity,
    error::AppError,
    promo::{PromoWindow, discount_percent, effective_price},
    search,
    state::AppState,
    supabase::{Query, Supabase},
    utils::{bounded_text, slugify},
};

pub const CATEGORIES_TABLE: &str = "categories";
pub const PRODUCTS_TABLE: &str = "products";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl CategoryInput {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.name = bounded_text(&self.name, 2, 60)
            .ok_or_else(|| AppError::invalid("Category name must be 2 to 60 characters"))?;
        self.slug = Some(resolve_slug(self.slug.as_deref(), &self.name)?);

        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub promo_starts_at: Option<DateTime<Utc>>,
    pub promo_ends_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn promo_window(&self) -> PromoWindow {
        PromoWindow {
            starts_at: self.promo_starts_at,
            ends_at: self.promo_ends_at,
        }
    }

    pub fn effective_price(&self, now: DateTime<Utc>) -> i64 {
        effective_price(self.price, self.discount_price, &self.promo_window(), now)
    }

    pub fn view(self, now: DateTime<Utc>) -> ProductView {
        let effective_price = self.effective_price(now);

        ProductView {
            discount_percent: discount_percent(self.price, effective_price),
            promo_active: effective_price < self.price,
            effective_price,
            product: self,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub effective_price: i64,
    pub discount_percent: u32,
    pub promo_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInput {
    pub category_id: Option<i64>,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub promo_starts_at: Option<DateTime<Utc>>,
    pub promo_ends_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    #[serde(default = "listed")]
    pub is_active: bool,
}

fn listed() -> bool {
    true
}

impl ProductInput {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.name = bounded_text(&self.name, 2, 100)
            .ok_or_else(|| AppError::invalid("Product name must be 2 to 100 characters"))?;
        self.slug = Some(resolve_slug(self.slug.as_deref(), &self.name)?);

        if self.price <= 0 {
            return Err(AppError::invalid("Price must be positive"));
        }

        if let Some(discount) = self.discount_price
            && (discount <= 0 || discount >= self.price)
        {
            return Err(AppError::invalid("Discount price must be positive and below the price"));
        }

        if let Some(description) = &self.description
            && description.chars().count() > 2000
        {
            return Err(AppError::invalid("Description is too long"));
        }

        PromoWindow {
            starts_at: self.promo_starts_at,
            ends_at: self.promo_ends_at,
        }
        .validate()?;

        Ok(self)
    }
}

fn resolve_slug(given: Option<&str>, name: &str) -> Result<String, AppError> {
    let slug = slugify(given.unwrap_or(name));

    if slug.is_empty() {
        return Err(AppError::invalid("Slug must contain letters or digits"));
    }

    Ok(slug)
}

pub async fn list_categories(state: &AppState) -> Result<Vec<Category>, AppError> {
    state
        .supabase
        .select(
            CATEGORIES_TABLE,
            &Query::new().select("*").order("sort_order", true),
        )
        .await
}

pub async fn list_products(
    state: &AppState,
    category_id: Option<i64>,
) -> Result<Vec<ProductView>, AppError> {
    let mut query = Query::new().select("*").eq("is_active", true);
    if let Some(category_id) = category_id {
        query = query.eq("category_id", category_id);
    }

    let products: Vec<Product> = state
        .supabase
        .select(PRODUCTS_TABLE, &query.order("name", true))
        .await?;

    let now = Utc::now();
    Ok(products.into_iter().map(|product| product.view(now)).collect())
}

pub async fn all_products(state: &AppState) -> Result<Vec<Product>, AppError> {
    fetch_all_products(&state.supabase).await
}

/// Every product including inactive ones, ordered by id.
pub async fn fetch_all_products(supabase: &Supabase) -> Result<Vec<Product>, AppError> {
    supabase
        .select(PRODUCTS_TABLE, &Query::new().select("*").order("id", true))
        .await
}

pub async fn product_by_slug(state: &AppState, slug: &str) -> Result<Product, AppError> {
    state
        .supabase
        .select_one(
            PRODUCTS_TABLE,
            Query::new().select("*").eq("slug", slug).eq("is_active", true),
        )
        .await?
        .ok_or(AppError::NotFound("Product"))
}

/// Active products among `ids`, keyed by id.
pub async fn active_products_by_id(
    state: &AppState,
    ids: &[i64],
) -> Result<HashMap<i64, Product>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let products: Vec<Product> = state
        .supabase
        .select(
            PRODUCTS_TABLE,
            &Query::new().select("*").is_in("id", ids).eq("is_active", true),
        )
        .await?;

    Ok(products.into_iter().map(|product| (product.id, product)).collect())
}

async fn sync_search(state: &AppState, product: &Product) {
    if let Err(e) = search::upsert_products(&state.meili_client, std::slice::from_ref(product)).await {
        warn!("Failed to index product {}: {e}", product.id);
    }
}

pub async fn create_product(
    state: &AppState,
    actor_id: &str,
    input: ProductInput,
) -> Result<Product, AppError> {
    let input = input.validate()?;
    let product: Product = state.supabase.insert(PRODUCTS_TABLE, &input).await?;

    sync_search(state, &product).await;
    activity::record(
        state,
        actor_id,
        "product.create",
        "product",
        &product.id.to_string(),
        json!({ "name": product.name, "price": product.price }),
    )
    .await;

    Ok(product)
}

pub async fn update_product(
    state: &AppState,
    actor_id: &str,
    id: i64,
    input: ProductInput,
) -> Result<Product, AppError> {
    let input = input.validate()?;
    let mut rows: Vec<Product> = state
        .supabase
        .update(PRODUCTS_TABLE, &Query::new().eq("id", id), &input)
        .await?;

    let product = rows.pop().ok_or(AppError::NotFound("Product"))?;

    sync_search(state, &product).await;
    activity::record(
        state,
        actor_id,
        "product.update",
        "product",
        &id.to_string(),
        json!({ "name": product.name, "price": product.price, "is_active": product.is_active }),
    )
    .await;

    Ok(product)
}

pub async fn delete_product(state: &AppState, actor_id: &str, id: i64) -> Result<(), AppError> {
    let removed = state
        .supabase
        .delete(PRODUCTS_TABLE, &Query::new().eq("id", id))
        .await?;

    if removed == 0 {
        return Err(AppError::NotFound("Product"));
    }

    if let Err(e) = search::delete_product(&state.meili_client, id).await {
        warn!("Failed to drop product {id} from search: {e}");
    }
    activity::record(state, actor_id, "product.delete", "product", &id.to_string(), json!({})).await;

    Ok(())
}

pub async fn create_category(
    state: &AppState,
    actor_id: &str,
    input: CategoryInput,
) -> Result<Category, AppError> {
    let input = input.validate()?;
    let category: Category = state.supabase.insert(CATEGORIES_TABLE, &input).await?;

    activity::record(
        state,
        actor_id,
        "category.create",
        "category",
        &category.id.to_string(),
        json!({ "name": category.name }),
    )
    .await;

    Ok(category)
}

pub async fn update_category(
    state: &AppState,
    actor_id: &str,
    id: i64,
    input: CategoryInput,
) -> Result<Category, AppError> {
    let input = input.validate()?;
    let mut rows: Vec<Category> = state
        .supabase
        .update(CATEGORIES_TABLE, &Query::new().eq("id", id), &input)
        .await?;

    let category = rows.pop().ok_or(AppError::NotFound("Category"))?;

    activity::record(
        state,
        actor_id,
        "category.update",
        "category",
        &id.to_string(),
        json!({ "name": category.name }),
    )
    .await;

    Ok(category)
}

pub async fn delete_category(state: &AppState, actor_id: &str, id: i64) -> Result<(), AppError> {
    let removed = state
        .supabase
        .delete(CATEGORIES_TABLE, &Query::new().eq("id", id))
        .await?;

    if removed == 0 {
        return Err(AppError::NotFound("Category"));
    }

    activity::record(state, actor_id, "category.delete", "category", &id.to_string(), json!({})).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn product(id: i64, price: i64, discount: Option<i64>) -> Product {
        Product {
            id,
            category_id: Some(1),
            name: format!("Donut {id}"),
            slug: format!("donut-{id}"),
            description: None,
            price,
            discount_price: discount,
            promo_starts_at: None,
            promo_ends_at: None,
            image_url: None,
            is_active: true,
            created_at: None,
        }
    }

    fn input(name: &str, price: i64, discount: Option<i64>) -> ProductInput {
        ProductInput {
            category_id: None,
            name: name.into(),
            slug: None,
            description: None,
            price,
            discount_price: discount,
            promo_starts_at: None,
            promo_ends_at: None,
            image_url: None,
            is_active: true,
        }
    }

    #[test]
    fn test_view_applies_live_discount() {
        let view = product(1, 20_000, Some(15_000)).view(Utc::now());

        assert_eq!(view.effective_price, 15_000);
        assert_eq!(view.discount_percent, 25);
        assert!(view.promo_active);
    }

    #[test]
    fn test_view_ignores_expired_discount() {
        let now = Utc::now();
        let mut expired = product(2, 20_000, Some(15_000));
        expired.promo_ends_at = Some(now - Duration::hours(1));

        let view = expired.view(now);
        assert_eq!(view.effective_price, 20_000);
        assert_eq!(view.discount_percent, 0);
        assert!(!view.promo_active);
    }

    #[test]
    fn test_view_flattens_product() {
        let json = serde_json::to_value(product(3, 12_000, None).view(Utc::now())).unwrap();

        assert_eq!(json["slug"], "donut-3");
        assert_eq!(json["effective_price"], 12_000);
    }

    #[test]
    fn test_product_input_derives_slug() {
        let valid = input(" Boston Cream ", 18_000, Some(15_000)).validate().unwrap();

        assert_eq!(valid.name, "Boston Cream");
        assert_eq!(valid.slug.as_deref(), Some("boston-cream"));
    }

    #[test]
    fn test_product_input_rejects_bad_prices() {
        assert!(input("Glazed", 0, None).validate().is_err());
        assert!(input("Glazed", 10_000, Some(10_000)).validate().is_err());
        assert!(input("Glazed", 10_000, Some(-1)).validate().is_err());
    }

    #[test]
    fn test_product_input_rejects_inverted_promo() {
        let now = Utc::now();
        let mut inverted = input("Glazed", 10_000, Some(8_000));
        inverted.promo_starts_at = Some(now);
        inverted.promo_ends_at = Some(now - Duration::days(1));

        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_category_input_slug() {
        let category = CategoryInput {
            name: "Signature Box".into(),
            slug: Some("Signature_Box".into()),
            sort_order: 2,
        };

        assert_eq!(category.validate().unwrap().slug.as_deref(), Some("signature-box"));

        let unsluggable = CategoryInput {
            name: "!!".into(),
            slug: None,
            sort_order: 0,
        };
        assert!(unsluggable.validate().is_err());
    }
}
