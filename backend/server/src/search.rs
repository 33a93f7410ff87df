//! # Meilisearch
//!
//! Search engine behind the storefront search box.
//!
//!
//!
//! ## Schema
//! - Index for all products, primary key `id`
//! - Fields: id (**int**), name (**string**), slug (**string**), category_id
//!   (**int**, optional), price (**int**), effective_price (**int**),
//!   is_active (**bool**)
//!
//!
//!
//! ## Sync
//! - Admin product writes upsert or delete their document immediately
//! - `effective_price` is a snapshot taken at write time, so a promo window
//!   opening or closing is only picked up by the next `process reindex`.
//!   The storefront re-prices hits from the catalog before showing a cart,
//!   so a stale snapshot never reaches checkout.
//!
//!
//!
//! ## Commands
//!
//! Grab relevant keys.
//! ```sh
//! curl -H "Authorization: Bearer $(cat /run/secrets/MEILI_MASTER_KEY)" http://localhost:7700/keys
//! ```
use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use meilisearch_sdk::{
    client::Client,
    documents::DocumentsQuery,
    errors::Error,
    settings::{MinWordSizeForTypos, Settings, TypoToleranceSettings},
};
use serde::{Deserialize, Serialize};

use crate::catalog::Product;

pub const PRODUCT_INDEX: &str = "products";
pub const PRODUCT_ID: &str = "id";
pub const PRODUCT_NAME: &str = "name";
pub const PRODUCT_CATEGORY: &str = "category_id";
pub const PRODUCT_PRICE: &str = "price";
pub const PRODUCT_ACTIVE: &str = "is_active";

pub const MAX_SEARCH_LIMIT: usize = 50;
const ID_PAGE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProduct {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub category_id: Option<i64>,
    pub price: i64,
    pub effective_price: i64,
    pub image_url: Option<String>,
    pub is_active: bool,
}

impl From<&Product> for SearchProduct {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            category_id: product.category_id,
            price: product.price,
            effective_price: product.effective_price(Utc::now()),
            image_url: product.image_url.clone(),
            is_active: product.is_active,
        }
    }
}

pub async fn init_meilisearch(meili_url: &str, meili_admin_key: &str) -> Result<Arc<Client>, Error> {
    let meili_client = Arc::new(Client::new(meili_url, Some(meili_admin_key))?);

    meili_client
        .index(PRODUCT_INDEX)
        .set_settings(&init_settings())
        .await?;

    Ok(meili_client)
}

pub async fn upsert_products(meili_client: &Client, products: &[Product]) -> Result<(), Error> {
    let documents: Vec<SearchProduct> = products.iter().map(SearchProduct::from).collect();

    upsert_items(meili_client, PRODUCT_INDEX, &documents, PRODUCT_ID).await
}

pub async fn delete_product(meili_client: &Client, id: i64) -> Result<(), Error> {
    meili_client.index(PRODUCT_INDEX).delete_document(id).await?;

    Ok(())
}

pub async fn delete_products(meili_client: &Client, ids: &[i64]) -> Result<(), Error> {
    if ids.is_empty() {
        return Ok(());
    }

    meili_client
        .index(PRODUCT_INDEX)
        .delete_documents(ids)
        .await?
        .wait_for_completion(meili_client, None, None)
        .await?;

    Ok(())
}

#[derive(Deserialize)]
struct IndexedId {
    id: i64,
}

/// Every product id currently in the index.
pub async fn indexed_product_ids(meili_client: &Client) -> Result<Vec<i64>, Error> {
    let index = meili_client.index(PRODUCT_INDEX);
    let mut ids = Vec::new();

    loop {
        let page = index
            .get_documents_with::<IndexedId>(
                DocumentsQuery::new(&index)
                    .with_fields([PRODUCT_ID])
                    .with_offset(ids.len())
                    .with_limit(ID_PAGE),
            )
            .await?;

        let fetched = page.results.len();
        ids.extend(page.results.into_iter().map(|doc| doc.id));

        if fetched < ID_PAGE {
            return Ok(ids);
        }
    }
}

/// Indexed ids that no longer have a row in `products`.
pub fn stale_ids(indexed: &[i64], products: &[Product]) -> Vec<i64> {
    let live: HashSet<i64> = products.iter().map(|product| product.id).collect();

    indexed.iter().copied().filter(|id| !live.contains(id)).collect()
}

async fn upsert_items<T>(meili_client: &Client, index_name: &str, items: &[T], id_name: &str) -> Result<(), Error>
where
    T: Serialize + Send + Sync,
{
    let _result = meili_client
        .index(index_name)
        .add_or_update(items, Some(id_name))
        .await?
        .wait_for_completion(meili_client, None, None)
        .await?;

    #[cfg(feature = "verbose")]
    tracing::info!("Meili task result: {:?}", _result);

    Ok(())
}

/// Meilisearch filter for active products, optionally within one category.
pub fn product_filter(category_id: Option<i64>) -> String {
    match category_id {
        Some(category_id) => format!("{PRODUCT_ACTIVE} = true AND {PRODUCT_CATEGORY} = {category_id}"),
        None => format!("{PRODUCT_ACTIVE} = true"),
    }
}

pub async fn search_products(
    meili_client: &Client,
    query: &str,
    category_id: Option<i64>,
    limit: usize,
) -> Result<Vec<SearchProduct>, Error> {
    let filter = product_filter(category_id);
    let index = meili_client.index(PRODUCT_INDEX);

    let mut search = index.search();
    search
        .with_query(query)
        .with_filter(&filter)
        .with_limit(limit.clamp(1, MAX_SEARCH_LIMIT));

    let results = search.execute::<SearchProduct>().await?;

    Ok(results.hits.into_iter().map(|hit| hit.result).collect())
}

fn init_settings() -> Settings {
    Settings::new()
        .with_ranking_rules([
            "words",
            "typo",
            "proximity",
            "exactness",
            "attribute",
            "sort",
        ])
        .with_filterable_attributes([PRODUCT_CATEGORY, PRODUCT_ACTIVE])
        .with_searchable_attributes([PRODUCT_NAME])
        .with_sortable_attributes([PRODUCT_PRICE])
        .with_typo_tolerance(TypoToleranceSettings {
            enabled: Some(true),
            disable_on_attributes: None,
            disable_on_words: None,
            min_word_size_for_typos: Some(MinWordSizeForTypos {
                one_typo: Some(5),
                two_typos: Some(9),
            }),
        })
}

#[cfg(test)]
mod tests {
    use super::{product_filter, stale_ids};
    use crate::catalog::Product;

    fn product(id: i64) -> Product {
        Product {
            id,
            name: format!("Donut {id}"),
            slug: format!("donut-{id}"),
            description: None,
            category_id: None,
            price: 10_000,
            discount_price: None,
            promo_starts_at: None,
            promo_ends_at: None,
            image_url: None,
            is_active: true,
            created_at: None,
        }
    }

    #[test]
    fn test_filter_without_category() {
        assert_eq!(product_filter(None), "is_active = true");
    }

    #[test]
    fn test_filter_with_category() {
        assert_eq!(product_filter(Some(4)), "is_active = true AND category_id = 4");
    }

    #[test]
    fn test_stale_ids() {
        let products = vec![product(1), product(3)];

        assert_eq!(stale_ids(&[1, 2, 3, 4], &products), vec![2, 4]);
        assert!(stale_ids(&[1, 3], &products).is_empty());
        assert_eq!(stale_ids(&[7], &[]), vec![7]);
    }
}
