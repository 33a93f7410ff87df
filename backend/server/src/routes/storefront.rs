use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::AuthUser,
    catalog::{self, Category, ProductView},
    cms::{self, ContentBlock},
    error::AppError,
    orders::{self, OrderTracking},
    promo::{self, PromoEventView},
    reviews::{self, ReviewRequest, ReviewSummary, SubmittedReview},
    search::{self, SearchProduct},
    site_lock::{self, LockStatus},
    state::AppState,
    theme::{self, Theme},
};

const DEFAULT_SEARCH_LIMIT: usize = 20;

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn site_status_handler(State(state): State<Arc<AppState>>) -> Result<Json<LockStatus>, AppError> {
    Ok(Json(site_lock::current_status(&state).await?))
}

pub async fn theme_handler(State(state): State<Arc<AppState>>) -> Result<Json<Theme>, AppError> {
    Ok(Json(theme::get(&state).await?))
}

pub async fn content_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ContentBlock>, AppError> {
    Ok(Json(cms::get(&state, &key).await?))
}

pub async fn categories_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(catalog::list_categories(&state).await?))
}

#[derive(Deserialize)]
pub struct ProductFilter {
    pub category: Option<i64>,
}

pub async fn products_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<ProductView>>, AppError> {
    Ok(Json(catalog::list_products(&state, filter.category).await?))
}

pub async fn product_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ProductView>, AppError> {
    let product = catalog::product_by_slug(&state, &slug).await?;

    Ok(Json(product.view(Utc::now())))
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub category: Option<i64>,
    pub limit: Option<usize>,
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchProduct>>, AppError> {
    if params.q.chars().count() > 100 {
        return Err(AppError::invalid("Search query is too long"));
    }

    let hits = search::search_products(
        &state.meili_client,
        params.q.trim(),
        params.category,
        params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
    )
    .await?;

    Ok(Json(hits))
}

pub async fn promos_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<PromoEventView>>, AppError> {
    Ok(Json(promo::list_running(&state).await?))
}

pub async fn reviews_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ReviewSummary>, AppError> {
    Ok(Json(reviews::list_for_product(&state, &slug).await?))
}

pub async fn submit_review_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<SubmittedReview>), AppError> {
    let submitted = reviews::submit(&state, &user, &slug, request).await?;

    Ok((StatusCode::CREATED, Json(submitted)))
}

pub async fn track_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<OrderTracking>, AppError> {
    Ok(Json(orders::track(&state, &code).await?))
}
