use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    accounts::{Profile, Role},
    activity::{self, ActivityEntry},
    auth::AdminUser,
    catalog::{self, Category, CategoryInput, Product, ProductInput},
    cms::{self, ContentBlock, ContentInput},
    error::AppError,
    orders::{self, Order, OrderStatus, StatusUpdate},
    promo::{self, PromoEvent, PromoEventInput},
    site_lock::{self, LockStatus, SiteSettingsUpdate},
    state::AppState,
    supabase::AdminUserRecord,
    theme::{self, Theme},
    users::{self, ForceLogout, RoleUpdate},
};

pub async fn products_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(catalog::all_products(&state).await?))
}

pub async fn create_product_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = catalog::create_product(&state, &admin.user.id, input).await?;

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(
        catalog::update_product(&state, &admin.user.id, id, input).await?,
    ))
}

pub async fn delete_product_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    catalog::delete_product(&state, &admin.user.id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_category_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = catalog::create_category(&state, &admin.user.id, input).await?;

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(
        catalog::update_category(&state, &admin.user.id, id, input).await?,
    ))
}

pub async fn delete_category_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    catalog::delete_category(&state, &admin.user.id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn promos_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<PromoEvent>>, AppError> {
    Ok(Json(promo::list_all(&state).await?))
}

pub async fn create_promo_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Json(input): Json<PromoEventInput>,
) -> Result<(StatusCode, Json<PromoEvent>), AppError> {
    let event = promo::create(&state, &admin.user.id, input).await?;

    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_promo_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(input): Json<PromoEventInput>,
) -> Result<Json<PromoEvent>, AppError> {
    Ok(Json(promo::update(&state, &admin.user.id, id, input).await?))
}

pub async fn delete_promo_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    promo::delete(&state, &admin.user.id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn content_list_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<ContentBlock>>, AppError> {
    Ok(Json(cms::list(&state).await?))
}

pub async fn upsert_content_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(key): Path<String>,
    Json(input): Json<ContentInput>,
) -> Result<Json<ContentBlock>, AppError> {
    Ok(Json(cms::upsert(&state, &admin.user.id, &key, input).await?))
}

pub async fn delete_content_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    cms::delete(&state, &admin.user.id, &key).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub offset: usize,
}

pub async fn orders_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(
        orders::list_admin(&state, filter.status, filter.offset).await?,
    ))
}

pub async fn order_status_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(
        orders::update_status(&state, &admin.user.id, id, update.status).await?,
    ))
}

#[derive(Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    #[serde(default)]
    pub offset: usize,
}

pub async fn users_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<Profile>>, AppError> {
    Ok(Json(
        users::list_profiles(&state, filter.role, filter.offset).await?,
    ))
}

#[derive(Deserialize)]
pub struct Page {
    #[serde(default)]
    pub page: usize,
}

pub async fn auth_users_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<AdminUserRecord>>, AppError> {
    Ok(Json(users::list_auth_users(&state, page.page).await?))
}

pub async fn user_role_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(
        users::set_role(&state, &admin.user.id, &id, update.role).await?,
    ))
}

pub async fn force_logout_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<ForceLogout>, AppError> {
    Ok(Json(users::force_logout(&state, &admin.user.id, &id).await?))
}

pub async fn theme_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Json(input): Json<Theme>,
) -> Result<Json<Theme>, AppError> {
    Ok(Json(theme::update(&state, &admin.user.id, input).await?))
}

pub async fn site_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<LockStatus>, AppError> {
    Ok(Json(site_lock::current_status(&state).await?))
}

pub async fn site_settings_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Json(update): Json<SiteSettingsUpdate>,
) -> Result<Json<LockStatus>, AppError> {
    Ok(Json(
        site_lock::update_settings(&state, &admin.user.id, update).await?,
    ))
}

pub async fn site_override_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
) -> Result<Json<LockStatus>, AppError> {
    Ok(Json(
        site_lock::set_month_override(&state, &admin.user.id, true).await?,
    ))
}

pub async fn clear_site_override_handler(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
) -> Result<Json<LockStatus>, AppError> {
    Ok(Json(
        site_lock::set_month_override(&state, &admin.user.id, false).await?,
    ))
}

#[derive(Deserialize)]
pub struct ActivityFilter {
    pub limit: Option<usize>,
    pub action: Option<String>,
}

pub async fn activity_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(filter): Query<ActivityFilter>,
) -> Result<Json<Vec<ActivityEntry>>, AppError> {
    Ok(Json(
        activity::recent(&state, filter.limit, filter.action.as_deref()).await?,
    ))
}
