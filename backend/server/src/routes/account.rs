use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    accounts::{self, OnboardingRequest, Profile, ProfileUpdate},
    auth::AuthUser,
    cart::{self, AddItem, CartView, SetQuantity},
    checkout::{self, CheckoutRequest, CheckoutResponse},
    error::AppError,
    orders::{self, Order},
    state::AppState,
};

pub async fn account_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(accounts::get_or_create_profile(&state, &user).await?))
}

pub async fn onboarding_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<OnboardingRequest>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(accounts::onboard(&state, &user, request).await?))
}

pub async fn update_account_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(accounts::update_profile(&state, &user, update).await?))
}

pub async fn orders_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(orders::list_for_user(&state, &user.id).await?))
}

pub async fn cart_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(cart::view_cart(&state, &user.id).await?))
}

pub async fn add_cart_item_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(item): Json<AddItem>,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(cart::add_item(&state, &user.id, item).await?))
}

pub async fn set_cart_item_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(product_id): Path<i64>,
    Json(update): Json<SetQuantity>,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(
        cart::set_quantity(&state, &user.id, product_id, update.quantity).await?,
    ))
}

pub async fn remove_cart_item_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(product_id): Path<i64>,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(cart::remove_item(&state, &user.id, product_id).await?))
}

pub async fn clear_cart_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<StatusCode, AppError> {
    cart::clear(&state, &user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn checkout_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let response = checkout::checkout(&state, &user, request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}
