//! HTTP surface.
//!
//! - `open`: always reachable, even while the site is locked
//! - `storefront`: everything customers use, behind the site lock
//! - `/admin`: back-office, never locked, every handler takes [`AdminUser`]
//!
//! [`site_lock_guard`] wraps the whole router and sorts requests by path with
//! [`route_scope`], so a new open route also needs a match there.
//!
//! [`AdminUser`]: crate::auth::AdminUser
//! [`route_scope`]: crate::site_lock::route_scope
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, patch, post, put},
};

pub mod account;
pub mod admin;
pub mod storefront;

use crate::{site_lock::site_lock_guard, state::AppState};

pub fn router(state: Arc<AppState>) -> Router {
    let open = Router::new()
        .route("/health", get(storefront::health_handler))
        .route("/site/status", get(storefront::site_status_handler))
        .route("/theme", get(storefront::theme_handler))
        .route("/content/{key}", get(storefront::content_handler));

    let storefront = Router::new()
        .route("/categories", get(storefront::categories_handler))
        .route("/products", get(storefront::products_handler))
        .route("/products/{slug}", get(storefront::product_handler))
        .route(
            "/products/{slug}/reviews",
            get(storefront::reviews_handler).post(storefront::submit_review_handler),
        )
        .route("/search", get(storefront::search_handler))
        .route("/promos", get(storefront::promos_handler))
        .route("/orders", get(account::orders_handler))
        .route("/orders/track/{code}", get(storefront::track_handler))
        .route(
            "/account",
            get(account::account_handler).patch(account::update_account_handler),
        )
        .route("/account/onboarding", post(account::onboarding_handler))
        .route(
            "/cart",
            get(account::cart_handler).delete(account::clear_cart_handler),
        )
        .route("/cart/items", post(account::add_cart_item_handler))
        .route(
            "/cart/items/{product_id}",
            put(account::set_cart_item_handler).delete(account::remove_cart_item_handler),
        )
        .route("/checkout", post(account::checkout_handler));

    let admin = Router::new()
        .route(
            "/products",
            get(admin::products_handler).post(admin::create_product_handler),
        )
        .route(
            "/products/{id}",
            put(admin::update_product_handler).delete(admin::delete_product_handler),
        )
        .route("/categories", post(admin::create_category_handler))
        .route(
            "/categories/{id}",
            put(admin::update_category_handler).delete(admin::delete_category_handler),
        )
        .route(
            "/promos",
            get(admin::promos_handler).post(admin::create_promo_handler),
        )
        .route(
            "/promos/{id}",
            put(admin::update_promo_handler).delete(admin::delete_promo_handler),
        )
        .route("/content", get(admin::content_list_handler))
        .route(
            "/content/{key}",
            put(admin::upsert_content_handler).delete(admin::delete_content_handler),
        )
        .route("/orders", get(admin::orders_handler))
        .route("/orders/{id}/status", patch(admin::order_status_handler))
        .route("/users", get(admin::users_handler))
        .route("/users/auth", get(admin::auth_users_handler))
        .route("/users/{id}/role", patch(admin::user_role_handler))
        .route("/users/{id}/force-logout", post(admin::force_logout_handler))
        .route("/theme", put(admin::theme_handler))
        .route(
            "/site",
            get(admin::site_handler).patch(admin::site_settings_handler),
        )
        .route(
            "/site/override",
            post(admin::site_override_handler).delete(admin::clear_site_override_handler),
        )
        .route("/activity", get(admin::activity_handler));

    Router::new()
        .merge(open)
        .merge(storefront)
        .nest("/admin", admin)
        .layer(middleware::from_fn_with_state(state.clone(), site_lock_guard))
        .with_state(state)
}
