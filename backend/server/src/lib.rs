//! Documentation of a donut storefront and its admin back-office.
//!
//! [Publishing](https://www.reddit.com/r/rust/comments/195ao81/publishing_documentation_as_github_page/) docs to GitHub Pages.
//!
//!
//!
//! # General Infrastructure
//! - Frontend talks to this service only, never to Supabase directly with the service key
//! - Supabase owns the data (PostgREST) and identity (GoTrue)
//! - Redis holds carts, revocation markers, the settings cache and the daily order counter
//! - Meilisearch holds a denormalized copy of the product catalog for search
//! - Checkout ends in a WhatsApp deep link, payment happens in the chat
//!
//!
//!
//! # Site Lock
//!
//! **Goal**: Close the storefront at the end of every month while the shop restocks, without anyone
//! having to remember to flip a switch.
//!
//! - A manual lock always wins
//! - Otherwise the site auto-locks from `lock_day` (WIB) until the end of the month
//! - An admin can lift the auto-lock for the current month only, the override expires on its own
//! - Health, theme, content and the lock status itself stay reachable while locked
//! - `/admin` is never locked
//!
//! All calendar math is done in WIB (UTC+7) regardless of the host timezone.
//!
//!
//!
//! # Sessions
//!
//! Access tokens are validated against GoTrue on every authenticated request. Force logout revokes
//! refresh tokens. When the admin logout endpoint is unavailable the user is briefly banned instead,
//! and a Redis marker rejects any access token issued before the logout until it would have expired
//! anyway.
//!
//!
//!
//! # Notes
//!
//! ## Redis + Meilisearch
//! Meilisearch is a search engine, not a database. Product writes go to Supabase first and the
//! index is updated afterwards, a failed index update is logged and repaired by `process reindex`.
//!
//! Carts are Redis hashes of `product_id -> quantity` with a rolling TTL. Prices are never stored
//! in the cart, they are resolved at view and checkout time so promos apply immediately.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! `````
//!
//! Rebuild the search index.
//! ```sh
//! cargo run -p process -- reindex --batch 500
//! `````
//!
//! Print the current lock state.
//! ```sh
//! cargo run -p process -- lock-status
//! `````
use std::time::Duration;

use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod accounts;
pub mod activity;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod cms;
pub mod config;
pub mod database;
pub mod error;
pub mod orders;
pub mod promo;
pub mod reviews;
pub mod routes;
pub mod search;
pub mod site_lock;
pub mod state;
pub mod supabase;
pub mod theme;
pub mod users;
pub mod utils;
pub mod wib;

use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await.expect("Failed to initialize state");

    info!("Starting server...");

    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    match state.config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => warn!("Invalid CORS_ORIGIN, cross-origin requests will be rejected"),
    }

    let app = routes::router(state.clone())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .expect("Failed to bind listener");
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    info!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
