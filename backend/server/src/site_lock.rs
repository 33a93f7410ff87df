//! # Site Lock
//!
//! Maintenance mode for the storefront.
//!
//! ## Rules
//! - A manual lock always wins.
//! - With auto lock on, the shop closes from midnight WIB on `lock_day`
//!   until the end of the month. Stock-taking happens then.
//! - Admins may reopen a scheduled lock for the current month by setting
//!   `unlock_override_month` to that month (`YYYY-MM`). The override dies on
//!   its own when the month rolls over.
//! - `/admin`, `/health` and `/site/status` stay reachable, and admins pass
//!   the storefront lock so they can check the shop before reopening it.
//!
//! ## Storage
//! One row (`id = 1`) in `site_settings`, mirrored in Redis for a few seconds
//! because every storefront request consults it.
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    activity, auth,
    database::{cache_settings, cached_settings, invalidate_settings},
    error::AppError,
    state::AppState,
    supabase::{Query, Supabase},
    wib::{Countdown, countdown, month_key, to_wib, wib_midnight},
};

pub const SETTINGS_TABLE: &str = "site_settings";
pub const SETTINGS_ROW_ID: i64 = 1;
pub const DEFAULT_LOCK_DAY: u32 = 25;
const MAX_LOCK_DAY: u32 = 28;
const DEFAULT_MESSAGE: &str = "We are restocking our donuts. Please come back soon!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub manual_lock: bool,
    pub auto_lock_enabled: bool,
    pub lock_day: u32,
    pub unlock_override_month: Option<String>,
    pub maintenance_message: Option<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            manual_lock: false,
            auto_lock_enabled: true,
            lock_day: DEFAULT_LOCK_DAY,
            unlock_override_month: None,
            maintenance_message: None,
        }
    }
}

/// The `site_settings` row as stored. Any column may be `NULL`.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsRow {
    pub manual_lock: Option<bool>,
    pub auto_lock_enabled: Option<bool>,
    pub lock_day: Option<u32>,
    pub unlock_override_month: Option<String>,
    pub maintenance_message: Option<String>,
}

impl SettingsRow {
    pub fn into_settings(self, default_lock_day: u32) -> SiteSettings {
        let defaults = SiteSettings::default();

        SiteSettings {
            manual_lock: self.manual_lock.unwrap_or(defaults.manual_lock),
            auto_lock_enabled: self.auto_lock_enabled.unwrap_or(defaults.auto_lock_enabled),
            lock_day: self.lock_day.unwrap_or(default_lock_day),
            unlock_override_month: self.unlock_override_month,
            maintenance_message: self.maintenance_message,
        }
    }
}

impl SiteSettings {
    fn lock_day(&self) -> u32 {
        self.lock_day.clamp(1, MAX_LOCK_DAY)
    }

    fn overridden(&self, month: &str) -> bool {
        self.unlock_override_month.as_deref() == Some(month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockReason {
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockStatus {
    pub locked: bool,
    pub reason: Option<LockReason>,
    pub message: String,
    pub now_wib: DateTime<FixedOffset>,
    pub next_lock_at: Option<DateTime<FixedOffset>>,
    pub countdown: Option<Countdown>,
}

pub fn evaluate(settings: &SiteSettings, now: DateTime<Utc>) -> LockStatus {
    let local = to_wib(now);

    let reason = if settings.manual_lock {
        Some(LockReason::Manual)
    } else if settings.auto_lock_enabled
        && local.day() >= settings.lock_day()
        && !settings.overridden(&month_key(now))
    {
        Some(LockReason::Scheduled)
    } else {
        None
    };

    let next_lock = next_scheduled_lock(settings, now);

    LockStatus {
        locked: reason.is_some(),
        reason,
        message: settings
            .maintenance_message
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
        now_wib: local,
        next_lock_at: next_lock.map(to_wib),
        countdown: next_lock.map(|at| countdown(now, at)),
    }
}

/// The next scheduled lock strictly after `now` that no override cancels.
pub fn next_scheduled_lock(settings: &SiteSettings, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !settings.auto_lock_enabled {
        return None;
    }

    let local = to_wib(now).date_naive();
    let first_of_month = NaiveDate::from_ymd_opt(local.year(), local.month(), 1)?;

    // Three months always suffice: at most one of them can be overridden.
    (0..3).find_map(|offset| {
        let month = first_of_month.checked_add_months(Months::new(offset))?;
        let lock_date = month.with_day(settings.lock_day())?;
        let lock_at = wib_midnight(lock_date);

        (lock_at > now && !settings.overridden(&month_key(lock_at))).then_some(lock_at)
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteSettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_lock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_lock_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_message: Option<String>,
}

impl SiteSettingsUpdate {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(day) = self.lock_day
            && !(1..=MAX_LOCK_DAY).contains(&day)
        {
            return Err(AppError::invalid("Lock day must be between 1 and 28"));
        }

        if let Some(message) = &self.maintenance_message
            && message.chars().count() > 500
        {
            return Err(AppError::invalid("Maintenance message is too long"));
        }

        Ok(())
    }
}

pub async fn load_settings(state: &AppState) -> Result<SiteSettings, AppError> {
    let mut connection = state.redis_connection.clone();

    match cached_settings(&mut connection).await {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(settings) => return Ok(settings),
            Err(e) => warn!("Discarding unreadable cached settings: {e}"),
        },
        Ok(None) => {}
        Err(e) => warn!("Settings cache unavailable: {e}"),
    }

    let settings = fetch_settings(&state.supabase, state.config.site_lock_day).await?;

    let json = serde_json::to_string(&settings)?;
    if let Err(e) = cache_settings(&mut connection, &json, state.config.settings_cache_secs).await {
        warn!("Failed to cache settings: {e}");
    }

    Ok(settings)
}

/// Reads the settings row directly, bypassing the cache. A missing row or
/// `NULL` column falls back to the defaults, with `default_lock_day` from
/// `SITE_LOCK_DAY`.
pub async fn fetch_settings(supabase: &Supabase, default_lock_day: u32) -> Result<SiteSettings, AppError> {
    let row: Option<SettingsRow> = supabase
        .select_one(SETTINGS_TABLE, Query::new().select("*").eq("id", SETTINGS_ROW_ID))
        .await?;

    Ok(row.unwrap_or_default().into_settings(default_lock_day))
}

async fn store_settings(state: &AppState, patch: serde_json::Value) -> Result<SiteSettings, AppError> {
    let mut row = patch;
    row["id"] = json!(SETTINGS_ROW_ID);

    let settings: SiteSettings = state.supabase.upsert(SETTINGS_TABLE, "id", &row).await?;

    let mut connection = state.redis_connection.clone();
    if let Err(e) = invalidate_settings(&mut connection).await {
        warn!("Failed to invalidate cached settings: {e}");
    }

    Ok(settings)
}

pub async fn current_status(state: &AppState) -> Result<LockStatus, AppError> {
    let settings = load_settings(state).await?;
    Ok(evaluate(&settings, Utc::now()))
}

pub async fn update_settings(
    state: &AppState,
    actor_id: &str,
    update: SiteSettingsUpdate,
) -> Result<LockStatus, AppError> {
    update.validate()?;

    let patch = serde_json::to_value(&update)?;
    let settings = store_settings(state, patch.clone()).await?;

    info!("Site settings changed by {actor_id}: {patch}");
    activity::record(state, actor_id, "site.settings", "site_settings", "1", patch).await;

    Ok(evaluate(&settings, Utc::now()))
}

/// Reopens a scheduled lock for the current WIB month, or clears the override.
pub async fn set_month_override(
    state: &AppState,
    actor_id: &str,
    enabled: bool,
) -> Result<LockStatus, AppError> {
    let month = enabled.then(|| month_key(Utc::now()));
    let patch = json!({ "unlock_override_month": month });

    let settings = store_settings(state, patch.clone()).await?;

    info!("Site lock override set by {actor_id}: {month:?}");
    activity::record(state, actor_id, "site.override", "site_settings", "1", patch).await;

    Ok(evaluate(&settings, Utc::now()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteScope {
    /// Reachable while locked.
    Open,
    Storefront,
    Admin,
}

pub fn route_scope(path: &str) -> RouteScope {
    if path == "/admin" || path.starts_with("/admin/") {
        RouteScope::Admin
    } else if matches!(path, "/health" | "/site/status" | "/theme") || path.starts_with("/content/") {
        RouteScope::Open
    } else {
        RouteScope::Storefront
    }
}

pub fn admits(scope: RouteScope, locked: bool, is_admin: bool) -> bool {
    match scope {
        RouteScope::Open | RouteScope::Admin => true,
        RouteScope::Storefront => !locked || is_admin,
    }
}

/// Wraps the whole router. Storefront requests get a 503 while locked unless
/// they carry an admin token.
pub async fn site_lock_guard(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let scope = route_scope(request.uri().path());
    if scope != RouteScope::Storefront {
        return next.run(request).await;
    }

    let status = match current_status(&state).await {
        Ok(status) => status,
        Err(e) => {
            warn!("Site lock check failed, serving request: {e}");
            return next.run(request).await;
        }
    };

    let is_admin = status.locked && auth::is_admin_request(&state, request.headers()).await;

    if admits(scope, status.locked, is_admin) {
        return next.run(request).await;
    }

    AppError::SiteLocked(Box::new(status)).into_response()
}
