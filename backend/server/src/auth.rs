//! # Auth
//!
//! Customers sign in against the managed auth service and send us its access
//! token as `Authorization: Bearer ...`. We hand the token back to the auth
//! service to resolve the user, then apply our own force-logout marker on
//! top, since a revoked session's access token stays cryptographically valid
//! until it expires.
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    accounts::{self, Profile, Role},
    database::revoked_at,
    error::AppError,
    state::AppState,
    utils::bearer_token,
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: AuthUser,
    pub profile: Profile,
}

/// A session is dead when it was force-logged-out and the user has not
/// signed in again since.
pub fn is_revoked(revoked: Option<DateTime<Utc>>, last_sign_in: Option<DateTime<Utc>>) -> bool {
    match (revoked, last_sign_in) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(revoked), Some(signed_in)) => signed_in <= revoked,
    }
}

pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    let record = state.supabase.get_user(token).await?;

    let mut connection = state.redis_connection.clone();
    let revoked = revoked_at(&mut connection, &record.id).await?;

    if is_revoked(revoked, record.last_sign_in_at) {
        info!("Rejected force-logged-out session of {}", record.id);
        return Err(AppError::Unauthorized);
    }

    Ok(AuthUser {
        id: record.id,
        email: record.email,
    })
}

pub async fn authenticate_admin(state: &AppState, headers: &HeaderMap) -> Result<AdminUser, AppError> {
    let user = authenticate(state, headers).await?;
    let profile = accounts::find_profile(state, &user.id)
        .await?
        .ok_or(AppError::Forbidden)?;

    if profile.role != Role::Admin {
        return Err(AppError::Forbidden);
    }

    Ok(AdminUser { user, profile })
}

/// Whether the request carries a valid admin session. Any failure counts as no.
pub async fn is_admin_request(state: &AppState, headers: &HeaderMap) -> bool {
    if bearer_token(headers).is_none() {
        return false;
    }

    match authenticate_admin(state, headers).await {
        Ok(_) => true,
        Err(AppError::Unauthorized | AppError::Forbidden) => false,
        Err(e) => {
            warn!("Admin check failed: {e}");
            false
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers).await
    }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        authenticate_admin(state, &parts.headers).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::is_revoked;

    #[test]
    fn test_no_marker_is_live() {
        assert!(!is_revoked(None, None));
        assert!(!is_revoked(None, Some(Utc::now())));
    }

    #[test]
    fn test_marker_kills_older_sign_in() {
        let revoked = Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap();
        let signed_in = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

        assert!(is_revoked(Some(revoked), Some(signed_in)));
        assert!(is_revoked(Some(revoked), Some(revoked)));
        assert!(is_revoked(Some(revoked), None));
    }

    #[test]
    fn test_fresh_sign_in_survives_marker() {
        let revoked = Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap();
        let signed_in = Utc.with_ymd_and_hms(2026, 10, 19, 10, 5, 0).unwrap();

        assert!(!is_revoked(Some(revoked), Some(signed_in)));
    }
}
