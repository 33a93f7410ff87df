//! # Users
//!
//! Admin side of accounts: listing profiles, changing roles and kicking
//! users out.
//!
//! ## Force logout
//! 1. Ask the auth service to revoke every session of the user.
//! 2. If that call fails, ban the user for a short while instead. A ban also
//!    revokes refresh tokens, and it lifts itself.
//! 3. Either way, remember the revocation time in Redis for as long as an
//!    access token lives, because access tokens issued before the revocation
//!    keep validating against the auth service until they expire.
use std::future::Future;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    accounts::{PROFILES_TABLE, Profile, Role},
    activity,
    database::mark_revoked,
    error::AppError,
    state::AppState,
    supabase::{AdminUserRecord, Query, Supabase},
};

const MAX_USER_LIST: usize = 200;
const AUTH_USERS_PER_PAGE: usize = 50;

pub trait SessionRevoker {
    fn sign_out(&self, user_id: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    fn ban(&self, user_id: &str, duration: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

impl SessionRevoker for Supabase {
    async fn sign_out(&self, user_id: &str) -> Result<(), AppError> {
        self.admin_sign_out(user_id).await
    }

    async fn ban(&self, user_id: &str, duration: &str) -> Result<(), AppError> {
        self.admin_ban(user_id, duration).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoutOutcome {
    Revoked,
    Banned,
}

pub async fn revoke_sessions<R: SessionRevoker>(
    revoker: &R,
    user_id: &str,
    ban_duration: &str,
) -> Result<LogoutOutcome, AppError> {
    let primary = match revoker.sign_out(user_id).await {
        Ok(()) => return Ok(LogoutOutcome::Revoked),
        Err(e) => e,
    };

    warn!("Session revocation for {user_id} failed, falling back to a {ban_duration} ban: {primary}");

    revoker.ban(user_id, ban_duration).await.map_err(|fallback| {
        warn!("Temporary ban for {user_id} failed too: {fallback}");
        fallback
    })?;

    Ok(LogoutOutcome::Banned)
}

#[derive(Debug, Clone, Serialize)]
pub struct ForceLogout {
    pub user_id: String,
    pub outcome: LogoutOutcome,
}

/// The sessions are already gone at this point, only live access tokens survive.
fn marker_failed(outcome: LogoutOutcome, error: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!(
        "Sessions {} but open access tokens stay valid until they expire: {error}",
        match outcome {
            LogoutOutcome::Revoked => "revoked",
            LogoutOutcome::Banned => "banned",
        }
    ))
}

pub async fn force_logout(state: &AppState, actor_id: &str, user_id: &str) -> Result<ForceLogout, AppError> {
    let outcome = revoke_sessions(&state.supabase, user_id, &state.config.force_logout_ban).await?;

    let mut connection = state.redis_connection.clone();
    let marked = mark_revoked(
        &mut connection,
        user_id,
        Utc::now(),
        state.config.access_token_ttl_secs,
    )
    .await;

    info!("{actor_id} force-logged-out {user_id}: {outcome:?}");
    activity::record(
        state,
        actor_id,
        "user.force_logout",
        "user",
        user_id,
        json!({ "outcome": outcome, "token_marker": marked.is_ok() }),
    )
    .await;

    if let Err(e) = marked {
        return Err(marker_failed(outcome, e));
    }

    Ok(ForceLogout {
        user_id: user_id.to_string(),
        outcome,
    })
}

pub async fn list_profiles(state: &AppState, role: Option<Role>, offset: usize) -> Result<Vec<Profile>, AppError> {
    let mut query = Query::new().select("*");
    if let Some(role) = role {
        query = query.eq("role", role_name(role));
    }

    state
        .supabase
        .select(
            PROFILES_TABLE,
            &query
                .order("created_at", false)
                .limit(MAX_USER_LIST)
                .offset(offset),
        )
        .await
}

/// Auth-side view of users, which shows who is currently banned.
pub async fn list_auth_users(state: &AppState, page: usize) -> Result<Vec<AdminUserRecord>, AppError> {
    state
        .supabase
        .admin_list_users(page.max(1), AUTH_USERS_PER_PAGE)
        .await
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::Customer => "customer",
        Role::Admin => "admin",
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

pub fn check_role_change(actor_id: &str, target_id: &str, role: Role) -> Result<(), AppError> {
    if actor_id == target_id && role != Role::Admin {
        return Err(AppError::Conflict("Admins cannot demote themselves".into()));
    }

    Ok(())
}

pub async fn set_role(state: &AppState, actor_id: &str, user_id: &str, role: Role) -> Result<Profile, AppError> {
    check_role_change(actor_id, user_id, role)?;

    let mut rows: Vec<Profile> = state
        .supabase
        .update(PROFILES_TABLE, &Query::new().eq("id", user_id), &json!({ "role": role }))
        .await?;

    let profile = rows.pop().ok_or(AppError::NotFound("User"))?;

    activity::record(
        state,
        actor_id,
        "user.role",
        "user",
        user_id,
        json!({ "role": role }),
    )
    .await;

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeAuth {
        sign_out_fails: bool,
        ban_fails: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeAuth {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn upstream() -> AppError {
        AppError::Upstream {
            status: 500,
            body: "boom".into(),
        }
    }

    impl SessionRevoker for FakeAuth {
        async fn sign_out(&self, user_id: &str) -> Result<(), AppError> {
            self.calls.lock().unwrap().push(format!("sign_out:{user_id}"));
            if self.sign_out_fails { Err(upstream()) } else { Ok(()) }
        }

        async fn ban(&self, user_id: &str, duration: &str) -> Result<(), AppError> {
            self.calls.lock().unwrap().push(format!("ban:{user_id}:{duration}"));
            if self.ban_fails { Err(upstream()) } else { Ok(()) }
        }
    }

    #[tokio::test]
    async fn test_primary_revocation() {
        let auth = FakeAuth::default();

        let outcome = revoke_sessions(&auth, "u1", "1m").await.unwrap();
        assert_eq!(outcome, LogoutOutcome::Revoked);
        assert_eq!(auth.calls(), vec!["sign_out:u1"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_ban() {
        let auth = FakeAuth {
            sign_out_fails: true,
            ..Default::default()
        };

        let outcome = revoke_sessions(&auth, "u1", "1m").await.unwrap();
        assert_eq!(outcome, LogoutOutcome::Banned);
        assert_eq!(auth.calls(), vec!["sign_out:u1", "ban:u1:1m"]);
    }

    #[tokio::test]
    async fn test_both_fail() {
        let auth = FakeAuth {
            sign_out_fails: true,
            ban_fails: true,
            ..Default::default()
        };

        let result = revoke_sessions(&auth, "u1", "1m").await;
        assert!(matches!(result, Err(AppError::Upstream { .. })));
    }

    #[test]
    fn test_self_demotion_blocked() {
        assert!(check_role_change("a1", "a1", Role::Customer).is_err());
        assert!(check_role_change("a1", "a1", Role::Admin).is_ok());
        assert!(check_role_change("a1", "u2", Role::Customer).is_ok());
    }

    #[test]
    fn test_marker_failure_reports_revocation() {
        let error = marker_failed(LogoutOutcome::Banned, "connection refused");

        assert_eq!(error.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let message = error.to_string();
        assert!(message.contains("Sessions banned"));
        assert!(message.contains("connection refused"));
    }
}
