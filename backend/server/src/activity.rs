//! # Activity log
//!
//! Audit trail of admin mutations. Writing an entry never fails the action
//! it describes: the action already happened by the time we log it.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::{error::AppError, state::AppState, supabase::Query};

pub const ACTIVITY_TABLE: &str = "activity_logs";
pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub actor_id: String,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    #[serde(default)]
    pub details: Value,
    pub created_at: Option<DateTime<Utc>>,
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub async fn record(
    state: &AppState,
    actor_id: &str,
    action: &str,
    entity: &str,
    entity_id: &str,
    details: Value,
) {
    let entry = json!({
        "actor_id": actor_id,
        "action": action,
        "entity": entity,
        "entity_id": entity_id,
        "details": details,
    });

    if let Err(e) = state
        .supabase
        .insert::<_, Value>(ACTIVITY_TABLE, &entry)
        .await
    {
        warn!("Failed to record {action} by {actor_id}: {e}");
    }
}

pub async fn recent(
    state: &AppState,
    limit: Option<usize>,
    action: Option<&str>,
) -> Result<Vec<ActivityEntry>, AppError> {
    let mut query = Query::new().select("*");
    if let Some(action) = action {
        query = query.eq("action", action);
    }

    state
        .supabase
        .select(
            ACTIVITY_TABLE,
            &query.order("created_at", false).limit(clamp_limit(limit)),
        )
        .await
}
