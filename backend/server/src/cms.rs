//! # CMS
//!
//! Editable storefront copy (hero banner, about page, FAQ and so on), stored
//! as keyed text blocks. Rendering is the frontend's business.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    activity,
    error::AppError,
    state::AppState,
    supabase::Query,
    utils::{bounded_text, slugify},
};

pub const CONTENT_TABLE: &str = "cms_content";
const MAX_BODY_CHARS: usize = 20_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    pub key: String,
    pub title: Option<String>,
    pub body: String,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentInput {
    pub title: Option<String>,
    pub body: String,
}

/// Keys are slugs, so `About Us` and `about-us` address the same block.
pub fn normalize_key(raw: &str) -> Result<String, AppError> {
    let key = slugify(raw);

    if key.is_empty() || key.len() > 64 {
        return Err(AppError::invalid("Content key must be 1 to 64 slug characters"));
    }

    Ok(key)
}

impl ContentInput {
    pub fn validate(self, key: String) -> Result<ContentBlock, AppError> {
        let title = match self.title {
            Some(title) => Some(
                bounded_text(&title, 1, 200)
                    .ok_or_else(|| AppError::invalid("Title must be 1 to 200 characters"))?,
            ),
            None => None,
        };

        if self.body.chars().count() > MAX_BODY_CHARS {
            return Err(AppError::invalid("Content body is too long"));
        }

        Ok(ContentBlock {
            key,
            title,
            body: self.body,
            updated_at: Some(Utc::now()),
        })
    }
}

pub async fn get(state: &AppState, key: &str) -> Result<ContentBlock, AppError> {
    let key = normalize_key(key)?;

    state
        .supabase
        .select_one(CONTENT_TABLE, Query::new().select("*").eq("key", &key))
        .await?
        .ok_or(AppError::NotFound("Content"))
}

pub async fn list(state: &AppState) -> Result<Vec<ContentBlock>, AppError> {
    state
        .supabase
        .select(CONTENT_TABLE, &Query::new().select("*").order("key", true))
        .await
}

pub async fn upsert(
    state: &AppState,
    actor_id: &str,
    key: &str,
    input: ContentInput,
) -> Result<ContentBlock, AppError> {
    let block = input.validate(normalize_key(key)?)?;
    let block: ContentBlock = state.supabase.upsert(CONTENT_TABLE, "key", &block).await?;

    activity::record(
        state,
        actor_id,
        "content.upsert",
        "cms_content",
        &block.key,
        json!({ "title": block.title }),
    )
    .await;

    Ok(block)
}

pub async fn delete(state: &AppState, actor_id: &str, key: &str) -> Result<(), AppError> {
    let key = normalize_key(key)?;
    let removed = state
        .supabase
        .delete(CONTENT_TABLE, &Query::new().eq("key", &key))
        .await?;

    if removed == 0 {
        return Err(AppError::NotFound("Content"));
    }

    activity::record(state, actor_id, "content.delete", "cms_content", &key, json!({})).await;
    Ok(())
}
