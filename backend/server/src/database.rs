//! # Redis
//!
//! RAM database.
//!
//! Holds carts and the short-lived operational state of the shop. The managed
//! Postgres backend stays the source of truth for everything else.
//!
//! ## Keys
//!
//! - `cart:{user_id}`: hash of product id to quantity. `HINCRBY` keeps adds
//!   atomic when the same user has two tabs open. Expires after 30 days idle.
//! - `revoked:{user_id}`: RFC 3339 time of the last force logout. Lives as
//!   long as an access token, so stale tokens die with it.
//! - `site:settings`: JSON copy of the site settings row, short TTL.
//! - `orders:seq:{YYMMDD}`: per WIB day order counter, expires after 2 days.
use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client, RedisError, ToRedisArgs,
    aio::{ConnectionManager, ConnectionManagerConfig},
};

pub const CART_PREFIX: &str = "cart:";
pub const REVOCATION_PREFIX: &str = "revoked:";
pub const SETTINGS_KEY: &str = "site:settings";
pub const ORDER_SEQ_PREFIX: &str = "orders:seq:";

pub const CART_TTL_SECS: i64 = 60 * 60 * 24 * 30;
const ORDER_SEQ_TTL_SECS: i64 = 60 * 60 * 48;

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    client.get_connection_manager_with_config(config).await
}

fn cart_key(user_id: &str) -> String {
    format!("{CART_PREFIX}{user_id}")
}

pub async fn cart_items(
    connection: &mut ConnectionManager,
    user_id: &str,
) -> Result<HashMap<String, i64>, RedisError> {
    connection.hgetall(cart_key(user_id)).await
}

/// Adds to a line and returns the new quantity, capped at `max`.
pub async fn cart_increment(
    connection: &mut ConnectionManager,
    user_id: &str,
    product_id: i64,
    quantity: i64,
    max: i64,
) -> Result<i64, RedisError> {
    let key = cart_key(user_id);

    let mut updated: i64 = connection.hincr(&key, product_id, quantity).await?;
    if updated > max {
        let () = connection.hset(&key, product_id, max).await?;
        updated = max;
    }

    let () = connection.expire(&key, CART_TTL_SECS).await?;
    Ok(updated)
}

pub async fn cart_set(
    connection: &mut ConnectionManager,
    user_id: &str,
    product_id: i64,
    quantity: i64,
) -> Result<(), RedisError> {
    let key = cart_key(user_id);

    let () = connection.hset(&key, product_id, quantity).await?;
    connection.expire(&key, CART_TTL_SECS).await
}

pub async fn cart_remove<F: ToRedisArgs + Send + Sync>(
    connection: &mut ConnectionManager,
    user_id: &str,
    fields: &[F],
) -> Result<(), RedisError> {
    if fields.is_empty() {
        return Ok(());
    }

    connection.hdel(cart_key(user_id), fields).await
}

pub async fn cart_clear(connection: &mut ConnectionManager, user_id: &str) -> Result<(), RedisError> {
    connection.del(cart_key(user_id)).await
}

pub async fn mark_revoked(
    connection: &mut ConnectionManager,
    user_id: &str,
    at: DateTime<Utc>,
    ttl_secs: u64,
) -> Result<(), RedisError> {
    let key = format!("{REVOCATION_PREFIX}{user_id}");
    connection.set_ex(key, at.to_rfc3339(), ttl_secs).await
}

pub async fn revoked_at(
    connection: &mut ConnectionManager,
    user_id: &str,
) -> Result<Option<DateTime<Utc>>, RedisError> {
    let key = format!("{REVOCATION_PREFIX}{user_id}");
    let value: Option<String> = connection.get(key).await?;

    Ok(value
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|at| at.with_timezone(&Utc)))
}

pub async fn cached_settings(connection: &mut ConnectionManager) -> Result<Option<String>, RedisError> {
    connection.get(SETTINGS_KEY).await
}

pub async fn cache_settings(
    connection: &mut ConnectionManager,
    json: &str,
    ttl_secs: u64,
) -> Result<(), RedisError> {
    connection.set_ex(SETTINGS_KEY, json, ttl_secs).await
}

pub async fn invalidate_settings(connection: &mut ConnectionManager) -> Result<(), RedisError> {
    connection.del(SETTINGS_KEY).await
}

pub async fn next_order_sequence(
    connection: &mut ConnectionManager,
    day_code: &str,
) -> Result<i64, RedisError> {
    let key = format!("{ORDER_SEQ_PREFIX}{day_code}");

    let sequence: i64 = connection.incr(&key, 1).await?;
    if sequence == 1 {
        let () = connection.expire(&key, ORDER_SEQ_TTL_SECS).await?;
    }

    Ok(sequence)
}
