use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

use crate::accounts::normalize_phone;

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub meili_url: String,
    pub meili_key: String,
    pub supabase_url: String,
    pub supabase_key: String,
    pub cors_origin: String,
    pub whatsapp_number: String,
    pub site_lock_day: u32,
    pub review_points: i64,
    pub force_logout_ban: String,
    pub access_token_ttl_secs: u64,
    pub settings_cache_secs: u64,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "1111"),
            redis_url: try_load("REDIS_URL", "redis://redis:6379"),
            meili_url: try_load("MEILI_URL", "http://meilisearch:7700"),
            meili_key: read_secret("MEILI_ADMIN_KEY"),
            supabase_url: try_load("SUPABASE_URL", "http://localhost:54321"),
            supabase_key: read_secret("SUPABASE_SERVICE_KEY"),
            cors_origin: try_load("CORS_ORIGIN", "http://localhost:3000"),
            whatsapp_number: shop_number(try_load("WHATSAPP_NUMBER", "6281234567890")),
            site_lock_day: try_load("SITE_LOCK_DAY", "25"),
            review_points: try_load("REVIEW_POINTS", "10"),
            force_logout_ban: try_load("FORCE_LOGOUT_BAN", "1m"),
            access_token_ttl_secs: try_load("ACCESS_TOKEN_TTL_SECS", "3600"),
            settings_cache_secs: try_load("SETTINGS_CACHE_SECS", "30"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    parse_or_default(key, var(key).ok(), default).expect("Environment misconfigured!")
}

fn parse_or_default<T: FromStr>(key: &str, value: Option<String>, default: &str) -> Option<T>
where
    T::Err: Display,
{
    value
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .ok()
}

/// Checkout links go to this number, so a bad one stops startup.
fn shop_number(raw: String) -> String {
    parse_shop_number(&raw).expect("Environment misconfigured!")
}

fn parse_shop_number(raw: &str) -> Option<String> {
    normalize_phone(raw)
        .map_err(|e| {
            warn!("Invalid WHATSAPP_NUMBER value: {e}");
        })
        .ok()
}

fn read_secret(secret_name: &str) -> String {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .expect("Secrets misconfigured!")
}
