use std::sync::Arc;

use meilisearch_sdk::client::Client;
use redis::aio::ConnectionManager;

use super::{
    config::Config, database::init_redis, error::AppError, search::init_meilisearch,
    supabase::Supabase,
};

pub struct AppState {
    pub config: Config,
    pub redis_connection: ConnectionManager,
    pub meili_client: Arc<Client>,
    pub supabase: Supabase,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>, AppError> {
        let config = Config::load();

        let redis_connection = init_redis(&config.redis_url).await?;
        let meili_client = init_meilisearch(&config.meili_url, &config.meili_key).await?;
        let supabase = Supabase::new(&config.supabase_url, &config.supabase_key)?;

        Ok(Arc::new(Self {
            config,
            redis_connection,
            meili_client,
            supabase,
        }))
    }
}
