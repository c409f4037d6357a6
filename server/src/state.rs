use std::sync::Arc;

use super::{
    config::Config,
    database::{RedisStore, init_redis},
    store::Store,
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let redis_connection = init_redis(&config.redis_url).await;
        let store: Arc<dyn Store> = Arc::new(RedisStore::new(redis_connection));

        Arc::new(Self { config, store })
    }

    /// Wire the parts explicitly; tests and tooling pass a `MemoryStore`.
    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        Arc::new(Self { config, store })
    }
}
