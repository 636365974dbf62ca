use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::repo::{PgUserStore, UserStore};
use crate::config::{AppConfig, JwtConfig};
use crate::memory::MemoryStore;
use crate::requests::repo::{PgRequestStore, RequestStore};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub requests: Arc<dyn RequestStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn with_postgres(pool: PgPool, config: Arc<AppConfig>) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(pool.clone())),
            requests: Arc::new(PgRequestStore::new(pool)),
            config,
        }
    }

    /// State backed by the in-process store. Used by the test suite.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = Arc::new(AppConfig {
            database_url: String::new(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 300,
            },
        });
        Self {
            users: store.clone(),
            requests: store,
            config,
        }
    }
}
