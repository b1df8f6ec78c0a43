use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::TokenService;
use crate::config::Config;
use crate::services::{DocumentValidator, FileStore, SignatureValidator};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub env: &'static Config,
    pub tokens: Arc<TokenService>,
    pub files: Arc<FileStore>,
    pub validator: Arc<dyn DocumentValidator>,
}

impl AppState {
    pub fn new(db: PgPool, env: &'static Config) -> Self {
        Self {
            db,
            env,
            tokens: Arc::new(TokenService::from_config(&env.auth)),
            files: Arc::new(FileStore::from_config(&env.uploads)),
            validator: Arc::new(SignatureValidator),
        }
    }
}
