use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::tokens::AuthKeys;
use crate::config::AppConfig;
use crate::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: deadpool_redis::Pool,
    pub config: Arc<AppConfig>,
    pub keys: Arc<AuthKeys>,
    pub mailer: Mailer,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let keys = Arc::new(AuthKeys::from_config(&config)?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        // Pool connects lazily; /status reports actual reachability.
        let redis = deadpool_redis::Config::from_url(&config.redis_url)
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))?;

        let mailer = Mailer::start(&config.mail);

        Ok(Self {
            db,
            redis,
            config,
            keys,
            mailer,
        })
    }

    pub fn from_parts(
        db: PgPool,
        redis: deadpool_redis::Pool,
        config: Arc<AppConfig>,
        keys: Arc<AuthKeys>,
        mailer: Mailer,
    ) -> Self {
        Self {
            db,
            redis,
            config,
            keys,
            mailer,
        }
    }
}
