use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::auth::TokenIssuer;
use crate::clock::LocalClock;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::media::{self, MediaStore};
use crate::push::{self, PushSender};

/// Everything a handler or the sweep needs, built once in `main`.
#[derive(Clone)]
pub struct AppContext {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub tokens: TokenIssuer,
    pub clock: LocalClock,
    pub push: Arc<dyn PushSender>,
    pub media: Arc<dyn MediaStore>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        pool: DbPool,
        push: Arc<dyn PushSender>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        let tokens = TokenIssuer::new(
            &config.jwt_secret,
            chrono::Duration::days(config.jwt_ttl_days),
        );
        let clock = LocalClock::from_offset_minutes(config.utc_offset_minutes);
        Self {
            pool,
            config: Arc::new(config),
            tokens,
            clock,
            push,
            media,
        }
    }

    /// Wires the real external collaborators from config.
    pub fn from_config(config: AppConfig, pool: DbPool) -> Result<Self> {
        let timeout = Duration::from_secs(config.external_timeout_secs);
        let push = push::sender_from_config(config.fcm_service_account_path.as_deref(), timeout)?;
        let media =
            media::store_from_config(config.cloudinary.as_ref(), &config.media_folder, timeout)?;
        Ok(Self::new(config, pool, push, media))
    }
}
