use std::sync::Arc;

use chrono::Duration;

use crate::{config::Config, db::Store};

/// Request-independent settings derived from [`Config`].
#[derive(Clone)]
pub struct Settings {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub secure_cookies: bool,
    pub low_stock_threshold: i32,
    pub expiry_window: Duration,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            token_ttl: config.token_ttl(),
            secure_cookies: config.secure_cookies,
            low_stock_threshold: config.low_stock_threshold,
            expiry_window: config.expiry_window(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, settings: Settings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
        }
    }
}
