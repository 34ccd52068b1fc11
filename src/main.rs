use std::sync::Arc;

use dotenvy::dotenv;
use envconfig::Envconfig;

use pharmacy_api::{
    app,
    config::{Backend, Config, ConfigError},
    db::{init_db, MemoryStore, PgStore, Store},
    serve,
    services::alerts::schedule_inventory_alerts,
    state::{AppState, Settings},
    Error,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load environment variables from a .env file if present
    dotenv().ok();

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    log::info!("Starting the pharmacy API...");

    let config = Config::init_from_env()?;
    config.validate()?;

    let store: Arc<dyn Store> = match config.backend()? {
        Backend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(ConfigError::MissingDatabaseUrl)?;
            let pool = init_db(url).await?;
            Arc::new(PgStore::new(pool))
        }
        Backend::Memory => {
            log::warn!("Using the in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(store, Settings::from(&config));

    // Daily scan for low stock and expiring medicines
    schedule_inventory_alerts(
        state.store.clone(),
        state.settings.clone(),
        &config.alert_schedule,
    )
    .await?;

    let app = app(state, &config.cors_origin)?;
    serve(app, config.port).await
}
