use sqlx::{migrate::MigrateError, postgres::PgPoolOptions, Error, Executor, PgPool};
use thiserror::Error;

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Store, StoreError, StoreResult};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to parse database URL: {0}")]
    UrlParse(String),
    #[error("Database error: {0}")]
    Sqlx(#[from] Error),
    #[error("Failed to create database: {0}")]
    CreateDb(String),
    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] MigrateError),
}

/// Connects to `database_url`, creating the database first if it does not
/// exist yet, and brings the schema up to date.
pub async fn init_db(database_url: &str) -> Result<PgPool, DatabaseError> {
    let (base_url, db_name) = parse_database_url(database_url)?;

    let temp_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&base_url)
        .await
        .map_err(DatabaseError::Sqlx)?;

    ensure_database_exists(&temp_pool, &db_name).await?;
    temp_pool.close().await;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(DatabaseError::Sqlx)?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Database {} is ready", db_name);

    Ok(pool)
}

fn parse_database_url(database_url: &str) -> Result<(String, String), DatabaseError> {
    let (base_url, tail) = database_url
        .rsplit_once('/')
        .ok_or_else(|| DatabaseError::UrlParse("Invalid database URL format".to_string()))?;

    let db_name = tail.split('?').next().unwrap_or_default();
    if db_name.is_empty() || !base_url.contains("://") {
        return Err(DatabaseError::UrlParse(
            "Failed to extract database name".to_string(),
        ));
    }
    if !db_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(DatabaseError::UrlParse(format!(
            "Unsupported database name: {db_name}"
        )));
    }

    Ok((format!("{base_url}/postgres"), db_name.to_string()))
}

async fn ensure_database_exists(pool: &PgPool, db_name: &str) -> Result<(), DatabaseError> {
    let db_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(pool)
            .await
            .map_err(DatabaseError::Sqlx)?;

    if !db_exists {
        log::info!("Creating database {}", db_name);
        pool.execute(format!("CREATE DATABASE {}", db_name).as_str())
            .await
            .map_err(|e| DatabaseError::CreateDb(e.to_string()))?;
    }

    Ok(())
}
