//! Database initialization
//!
//! Creates the database on first run, applies the schema idempotently and
//! seeds the default alert settings.

use crate::models::AlertConfiguration;
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Settings keys for the persisted alert configuration
pub const SETTING_ALERT_ENABLED: &str = "alert_enabled";
pub const SETTING_ALERT_VOLUME: &str = "alert_volume_percent";
pub const SETTING_ALERT_PROFILE: &str = "alert_sound_profile";
pub const SETTING_ALERT_CUSTOM_SOUND: &str = "alert_custom_sound";
pub const SETTING_ALERT_KEEP_RINGING: &str = "alert_keep_ringing";

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the HTTP handlers read while the arrival path writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and seed defaults (idempotent)
///
/// Exposed separately so tests can run it against an in-memory pool.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_orders_table(pool).await?;
    init_default_settings(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the orders table
///
/// Populated by the order-sync transport; the alert service reads it and
/// flips the read/printed flags.
pub async fn create_orders_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY,
            number TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'processing',
            created_at TIMESTAMP NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            is_printed INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Initialize default alert settings
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    let defaults = AlertConfiguration::default();

    ensure_setting(pool, SETTING_ALERT_ENABLED, &defaults.enabled.to_string()).await?;
    ensure_setting(pool, SETTING_ALERT_VOLUME, &defaults.volume_percent.to_string()).await?;
    ensure_setting(pool, SETTING_ALERT_PROFILE, defaults.sound_profile.as_str()).await?;
    ensure_setting(pool, SETTING_ALERT_CUSTOM_SOUND, &defaults.custom_sound_reference).await?;
    ensure_setting(
        pool,
        SETTING_ALERT_KEEP_RINGING,
        &defaults.keep_ringing_until_acknowledged.to_string(),
    )
    .await?;

    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// Missing settings are created; NULL values are reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value {
        None => {
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;

            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;

            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}
