//! Settings database access
//!
//! Read/write the alert configuration in the settings table (key-value store).

use crate::error::{Error, Result};
use crate::settings::SettingsStore;
use async_trait::async_trait;
use orderbell_common::db::{
    SETTING_ALERT_CUSTOM_SOUND, SETTING_ALERT_ENABLED, SETTING_ALERT_KEEP_RINGING,
    SETTING_ALERT_PROFILE, SETTING_ALERT_VOLUME,
};
use orderbell_common::models::clamp_volume;
use orderbell_common::AlertConfiguration;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::warn;

/// [`SettingsStore`] over the SQLite settings table
#[derive(Clone)]
pub struct SqliteSettingsStore {
    db: Pool<Sqlite>,
}

impl SqliteSettingsStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn load(&self) -> Result<AlertConfiguration> {
        let defaults = AlertConfiguration::default();

        let volume = setting_or_default::<i64>(
            &self.db,
            SETTING_ALERT_VOLUME,
            i64::from(defaults.volume_percent),
        )
        .await?;

        Ok(AlertConfiguration {
            enabled: setting_or_default(&self.db, SETTING_ALERT_ENABLED, defaults.enabled).await?,
            volume_percent: clamp_volume(volume),
            sound_profile: setting_or_default(&self.db, SETTING_ALERT_PROFILE, defaults.sound_profile)
                .await?,
            custom_sound_reference: setting_or_default(
                &self.db,
                SETTING_ALERT_CUSTOM_SOUND,
                defaults.custom_sound_reference,
            )
            .await?,
            keep_ringing_until_acknowledged: setting_or_default(
                &self.db,
                SETTING_ALERT_KEEP_RINGING,
                defaults.keep_ringing_until_acknowledged,
            )
            .await?,
        })
    }

    async fn save(&self, config: &AlertConfiguration) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for (key, value) in [
            (SETTING_ALERT_ENABLED, config.enabled.to_string()),
            (SETTING_ALERT_VOLUME, config.volume_percent.to_string()),
            (SETTING_ALERT_PROFILE, config.sound_profile.to_string()),
            (SETTING_ALERT_CUSTOM_SOUND, config.custom_sound_reference.clone()),
            (
                SETTING_ALERT_KEEP_RINGING,
                config.keep_ringing_until_acknowledged.to_string(),
            ),
        ] {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value, updated_at)
                VALUES (?, ?, CURRENT_TIMESTAMP)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Read one setting, falling back to `default` when it is missing or unparsable
///
/// A bad value only costs that one field; database errors still propagate.
async fn setting_or_default<T: FromStr>(db: &Pool<Sqlite>, key: &str, default: T) -> Result<T> {
    match get_setting::<T>(db, key).await {
        Ok(value) => Ok(value.unwrap_or(default)),
        Err(Error::Config(msg)) => {
            warn!("{}; using default", msg);
            Ok(default)
        }
        Err(e) => Err(e),
    }
}

/// Generic setting getter
///
/// Returns `None` for missing keys and NULL values; unparsable values are a
/// configuration error.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten() {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}
