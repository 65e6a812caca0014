//! Database access layer
//!
//! Provides database queries for orders and alert settings.

pub mod orders;
pub mod settings;

pub use orders::{OrderRepository, SqliteOrderRepository};
pub use settings::SqliteSettingsStore;
