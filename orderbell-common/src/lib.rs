//! # OrderBell Common Library
//!
//! Shared code for the OrderBell services including:
//! - Alert configuration and order models
//! - Event types (AlertEvent enum) and the EventBus
//! - Database initialization (settings + orders tables)
//! - Configuration loading and root folder resolution
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{AlertConfiguration, Order, OrderId, SoundProfile};
