//! # OrderBell Alert Service Library (orderbell-alert)
//!
//! Audible alerting for newly arrived orders.
//!
//! **Purpose:** Deduplicate and batch "new order" arrivals, play a
//! volume-escalated alert (with optional ring-until-acknowledged looping)
//! and give the output device back exactly as it was found.
//!
//! **Architecture:** Arrival coordinator -> alert playback engine -> audio
//! device primitives, controlled over HTTP/SSE.

pub mod api;
pub mod arrival;
pub mod config;
pub mod control;
pub mod db;
pub mod device;
pub mod error;
pub mod playback;
pub mod settings;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
