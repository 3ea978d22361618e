//! # HNews Common Library
//!
//! Shared code for the HNews controller workspace:
//! - `HNews` resource model (filter spec, observed status, item records)
//! - Resource change events
//! - Configuration loading and root folder resolution
//! - Database initialization
//! - Timestamp utilities

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod resource;
pub mod time;

pub use error::{Error, Result};
pub use resource::{HNews, ResourceKey};
