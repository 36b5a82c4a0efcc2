//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite schema management
//! - Sites and their followers

mod database;
mod models;

pub use database::Database;
pub use models::*;
