//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations (sqlx)
//! - Typed row models and ledger state machines

mod database;
mod models;

pub use database::Database;
pub use models::*;
