//! Race data access
//!
//! SQLite race results store and the session dataset behind the win classifier.

pub mod database;
pub mod sessions;

pub use database::{Database, RaceStore};
pub use sessions::{SessionEntry, SessionHistory};
