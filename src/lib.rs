//! Annex - Record Attachment Storage
//!
//! Stores files attached to a field of a record and keeps the field's
//! comma-separated link list in step with what is on disk.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod state;

pub use config::config;
pub use error::{Error, Result};
pub use state::AppState;
