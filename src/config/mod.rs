// src/config/mod.rs

//! Settings loading, validation and storage for taskpilot.
//!
//! Responsibilities:
//! - Define the TOML-backed settings model (`model.rs`).
//! - Load a settings file from disk (`loader.rs`).
//! - Validate reserved keys like `session.debug` (`validate.rs`).
//! - Expose the [`ConfigStore`] contract the router consults (`store.rs`).

pub mod loader;
pub mod model;
pub mod store;
pub mod validate;

pub use loader::{default_settings_path, load_and_validate, load_from_path, load_or_default};
pub use model::{RawSettingsFile, SCHEMA_KEYS, Settings};
pub use store::ConfigStore;
