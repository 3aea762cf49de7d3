//! Configuration management
//!
//! Handles connection profiles, user settings and API keys.

pub mod connections;
pub mod settings;

pub use connections::{ConnectionConfig, SslMode, find_connection};
pub use settings::{ApiKeys, Settings, load_settings};
