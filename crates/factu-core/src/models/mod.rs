//! Data models: the extracted record, configuration and serde helpers.

pub mod config;
pub mod invoice;
pub mod lenient;
