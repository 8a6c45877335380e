//! Domain types for the client: configuration.

pub mod config;

pub use config::ClientConfig;
