//! Process wiring for the relay: configuration loading, logging setup, and
//! the entry point that brings up the control plane.

pub mod config;
pub use config::{ServerConfig, ServerConfigError};

mod tracing_config;
pub use tracing_config::build_subscriber;

pub mod run;
