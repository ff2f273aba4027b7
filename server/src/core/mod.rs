//! Core application infrastructure

pub(crate) mod banner;
pub mod cli;
pub mod config;
pub mod constants;
pub mod secret;
pub mod shutdown;
pub mod telemetry;

pub use crate::app::CoreApp;
pub use cli::{CliConfig, Commands};
pub use config::{AppConfig, AzureAuthConfig, LogFormat, NewRelicRegion, ServerConfig};
pub use secret::Secret;
pub use shutdown::ShutdownService;
pub use telemetry::TelemetryLogger;
