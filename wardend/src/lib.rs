pub mod classify;
pub mod cleanup;
pub mod config;
pub mod guardian;
pub mod history;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod server;
pub mod telemetry;
#[cfg(test)]
mod testutil;
pub mod tools;
pub mod types;

pub use config::{CleanupConfig, Config, GuardianConfig, LoggingConfig, MonitorConfig, ServerConfig};
pub use metrics::Metrics;
