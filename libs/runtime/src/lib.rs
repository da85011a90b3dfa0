//! Process bootstrap shared by the server binaries: layered configuration,
//! home directory resolution and the `tracing` subscriber.

pub mod config;
pub mod logging;
pub mod paths;

pub use config::{AppConfig, CliArgs, LoggingConfig, Section, ServerConfig};
pub use logging::{init_default_logging, init_logging_from_config};
