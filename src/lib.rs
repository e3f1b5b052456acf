// MLP - configuration-driven machine-learning pipeline orchestrator
//
// This is the library crate holding the stage orchestrators, the services they
// drive and the modeling kernel. The binary crate (main.rs) provides the CLI.

pub mod config;
pub mod error;
pub mod logging;
pub mod messages;
pub mod metrics;
pub mod modeling;
pub mod models;
pub mod orchestrators;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use logging::{LoggerBaseConfig, LoggerManager};
pub use models::{AppConfig, PipelineSpec, RunOutcome};
pub use orchestrators::{GeneralOrchestrator, RunInput};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
