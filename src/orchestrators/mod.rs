//! Stage orchestrators.
//!
//! Each orchestrator owns one configuration section, calls the services
//! that do the work and reports progress through the shared
//! [`MessageOrchestrator`](crate::messages::MessageOrchestrator).
//!
//! # Components
//!
//! - [`FileOrchestrator`]: input file discovery, copy, compression and loading
//! - [`DataOrchestrator`]: raw data analysis and ML preparation
//! - [`EdaOrchestrator`]: profile and statistical summary
//! - [`PipelineOrchestrator`]: evaluation of every declared pipeline spec
//! - [`ReportOrchestrator`]: report rendering
//! - [`GeneralOrchestrator`]: run-mode selection and stage sequencing

pub mod data;
pub mod eda;
pub mod file;
pub mod general;
pub mod pipelines;
pub mod report;

pub use data::{DataAnalysis, DataOrchestrator};
pub use eda::EdaOrchestrator;
pub use file::FileOrchestrator;
pub use general::{GeneralOrchestrator, RunInput};
pub use pipelines::PipelineOrchestrator;
pub use report::ReportOrchestrator;

/// Output directory names under `<output_dir>/<project>/`.
pub const EDA_DIR: &str = "eda";
pub const PIPELINES_DIR: &str = "pipelines";
pub const REPORTS_DIR: &str = "reports";

#[cfg(test)]
pub(crate) fn test_messages() -> std::sync::Arc<crate::messages::MessageOrchestrator> {
    use crate::logging::{LoggerBaseConfig, LoggerManager};
    use crate::models::MessagesConfig;

    let manager = LoggerManager::new(LoggerBaseConfig::default());
    std::sync::Arc::new(crate::messages::MessageOrchestrator::new(
        &MessagesConfig::default(),
        "i18n/locales",
        &manager,
    ))
}
