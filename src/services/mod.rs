//! Services module - Pure logic behind each pipeline stage.
//!
//! The services hold no orchestration state and emit no localized events;
//! the orchestrators wrap them with configuration, messages and error
//! boundaries.
//!
//! # Components
//!
//! - [`FileManager`]: directory listing, timestamped copies, gzip
//!   compression and tabular file I/O (csv, xlsx/xls, json)
//! - [`DataManager`]: raw input normalization, target inference, cleaning
//!   and validation
//! - [`EdaSummarizer`] / [`EdaProfiler`]: JSON summary with policy flags and
//!   the self-contained HTML profile
//! - [`ReportRenderer`]: minijinja rendering of the final report
//! - [`ExperimentTracker`]: optional local run tracking
//! - [`example_dataset`]: the bundled demonstration dataset

pub mod data_manager;
pub mod datasets;
pub mod eda_profile;
pub mod eda_summary;
pub mod file_manager;
pub mod report_renderer;
pub mod tracking;

pub use data_manager::{ColumnKind, DataManager};
pub use datasets::example_dataset;
pub use eda_profile::EdaProfiler;
pub use eda_summary::EdaSummarizer;
pub use file_manager::FileManager;
pub use report_renderer::{ReportContext, ReportRenderer};
pub use tracking::{ExperimentTracker, TrackedRun, TrackingBackend};
