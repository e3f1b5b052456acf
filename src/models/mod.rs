//! Data models for the pipeline.
//!
//! - [`AppConfig`]: validated configuration tree and its sections
//! - [`PipelineSpec`]: declarative pipeline description with [`HyperParam`] grids
//! - [`Frame`], [`Series`], [`Cell`]: the in-memory tabular model
//! - Stage outputs ([`FileOutput`], [`DataOutput`], [`EdaOutput`],
//!   [`PipelinesOutput`], [`ReportOutput`]) aggregated into a [`RunOutcome`]

pub mod config;
pub mod frame;
pub mod pipeline_spec;
pub mod results;

pub use config::{
    AppConfig, CvConfig, DataConfig, EdaConfig, FileConfig, LoggerSettings, MessagesConfig,
    MissingStrategy, OrchestratorsConfig, PipelinesConfig, ProfileConfig, ProjectConfig,
    ReportConfig, ScoringConfig, TrackingConfig,
};
pub use frame::{Cell, Frame, RawData, Series};
pub use pipeline_spec::{
    AutoMlConfig, EstimatorConfig, FeatureSelectionConfig, HyperParam, ParamMap, ParamScalar,
    PipelineSpec, PreprocessConfig, ReductionConfig, StepsConfig,
};
pub use results::{
    Completion, DataMetadata, DataOutput, EdaFlags, EdaOutput, EdaSummary, FileMeta, FileOutput,
    PipelinesOutput, ReportOutput, RunMode, RunOutcome, RunResult, Shape, StageFailure,
    StageOutcome,
};
