//! Message domains and the event keys emitted within each of them.
//!
//! Every key listed here has an entry in the shipped catalogs under
//! `i18n/locales/<locale>/<domain>.yaml`.

pub mod domain {
    pub const GENERAL: &str = "general";
    pub const CONFIG: &str = "config";
    pub const FILE: &str = "file";
    pub const DATA: &str = "data";
    pub const EDA: &str = "eda";
    pub const PIPELINES: &str = "pipelines";
    pub const REPORT: &str = "report";
}

pub mod general {
    pub const APP_START: &str = "app_start";
    pub const APP_DONE: &str = "app_done";
    pub const APP_FAILED: &str = "app_failed";
    pub const INIT: &str = "general_init";
    pub const START_FROM_FILES: &str = "general_start_from_files";
    pub const START_FROM_DATA: &str = "general_start_from_data";
    pub const USING_EXAMPLE_DATA: &str = "using_example_data";
    pub const NO_INPUT_FILES_FOUND: &str = "no_input_files_found";
    pub const FILE_ORCH_FAILED: &str = "file_orch_failed";
    pub const DATA_ORCH_FAILED: &str = "data_orch_failed";
    pub const DATA_ORCH_DISABLED_NOT_FRAME: &str = "data_orch_disabled_not_frame";
    pub const EDA_ORCH_FAILED: &str = "eda_orch_failed";
    pub const PIPES_ORCH_FAILED: &str = "pipes_orch_failed";
    pub const REPORT_ORCH_FAILED: &str = "report_orch_failed";
    pub const PIPES_SKIPPED_NO_TARGET: &str = "pipes_skipped_no_target";
    pub const DONE: &str = "general_done";
}

pub mod config {
    pub const READY: &str = "config_ready";
    pub const ERROR: &str = "config_error";
    pub const MESSAGES_READY: &str = "messages_ready";
}

pub mod file {
    pub const INIT: &str = "file_init";
    pub const NO_INPUT_FILE: &str = "no_input_file";
    pub const INPUT_FOUND: &str = "input_found";
    pub const INPUT_PROCESSED: &str = "input_processed";
}

pub mod data {
    pub const INIT: &str = "data_init";
    pub const PROCESSING_START: &str = "data_processing_start";
    pub const ANALYSIS_COMPLETE: &str = "data_analysis_complete";
    pub const ANALYSIS_FAILED: &str = "data_analysis_failed";
    pub const PROCESSING_COMPLETE: &str = "data_processing_complete";
    pub const PROCESSING_FAILED: &str = "data_processing_failed";
}

pub mod eda {
    pub const START: &str = "eda_start";
    pub const DONE: &str = "eda_done";
}

pub mod pipelines {
    pub const START: &str = "pipelines_start";
    pub const DISABLED: &str = "pipelines_disabled";
    pub const EVAL_START: &str = "pipelines_eval_start";
    pub const EVAL_DONE: &str = "pipelines_eval_done";
    pub const DONE: &str = "pipelines_done";
}

pub mod report {
    pub const START: &str = "report_start";
    pub const DONE: &str = "report_done";
}
