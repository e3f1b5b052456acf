//! MLP - configuration-driven machine-learning pipeline orchestrator
//!
//! Command-line entry point.
//!
//! # Execution Flow
//!
//! 1. Load and validate the YAML configuration (fatal on error)
//! 2. Build the logger manager once from the `logger` section
//! 3. Run the general orchestrator: File -> Data -> EDA -> Pipelines -> Report
//! 4. Print a JSON summary of stage statuses and report artifacts to stdout
//!
//! Relative paths in the configuration resolve against `--root`.

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use mlp::config::resolve_against;
use mlp::logging::LogLevel;
use mlp::messages::MessageOrchestrator;
use mlp::messages::taxonomy::{config as config_events, domain, general as events};
use mlp::models::MessagesConfig;
use mlp::{
    APP_NAME, ConfigManager, GeneralOrchestrator, LoggerBaseConfig, LoggerManager, RunInput,
    VERSION,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "mlp", version, about = "Configuration-driven ML pipeline orchestrator")]
struct Cli {
    /// Configuration file, relative to the project root unless absolute
    #[arg(short, long, default_value = "conf/config.yaml")]
    config: Utf8PathBuf,

    /// Project root every relative path resolves against
    #[arg(short, long, default_value = ".")]
    root: Utf8PathBuf,

    /// Ignore file intake and run on the bundled example dataset
    #[arg(long)]
    example: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_manager = ConfigManager::from_file(&cli.config, &cli.root);

    let loaded = config_manager.load().and_then(|config| {
        let settings = config_manager.build_logger_settings(&config)?;
        Ok((config, settings))
    });
    let (mut config, settings) = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            let fallback = LoggerManager::new(LoggerBaseConfig::default());
            let messages = MessageOrchestrator::new(
                &MessagesConfig::default(),
                resolve_against(&cli.root, &MessagesConfig::default().locales_dir),
                &fallback,
            );
            messages.emit(
                domain::CONFIG,
                config_events::ERROR,
                LogLevel::Error,
                json!({"path": cli.config, "error": err.to_string()}),
            );
            return Err(err.into());
        }
    };

    if cli.example {
        if let Some(file) = config.orchestrators.file.as_mut() {
            file.enabled = false;
        }
    }

    let log_file = settings.file_path.clone();
    let logger_manager = Arc::new(LoggerManager::new(settings));
    logger_manager.configure()?;

    let messages_config = &config.orchestrators.messages;
    let messages = MessageOrchestrator::new(
        messages_config,
        config_manager.resolve(&messages_config.locales_dir),
        &logger_manager,
    );
    messages.emit(
        domain::GENERAL,
        events::APP_START,
        LogLevel::Info,
        json!({"app": APP_NAME, "version": VERSION, "log_file": log_file}),
    );

    let orchestrator = GeneralOrchestrator::new(&config, &cli.root, Arc::clone(&logger_manager));
    let orchestrator = match orchestrator {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            messages.emit(
                domain::GENERAL,
                events::APP_FAILED,
                LogLevel::Error,
                json!({"error": format!("{:#}", err)}),
            );
            return Err(err);
        }
    };

    let outcome = orchestrator.run(RunInput::Auto);
    let summary = outcome.summary();
    messages.emit(
        domain::GENERAL,
        events::APP_DONE,
        LogLevel::Info,
        json!({
            "mode": summary["mode"],
            "completion": summary["completion"],
            "report_artifacts": summary["report_artifacts"],
        }),
    );

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
