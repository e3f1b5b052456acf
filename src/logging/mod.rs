//! Process-wide logging built on `tracing`.
//!
//! A [`LoggerManager`] is built once from a [`LoggerBaseConfig`] at startup and
//! shared by `Arc` with every orchestrator. It installs a console layer and,
//! when a file path is configured, a size-rotated file layer behind
//! `tracing_appender::non_blocking`.
//!
//! # Backends
//!
//! [`LogBackend`] is chosen when the manager is built:
//! - `Basic`: line-oriented output, or JSON with event fields nested
//! - `Structured`: flattened JSON events, or pretty multi-line console output
//!
//! # Structured fields
//!
//! [`Logger`] handles attach a `logger` name, an `event` key and an `extra`
//! JSON object to every record. Process-wide default fields are merged into
//! `extra`, with per-call fields winning on key collision.

mod rotation;

pub use rotation::{rotating_file, RotatingFile};

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Case-insensitive. Accepts the usual aliases (`warning`, `critical`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" | "critical" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogBackend {
    Basic,
    Structured,
}

impl LogBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basic" | "stdlib" => Some(LogBackend::Basic),
            "structured" | "structlog" => Some(LogBackend::Structured),
            _ => None,
        }
    }
}

/// Immutable logging configuration snapshot.
#[derive(Debug, Clone)]
pub struct LoggerBaseConfig {
    pub app_name: String,
    pub level: LogLevel,
    pub json_mode: bool,
    pub file_path: Option<Utf8PathBuf>,
    pub file_max_bytes: u64,
    pub file_backup_count: usize,
    pub default_fields: Map<String, Value>,
    pub backend: LogBackend,
}

impl Default for LoggerBaseConfig {
    fn default() -> Self {
        Self {
            app_name: "mlp".to_string(),
            level: LogLevel::Info,
            json_mode: false,
            file_path: None,
            file_max_bytes: 5 * 1024 * 1024,
            file_backup_count: 3,
            default_fields: Map::new(),
            backend: LogBackend::Basic,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn format_layer<W>(backend: LogBackend, json: bool, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);

    match (backend, json) {
        (LogBackend::Basic, false) => base.boxed(),
        (LogBackend::Basic, true) => base.json().boxed(),
        (LogBackend::Structured, false) => base.pretty().boxed(),
        (LogBackend::Structured, true) => base
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .boxed(),
    }
}

/// Owns the process-wide subscriber configuration.
#[derive(Debug)]
pub struct LoggerManager {
    config: LoggerBaseConfig,
    configured: AtomicBool,
    guard: Mutex<Option<WorkerGuard>>,
    defaults: Arc<Map<String, Value>>,
}

impl LoggerManager {
    pub fn new(config: LoggerBaseConfig) -> Self {
        let mut defaults = Map::new();
        defaults.insert("app".to_string(), Value::String(config.app_name.clone()));
        for (key, value) in &config.default_fields {
            defaults.insert(key.clone(), value.clone());
        }
        Self {
            defaults: Arc::new(defaults),
            config,
            configured: AtomicBool::new(false),
            guard: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &LoggerBaseConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    /// Install the global subscriber. Idempotent.
    ///
    /// If another subscriber is already installed the manager keeps it and
    /// still counts as configured.
    pub fn configure(&self) -> Result<()> {
        if self.configured.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut layers: Vec<BoxedLayer> = Vec::new();
        layers.push(format_layer(
            self.config.backend,
            self.config.json_mode,
            std::io::stderr,
            !self.config.json_mode,
        ));

        if let Some(path) = &self.config.file_path {
            let writer = rotating_file(
                path,
                self.config.file_max_bytes,
                self.config.file_backup_count,
            )
            .with_context(|| format!("Failed to open log file: {}", path));
            let writer = match writer {
                Ok(writer) => writer,
                Err(err) => {
                    self.configured.store(false, Ordering::SeqCst);
                    return Err(err);
                }
            };
            let (non_blocking, guard) = tracing_appender::non_blocking(writer);
            layers.push(format_layer(
                self.config.backend,
                self.config.json_mode,
                non_blocking,
                false,
            ));
            if let Ok(mut slot) = self.guard.lock() {
                *slot = Some(guard);
            }
        }

        let filter = EnvFilter::new(self.config.level.as_str());
        let installed = tracing_subscriber::registry()
            .with(layers)
            .with(filter)
            .try_init()
            .is_ok();

        if installed {
            tracing::info!(
                "Logging initialized: app={}, level={}, json={}, file={}",
                self.config.app_name,
                self.config.level.as_str(),
                self.config.json_mode,
                self.config
                    .file_path
                    .as_ref()
                    .map(|p| p.as_str())
                    .unwrap_or("-")
            );
        } else {
            tracing::debug!("Global subscriber already installed, keeping it");
        }
        Ok(())
    }

    /// Named logger handle. Configures the manager on first use.
    pub fn get_logger(&self, name: &str) -> Logger {
        if let Err(err) = self.configure() {
            eprintln!("logging setup failed: {:#}", err);
        }
        Logger {
            name: name.to_string(),
            defaults: Arc::clone(&self.defaults),
        }
    }
}

/// Cheap, cloneable named logger.
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
    defaults: Arc<Map<String, Value>>,
}

macro_rules! emit_at {
    ($level:expr, $($field:tt)+) => {
        match $level {
            LogLevel::Trace => tracing::trace!($($field)+),
            LogLevel::Debug => tracing::debug!($($field)+),
            LogLevel::Info => tracing::info!($($field)+),
            LogLevel::Warn => tracing::warn!($($field)+),
            LogLevel::Error => tracing::error!($($field)+),
        }
    };
}

impl Logger {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default fields overlaid with `fields`; `fields` wins on collision.
    pub fn merge_fields(&self, fields: &Value) -> Map<String, Value> {
        let mut merged = (*self.defaults).clone();
        if let Value::Object(extra) = fields {
            for (key, value) in extra {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Emit one record tagged with an event key.
    pub fn event(&self, level: LogLevel, event: &str, message: &str, fields: &Value) {
        let extra = Value::Object(self.merge_fields(fields)).to_string();
        emit_at!(
            level,
            logger = %self.name,
            event = %event,
            extra = %extra,
            "{}",
            message
        );
    }

    pub fn log(&self, level: LogLevel, message: &str, fields: &Value) {
        self.event(level, "log", message, fields);
    }

    pub fn debug(&self, message: &str, fields: &Value) {
        self.log(LogLevel::Debug, message, fields);
    }

    pub fn info(&self, message: &str, fields: &Value) {
        self.log(LogLevel::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: &Value) {
        self.log(LogLevel::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: &Value) {
        self.log(LogLevel::Error, message, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_parsing() {
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("CRITICAL"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_backend_aliases() {
        assert_eq!(LogBackend::parse("stdlib"), Some(LogBackend::Basic));
        assert_eq!(LogBackend::parse("structlog"), Some(LogBackend::Structured));
        assert_eq!(LogBackend::parse("Structured"), Some(LogBackend::Structured));
        assert_eq!(LogBackend::parse("syslog"), None);
    }

    #[test]
    fn test_per_call_fields_win() {
        let mut config = LoggerBaseConfig::default();
        config
            .default_fields
            .insert("env".to_string(), json!("prod"));
        config
            .default_fields
            .insert("region".to_string(), json!("eu"));
        let manager = LoggerManager::new(config);
        let logger = Logger {
            name: "test".to_string(),
            defaults: Arc::clone(&manager.defaults),
        };

        let merged = logger.merge_fields(&json!({"env": "dev", "run": 3}));
        assert_eq!(merged["env"], "dev");
        assert_eq!(merged["region"], "eu");
        assert_eq!(merged["run"], 3);
        assert_eq!(merged["app"], "mlp");
    }

    #[test]
    fn test_configure_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("logs/app.log")).unwrap();
        let manager = LoggerManager::new(LoggerBaseConfig {
            file_path: Some(path.clone()),
            ..Default::default()
        });

        manager.configure().unwrap();
        manager.configure().unwrap();
        assert!(manager.is_configured());
        assert!(path.exists());

        let logger = manager.get_logger("idempotent");
        logger.info("still usable", &json!({}));
    }
}
