//! Localized, structured observability.
//!
//! [`MessageOrchestrator::emit`] is the one logging primitive the stage
//! orchestrators use: it pairs a technical event key with its localized text
//! and logs both, together with arbitrary fields, through a shared [`Logger`].

pub mod catalog;
pub mod taxonomy;

pub use catalog::{Catalog, MessageManager};

use crate::logging::{LogLevel, Logger, LoggerManager};
use crate::models::MessagesConfig;
use camino::Utf8Path;
use serde::Serialize;
use serde_json::{Map, Value};

/// Catalog availability for the configured locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagesStatus {
    pub enabled: bool,
    pub locale: String,
    pub available: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MessageOrchestrator {
    manager: MessageManager,
    domains: Vec<String>,
    logger: Logger,
}

impl MessageOrchestrator {
    pub fn new(
        config: &MessagesConfig,
        locales_dir: impl AsRef<Utf8Path>,
        logger_manager: &LoggerManager,
    ) -> Self {
        Self {
            manager: MessageManager::new(config, locales_dir),
            domains: config.domains.clone(),
            logger: logger_manager.get_logger("messages"),
        }
    }

    pub fn manager(&self) -> &MessageManager {
        &self.manager
    }

    pub fn translate(&self, domain: &str, key: &str, fields: &Value) -> String {
        self.manager.translate(domain, key, fields)
    }

    /// Log `event` at `level` with payload `{event, msg, domain, ..fields}`.
    ///
    /// # Returns
    /// The payload that was logged.
    pub fn emit(
        &self,
        domain: &str,
        event: &str,
        level: LogLevel,
        fields: Value,
    ) -> Map<String, Value> {
        let msg = self.translate(domain, event, &fields);

        let mut payload = Map::new();
        payload.insert("event".to_string(), Value::String(event.to_string()));
        payload.insert("msg".to_string(), Value::String(msg.clone()));
        payload.insert("domain".to_string(), Value::String(domain.to_string()));
        if let Value::Object(extra) = fields {
            for (key, value) in extra {
                payload.entry(key).or_insert(value);
            }
        }

        let payload_value = Value::Object(payload);
        self.logger.event(level, event, &msg, &payload_value);
        match payload_value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Report which configured domains have a catalog and emit `messages_ready`.
    pub fn run(&self) -> MessagesStatus {
        let (available, missing): (Vec<String>, Vec<String>) = self
            .domains
            .iter()
            .cloned()
            .partition(|d| self.manager.has_catalog(d));

        let status = MessagesStatus {
            enabled: self.manager.is_enabled(),
            locale: self.manager.locale().to_string(),
            available,
            missing,
        };
        self.emit(
            taxonomy::domain::CONFIG,
            taxonomy::config::MESSAGES_READY,
            LogLevel::Info,
            serde_json::json!({
                "locale": status.locale,
                "available": status.available,
                "missing": status.missing,
            }),
        );
        status
    }
}
