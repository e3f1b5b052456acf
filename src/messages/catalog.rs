use crate::models::MessagesConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::sync::LazyLock;

/// `{field}` placeholder inside a message template.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid placeholder regex")
});

/// One domain's catalog: event key to message template.
pub type Catalog = IndexMap<String, String>;

/// Loads the per-domain catalogs of one locale and resolves messages.
///
/// Lookups never fail: a missing catalog or key yields the key itself.
#[derive(Debug, Clone)]
pub struct MessageManager {
    enabled: bool,
    locale: String,
    locales_dir: Utf8PathBuf,
    catalogs: HashMap<String, Catalog>,
}

impl MessageManager {
    /// Build the manager and eagerly load every configured domain.
    ///
    /// # Arguments
    /// * `config` - Messages section of the configuration
    /// * `locales_dir` - Resolved catalog root
    pub fn new(config: &MessagesConfig, locales_dir: impl AsRef<Utf8Path>) -> Self {
        let locales_dir = locales_dir.as_ref().to_path_buf();
        let mut catalogs = HashMap::new();

        if config.enabled {
            for domain in &config.domains {
                let path = catalog_path(&locales_dir, &config.locale, domain);
                if !path.exists() {
                    tracing::debug!(
                        "No '{}' catalog for locale {} at {}",
                        domain,
                        config.locale,
                        path
                    );
                    continue;
                }
                match load_catalog(&path) {
                    Ok(catalog) => {
                        catalogs.insert(domain.clone(), catalog);
                    }
                    Err(err) => tracing::warn!("Ignoring catalog {}: {:#}", path, err),
                }
            }
        }

        Self {
            enabled: config.enabled,
            locale: config.locale.clone(),
            locales_dir,
            catalogs,
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn locales_dir(&self) -> &Utf8Path {
        &self.locales_dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_catalog(&self, domain: &str) -> bool {
        self.catalogs.contains_key(domain)
    }

    /// Localized message for `key`, with `{field}` placeholders filled from
    /// `fields`. Falls back to the raw template if any placeholder has no
    /// matching field, and to the key if there is no template.
    pub fn translate(&self, domain: &str, key: &str, fields: &Value) -> String {
        if !self.enabled {
            return key.to_string();
        }
        let Some(template) = self.catalogs.get(domain).and_then(|c| c.get(key)) else {
            return key.to_string();
        };
        let empty = Map::new();
        let fields = fields.as_object().unwrap_or(&empty);
        interpolate(template, fields).unwrap_or_else(|| template.clone())
    }
}

fn interpolate(template: &str, fields: &Map<String, Value>) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0)?;
        let value = fields.get(&caps[1])?;
        out.push_str(&template[last..whole.start()]);
        match value {
            Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Some(out)
}

pub fn catalog_path(locales_dir: &Utf8Path, locale: &str, domain: &str) -> Utf8PathBuf {
    locales_dir.join(locale).join(format!("{}.yaml", domain))
}

/// Read one YAML catalog. Non-string values are kept as their YAML text.
pub fn load_catalog(path: &Utf8Path) -> Result<Catalog> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path))?;
    let raw: IndexMap<String, serde_yaml_ng::Value> = serde_yaml_ng::from_str(&contents)
        .with_context(|| format!("Failed to parse catalog: {}", path))?;

    let mut catalog = Catalog::new();
    for (key, value) in raw {
        let text = match value {
            serde_yaml_ng::Value::String(s) => s,
            serde_yaml_ng::Value::Null => continue,
            other => serde_yaml_ng::to_string(&other)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        };
        catalog.insert(key, text);
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn manager_with(yaml: &str, enabled: bool) -> (MessageManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("fr")).unwrap();
        fs::write(root.join("fr/eda.yaml"), yaml).unwrap();
        let config = MessagesConfig {
            enabled,
            domains: vec!["eda".to_string(), "report".to_string()],
            ..Default::default()
        };
        (MessageManager::new(&config, &root), temp_dir)
    }

    #[test]
    fn test_translate_interpolates_fields() {
        let (manager, _dir) = manager_with("eda_done: \"EDA terminée: {rows} lignes\"\n", true);
        assert_eq!(
            manager.translate("eda", "eda_done", &json!({"rows": 10})),
            "EDA terminée: 10 lignes"
        );
    }

    #[test]
    fn test_missing_field_returns_raw_template() {
        let (manager, _dir) = manager_with("eda_done: \"{rows} lignes, {cols} colonnes\"\n", true);
        assert_eq!(
            manager.translate("eda", "eda_done", &json!({"rows": 10})),
            "{rows} lignes, {cols} colonnes"
        );
    }

    #[test]
    fn test_missing_key_or_catalog_returns_key() {
        let (manager, _dir) = manager_with("eda_done: ok\n", true);
        assert!(manager.has_catalog("eda"));
        assert!(!manager.has_catalog("report"));
        assert_eq!(manager.translate("eda", "nope", &json!({})), "nope");
        assert_eq!(manager.translate("report", "report_done", &json!({})), "report_done");
    }

    #[test]
    fn test_only_identifier_braces_are_placeholders() {
        let fields = json!({"rows": 3, "name": "iris"});
        let fields = fields.as_object().unwrap();
        assert_eq!(
            interpolate("{name}: {rows} rows, {rows} kept, {0} {}", fields).as_deref(),
            Some("iris: 3 rows, 3 kept, {0} {}")
        );
        assert_eq!(interpolate("{missing}", fields), None);
    }

    #[test]
    fn test_disabled_returns_key() {
        let (manager, _dir) = manager_with("eda_done: ok\n", false);
        assert_eq!(manager.translate("eda", "eda_done", &json!({})), "eda_done");
    }
}
