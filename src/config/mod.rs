use crate::error::ConfigurationError;
use crate::logging::{LogBackend, LogLevel, LoggerBaseConfig};
use crate::models::AppConfig;
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};

/// Prefix of environment overrides, e.g. `MLP_PROJECT__NAME=demo`.
pub const ENV_PREFIX: &str = "MLP";

/// Where the raw configuration comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// YAML file, layered with `MLP_*` environment overrides.
    File(Utf8PathBuf),
    /// In-memory YAML document, no environment layer.
    Yaml(String),
}

/// Configuration manager: resolves the raw configuration into a validated
/// [`AppConfig`] and derives paths relative to an explicit project root.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    source: ConfigSource,
    project_root: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager.
    ///
    /// # Arguments
    /// * `source` - Raw configuration source
    /// * `project_root` - Directory every relative path resolves against
    pub fn new(source: ConfigSource, project_root: impl AsRef<Utf8Path>) -> Self {
        Self {
            source,
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    pub fn from_file(path: impl AsRef<Utf8Path>, project_root: impl AsRef<Utf8Path>) -> Self {
        Self::new(ConfigSource::File(path.as_ref().to_path_buf()), project_root)
    }

    pub fn from_yaml_str(yaml: &str, project_root: impl AsRef<Utf8Path>) -> Self {
        Self::new(ConfigSource::Yaml(yaml.to_string()), project_root)
    }

    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Load and validate the configuration.
    ///
    /// # Returns
    /// The validated AppConfig
    ///
    /// # Errors
    /// `ConfigurationError::Source` when the document cannot be read or does
    /// not match the schema, `ConfigurationError::Invalid` listing every
    /// semantic issue otherwise.
    pub fn load(&self) -> Result<AppConfig, ConfigurationError> {
        let builder = match &self.source {
            ConfigSource::File(path) => {
                let path = self.resolve(path.as_str());
                Config::builder()
                    .add_source(File::from(path.as_std_path()).format(FileFormat::Yaml))
                    .add_source(
                        Environment::with_prefix(ENV_PREFIX)
                            .prefix_separator("_")
                            .separator("__")
                            .try_parsing(true),
                    )
            }
            ConfigSource::Yaml(yaml) => {
                Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml))
            }
        };

        let config: AppConfig = builder.build()?.try_deserialize()?;

        let issues = config.validate();
        if !issues.is_empty() {
            tracing::error!("Configuration rejected with {} issue(s)", issues.len());
            return Err(ConfigurationError::Invalid(issues));
        }

        tracing::info!("Loaded configuration for project '{}'", config.project.name);
        Ok(config)
    }

    /// Resolve a configured path: absolute paths pass through, relative ones
    /// are joined onto the project root.
    pub fn resolve(&self, path: &str) -> Utf8PathBuf {
        resolve_against(&self.project_root, path)
    }

    /// Default log file location.
    pub fn make_logs_file_path(&self) -> Utf8PathBuf {
        self.project_root.join("logs").join("app.log")
    }

    /// Derive the complete logger configuration from the `logger` section.
    ///
    /// The log file defaults to `<project_root>/logs/app.log`; the application
    /// name falls back to `project.name`, then to `"mlp"`.
    pub fn build_logger_settings(
        &self,
        config: &AppConfig,
    ) -> Result<LoggerBaseConfig, ConfigurationError> {
        let settings = &config.logger;
        let mut issues = Vec::new();

        let level = LogLevel::parse(&settings.level).unwrap_or_else(|| {
            issues.push(format!("unknown logger level '{}'", settings.level));
            LogLevel::Info
        });
        let backend = LogBackend::parse(&settings.backend).unwrap_or_else(|| {
            issues.push(format!("unknown logger backend '{}'", settings.backend));
            LogBackend::Basic
        });
        if !issues.is_empty() {
            return Err(ConfigurationError::Invalid(issues));
        }

        let app_name = settings
            .app_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| Some(config.project.name.clone()).filter(|n| !n.trim().is_empty()))
            .unwrap_or_else(|| "mlp".to_string());

        let file_path = match &settings.file_path {
            Some(path) => self.resolve(path),
            None => self.make_logs_file_path(),
        };

        Ok(LoggerBaseConfig {
            app_name,
            level,
            json_mode: settings.json_mode,
            file_path: Some(file_path),
            file_max_bytes: settings.file_max_bytes,
            file_backup_count: settings.file_backup_count,
            default_fields: settings.default_fields.clone().into_iter().collect(),
            backend,
        })
    }
}

/// Absolute paths pass through; relative paths are joined onto `root`.
pub fn resolve_against(root: &Utf8Path, path: &str) -> Utf8PathBuf {
    let candidate = Utf8Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
project:
  name: demo
orchestrators: {}
logger:
  level: debug
"#;

    fn create_test_config_manager(yaml: &str) -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::from_yaml_str(yaml, &root);
        (manager, temp_dir)
    }

    #[test]
    fn test_load_minimal_yaml() {
        let (manager, _temp_dir) = create_test_config_manager(MINIMAL);
        let config = manager.load().unwrap();
        assert_eq!(config.project.name, "demo");
        assert_eq!(config.project.output_dir, "outputs");
    }

    #[test]
    fn test_missing_required_field_is_source_error() {
        let (manager, _temp_dir) = create_test_config_manager("orchestrators: {}\n");
        assert!(matches!(
            manager.load(),
            Err(ConfigurationError::Source(_))
        ));
    }

    #[test]
    fn test_semantic_issues_are_invalid_error() {
        let yaml = r#"
project:
  name: demo
orchestrators:
  pipelines:
    cv:
      cv_folds: 1
"#;
        let (manager, _temp_dir) = create_test_config_manager(yaml);
        match manager.load() {
            Err(ConfigurationError::Invalid(issues)) => {
                assert_eq!(issues.len(), 1);
                assert!(issues[0].contains("cv_folds"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_load_from_file() {
        let (manager, temp_dir) = create_test_config_manager(MINIMAL);
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, MINIMAL).unwrap();
        let file_manager = ConfigManager::from_file("config.yaml", manager.project_root());
        assert_eq!(file_manager.load().unwrap().project.name, "demo");
    }

    #[test]
    fn test_logger_settings_defaults() {
        let (manager, _temp_dir) = create_test_config_manager(MINIMAL);
        let config = manager.load().unwrap();
        let logger = manager.build_logger_settings(&config).unwrap();

        assert_eq!(logger.app_name, "demo");
        assert_eq!(logger.level, LogLevel::Debug);
        assert_eq!(
            logger.file_path.unwrap(),
            manager.project_root().join("logs/app.log")
        );
    }

    #[test]
    fn test_logger_settings_explicit_values() {
        let yaml = r#"
project:
  name: demo
orchestrators: {}
logger:
  app_name: custom
  backend: structlog
  file_path: /var/tmp/mlp.log
  default_fields:
    env: test
"#;
        let (manager, _temp_dir) = create_test_config_manager(yaml);
        let config = manager.load().unwrap();
        let logger = manager.build_logger_settings(&config).unwrap();

        assert_eq!(logger.app_name, "custom");
        assert_eq!(logger.backend, LogBackend::Structured);
        assert_eq!(logger.file_path.unwrap(), "/var/tmp/mlp.log");
        assert_eq!(logger.default_fields["env"], "test");
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let root = Utf8Path::new("/srv/project");
        assert_eq!(resolve_against(root, "outputs"), "/srv/project/outputs");
        assert_eq!(resolve_against(root, "/abs/out"), "/abs/out");
    }
}
