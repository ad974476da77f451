use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub wizard: WizardConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

/// Tunables for step gating and hierarchy validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WizardConfig {
    pub min_name_length: usize,
    pub max_hierarchy_depth: usize,
    /// Walk the whole catalog graph for cycles and depth instead of only
    /// comparing the parent against the children.
    pub full_graph_checks: bool,
    /// Reject model ids missing from a non-empty model catalog.
    pub require_known_models: bool,
}

impl WizardConfig {
    /// Names shorter than this are never accepted, whatever the config says.
    pub const NAME_LENGTH_FLOOR: usize = 3;

    pub fn effective_min_name_length(&self) -> usize {
        self.min_name_length.max(Self::NAME_LENGTH_FLOOR)
    }
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            min_name_length: 3,
            max_hierarchy_depth: 5,
            full_graph_checks: true,
            require_known_models: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub catalog_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub max_hierarchy_depth: Option<usize>,
    pub full_graph_checks: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            wizard: WizardConfig::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("omra.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(wizard) = patch.wizard {
            if let Some(min_name_length) = wizard.min_name_length {
                self.wizard.min_name_length = min_name_length;
            }
            if let Some(max_hierarchy_depth) = wizard.max_hierarchy_depth {
                self.wizard.max_hierarchy_depth = max_hierarchy_depth;
            }
            if let Some(full_graph_checks) = wizard.full_graph_checks {
                self.wizard.full_graph_checks = full_graph_checks;
            }
            if let Some(require_known_models) = wizard.require_known_models {
                self.wizard.require_known_models = require_known_models;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = Some(path);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("OMRA_WIZARD_MIN_NAME_LENGTH") {
            self.wizard.min_name_length = parse_usize("OMRA_WIZARD_MIN_NAME_LENGTH", &value)?;
        }
        if let Some(value) = read_env("OMRA_WIZARD_MAX_HIERARCHY_DEPTH") {
            self.wizard.max_hierarchy_depth =
                parse_usize("OMRA_WIZARD_MAX_HIERARCHY_DEPTH", &value)?;
        }
        if let Some(value) = read_env("OMRA_WIZARD_FULL_GRAPH_CHECKS") {
            self.wizard.full_graph_checks = parse_bool("OMRA_WIZARD_FULL_GRAPH_CHECKS", &value)?;
        }
        if let Some(value) = read_env("OMRA_WIZARD_REQUIRE_KNOWN_MODELS") {
            self.wizard.require_known_models =
                parse_bool("OMRA_WIZARD_REQUIRE_KNOWN_MODELS", &value)?;
        }

        if let Some(value) = read_env("OMRA_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(value));
        }

        let log_level = read_env("OMRA_LOGGING_LEVEL").or_else(|| read_env("OMRA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("OMRA_LOGGING_FORMAT").or_else(|| read_env("OMRA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = Some(catalog_path);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(max_hierarchy_depth) = overrides.max_hierarchy_depth {
            self.wizard.max_hierarchy_depth = max_hierarchy_depth;
        }
        if let Some(full_graph_checks) = overrides.full_graph_checks {
            self.wizard.full_graph_checks = full_graph_checks;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_wizard(&self.wizard)?;
        validate_catalog(&self.catalog)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("omra.toml"), PathBuf::from("config/omra.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_wizard(wizard: &WizardConfig) -> Result<(), ConfigError> {
    if !(WizardConfig::NAME_LENGTH_FLOOR..=64).contains(&wizard.min_name_length) {
        return Err(ConfigError::Validation(
            "wizard.min_name_length must be in range 3..=64".to_string(),
        ));
    }

    if wizard.max_hierarchy_depth < 2 || wizard.max_hierarchy_depth > 32 {
        return Err(ConfigError::Validation(
            "wizard.max_hierarchy_depth must be in range 2..=32 (a parent and one child need two levels)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if let Some(path) = &catalog.path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "catalog.path must not be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    wizard: Option<WizardPatch>,
    catalog: Option<CatalogPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct WizardPatch {
    min_name_length: Option<usize>,
    max_hierarchy_depth: Option<usize>,
    full_graph_checks: Option<bool>,
    require_known_models: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
