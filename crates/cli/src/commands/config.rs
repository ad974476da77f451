use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use omra_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct ConfigField {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields = [
        ConfigField {
            key_path: "wizard.min_name_length",
            env_keys: &["OMRA_WIZARD_MIN_NAME_LENGTH"],
            value: config.wizard.min_name_length.to_string(),
        },
        ConfigField {
            key_path: "wizard.max_hierarchy_depth",
            env_keys: &["OMRA_WIZARD_MAX_HIERARCHY_DEPTH"],
            value: config.wizard.max_hierarchy_depth.to_string(),
        },
        ConfigField {
            key_path: "wizard.full_graph_checks",
            env_keys: &["OMRA_WIZARD_FULL_GRAPH_CHECKS"],
            value: config.wizard.full_graph_checks.to_string(),
        },
        ConfigField {
            key_path: "wizard.require_known_models",
            env_keys: &["OMRA_WIZARD_REQUIRE_KNOWN_MODELS"],
            value: config.wizard.require_known_models.to_string(),
        },
        ConfigField {
            key_path: "catalog.path",
            env_keys: &["OMRA_CATALOG_PATH"],
            value: config
                .catalog
                .path
                .as_deref()
                .map_or_else(|| "<unset>".to_string(), |path| path.display().to_string()),
        },
        ConfigField {
            key_path: "logging.level",
            env_keys: &["OMRA_LOGGING_LEVEL", "OMRA_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        ConfigField {
            key_path: "logging.format",
            env_keys: &["OMRA_LOGGING_FORMAT", "OMRA_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format),
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("omra.toml"), PathBuf::from("config/omra.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
