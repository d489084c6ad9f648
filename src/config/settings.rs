//! TOML-based configuration for schemagraph.
//!
//! Example configuration:
//! ```toml
//! [store]
//! path = "${HOME}/.schemagraph/graph.db"
//! support_multiple_databases = true
//! default_database_name = "oracle_main"
//!
//! [inference]
//! enable_fk_inference = true
//! fk_inference_similarity_threshold = 0.7
//! patterns = ["{TABLE}_ID", "ID_{TABLE}", "{TABLE}_KEY", "{TABLE}_FK"]
//!
//! [inference.abbreviation_dictionary]
//! LFC = "LIFECYCLE"
//!
//! [search]
//! similarity_threshold = 0.6
//! max_results = 25
//!
//! [introspection]
//! max_concurrency = 8
//! ```
//!
//! The flat environment variables `ENABLE_FK_INFERENCE`,
//! `FK_INFERENCE_SIMILARITY_THRESHOLD`, `SUPPORT_MULTIPLE_DATABASES` and
//! `DEFAULT_DATABASE_NAME` override the file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Namespace used for every database when multiple databases are disabled.
pub const DEFAULT_NAMESPACE: &str = "__default__";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },

    #[error("Failed to determine home directory")]
    NoHomeDir,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub inference: InferenceSettings,
    pub search: SearchSettings,
    pub introspection: IntrospectionSettings,
}

/// Graph store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite file path (supports ${ENV_VAR} expansion). Defaults to
    /// `~/.schemagraph/graph.db`.
    pub path: Option<String>,

    /// Keep one namespace per database. When false every run replaces the
    /// single implicit namespace.
    pub support_multiple_databases: bool,

    /// Database name used when a run does not name one.
    pub default_database_name: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: None,
            support_multiple_databases: true,
            default_database_name: "oracle_main".to_string(),
        }
    }
}

impl StoreSettings {
    /// Resolved store path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<PathBuf, SettingsError> {
        match &self.path {
            Some(path) => Ok(PathBuf::from(expand_env_vars(path)?)),
            None => {
                let home = dirs::home_dir().ok_or(SettingsError::NoHomeDir)?;
                Ok(home.join(".schemagraph").join("graph.db"))
            }
        }
    }

    /// Store namespace for a database name.
    pub fn namespace_for(&self, database_name: &str) -> String {
        if self.support_multiple_databases {
            database_name.to_string()
        } else {
            DEFAULT_NAMESPACE.to_string()
        }
    }
}

/// Foreign-key inference settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Enable relationship inference.
    pub enable_fk_inference: bool,

    /// Minimum table-resolution score for an inferred relationship (0.0 to 1.0).
    pub fk_inference_similarity_threshold: f64,

    /// Abbreviation -> expansion pairs used during normalization.
    pub abbreviation_dictionary: HashMap<String, String>,

    /// Naming rule templates, in tie-break order.
    pub patterns: Vec<String>,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            enable_fk_inference: true,
            fk_inference_similarity_threshold: 0.7,
            abbreviation_dictionary: HashMap::new(),
            patterns: vec![
                "{TABLE}_ID".to_string(),
                "ID_{TABLE}".to_string(),
                "{TABLE}_KEY".to_string(),
                "{TABLE}_FK".to_string(),
            ],
        }
    }
}

/// Fuzzy search settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Threshold used when a search request does not supply one.
    pub similarity_threshold: f64,

    /// Cap on returned matches.
    pub max_results: Option<usize>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            max_results: Some(25),
        }
    }
}

/// Introspection batch settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntrospectionSettings {
    /// Tables fetched concurrently.
    pub max_concurrency: usize,
}

impl Default for IntrospectionSettings {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations, then apply
    /// environment overrides.
    ///
    /// Searches in order:
    /// 1. Environment variable `SCHEMAGRAPH_CONFIG`
    /// 2. `./schemagraph.toml`
    /// 3. `~/.config/schemagraph/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::load_file()?;
        settings.apply_overrides(|key| env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    fn load_file() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("SCHEMAGRAPH_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("schemagraph.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("schemagraph").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Apply flat `KEY=value` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ENABLE_FK_INFERENCE") {
            self.inference.enable_fk_inference = parse_bool("ENABLE_FK_INFERENCE", &v)?;
        }
        if let Some(v) = lookup("FK_INFERENCE_SIMILARITY_THRESHOLD") {
            self.inference.fk_inference_similarity_threshold = v.trim().parse().map_err(|_| {
                SettingsError::InvalidOverride {
                    key: "FK_INFERENCE_SIMILARITY_THRESHOLD".to_string(),
                    value: v.clone(),
                }
            })?;
        }
        if let Some(v) = lookup("SUPPORT_MULTIPLE_DATABASES") {
            self.store.support_multiple_databases = parse_bool("SUPPORT_MULTIPLE_DATABASES", &v)?;
        }
        if let Some(v) = lookup("DEFAULT_DATABASE_NAME") {
            if !v.trim().is_empty() {
                self.store.default_database_name = v.trim().to_string();
            }
        }
        Ok(())
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_unit_interval(
            "inference.fk_inference_similarity_threshold",
            self.inference.fk_inference_similarity_threshold,
        )?;
        check_unit_interval("search.similarity_threshold", self.search.similarity_threshold)?;

        if self.introspection.max_concurrency == 0 {
            return Err(SettingsError::InvalidConfig(
                "introspection.max_concurrency must be at least 1".to_string(),
            ));
        }
        if let Some(pattern) = self
            .inference
            .patterns
            .iter()
            .find(|p| !p.contains("{TABLE}"))
        {
            return Err(SettingsError::InvalidConfig(format!(
                "inference pattern '{pattern}' has no {{TABLE}} placeholder"
            )));
        }
        Ok(())
    }
}

fn check_unit_interval(key: &str, value: f64) -> Result<(), SettingsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::InvalidConfig(format!(
            "{key} must be within [0, 1], got {value}"
        )))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                // Lone $
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
