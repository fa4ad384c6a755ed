//! Config layers and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Context file (`--context`, else `~/.config/cloudshell-provider/context.toml`)
//!
//! Context files are TOML. Nested tables flatten to dotted keys, so
//!
//! ```toml
//! api-url = "https://functions.example.com"
//!
//! [oracle]
//! profile = "DEFAULT"
//! ```
//!
//! yields `api-url` and `oracle.profile`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::ConfigSource;

/// Errors during context loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read context file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse context file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// One named layer of flat `key -> value` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    name: String,
    values: BTreeMap<String, String>,
}

impl ConfigLayer {
    /// Create an empty layer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style [`ConfigLayer::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Set a value only when one is given.
    pub fn set_opt(&mut self, key: &str, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    /// Parse a TOML document into a layer.
    pub fn from_toml_str(name: impl Into<String>, content: &str) -> Result<Self, toml::de::Error> {
        let table: toml::Table = toml::from_str(content)?;
        let mut layer = Self::new(name);
        flatten_into(&mut layer.values, "", &table);
        Ok(layer)
    }

    /// Load a TOML context file into a layer named after the file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(format!("context:{}", path.display()), &content).map_err(|e| {
            ConfigError::ParseFile {
                path: path.to_path_buf(),
                source: e,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw value for `key`, including empty strings.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Walk a TOML table, writing scalars under dotted keys.
fn flatten_into(out: &mut BTreeMap<String, String>, prefix: &str, table: &toml::Table) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(inner) => flatten_into(out, &full_key, inner),
            toml::Value::String(s) => {
                out.insert(full_key, s.clone());
            }
            toml::Value::Boolean(b) => {
                out.insert(full_key, b.to_string());
            }
            toml::Value::Integer(i) => {
                out.insert(full_key, i.to_string());
            }
            toml::Value::Float(f) => {
                out.insert(full_key, f.to_string());
            }
            toml::Value::Datetime(d) => {
                out.insert(full_key, d.to_string());
            }
            toml::Value::Array(_) => {
                warn!(key = %full_key, "ignoring array value in context file");
            }
        }
    }
}

/// An ordered stack of [`ConfigLayer`]s, highest priority first.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
    layers: Vec<ConfigLayer>,
}

impl LayeredConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer below every layer already present.
    pub fn push(&mut self, layer: ConfigLayer) {
        self.layers.push(layer);
    }

    /// Builder-style [`LayeredConfig::push`].
    pub fn with_layer(mut self, layer: ConfigLayer) -> Self {
        self.push(layer);
        self
    }

    /// Build the CLI's configuration: flags over the context file.
    ///
    /// An explicit `context` path must exist. Without one, the global
    /// context file is used if present.
    pub fn load(flags: ConfigLayer, context: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::new().with_layer(flags);

        let context_path = match context {
            Some(path) => Some(path.to_path_buf()),
            None => Self::global_context_path().filter(|p| p.exists()),
        };
        if let Some(path) = context_path {
            let layer = ConfigLayer::load_file(&path)?;
            if layer.is_empty() {
                warn!(path = %path.display(), "context file sets no keys");
            }
            config.push(layer);
        }

        let names: Vec<&str> = config.layers().iter().map(ConfigLayer::name).collect();
        debug!(layers = ?names, "configuration loaded");
        Ok(config)
    }

    /// Get the global context file path.
    pub fn global_context_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| {
            d.join(crate::constants::CONFIG_DIR)
                .join(crate::constants::CONTEXT_FILENAME)
        })
    }

    /// Layers in priority order.
    pub fn layers(&self) -> &[ConfigLayer] {
        &self.layers
    }

    /// First non-empty value for `key` along with the layer that set it.
    pub fn lookup(&self, key: &str) -> Option<(&str, &str)> {
        self.layers.iter().find_map(|layer| {
            layer
                .get(key)
                .filter(|v| !v.is_empty())
                .map(|v| (layer.name(), v))
        })
    }
}

impl ConfigSource for LayeredConfig {
    fn get_string(&self, key: &str) -> String {
        match self.lookup(key) {
            Some((layer, value)) => {
                debug!(key, layer, "config value found");
                value.to_string()
            }
            None => String::new(),
        }
    }

    fn get_bool(&self, key: &str) -> bool {
        let Some((layer, value)) = self.lookup(key) else {
            return false;
        };
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => {
                warn!(key, layer, value, "ignoring invalid boolean value");
                false
            }
        }
    }
}
