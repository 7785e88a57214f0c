//! Configuration
//!
//! Layered, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. TOML file (`$XDG_CONFIG_HOME/statusline/config.toml` unless a path is
//!    given)
//! 3. Environment (`STATUSLINE_*`, see [`ConfigOverrides::from_env`])
//! 4. Command line (built by the binary as another [`ConfigOverrides`])
//!
//! # Example
//!
//! ```toml
//! order = "prepend"
//! failure_policy = "isolate"
//! tick_timeout_ms = 2000
//!
//! [[module]]
//! type = "clock"
//! format = "%a %d %b %H:%M"
//!
//! [[module]]
//! type = "file"
//! path = "/sys/class/backlight/intel_backlight/brightness"
//! format = "☀ {}"
//! ttl_secs = 5
//! name = "backlight"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::aggregator::OrderPolicy;
use crate::modules::ModuleConfig;
use crate::protocol::EngineConfig;
use crate::registry::FailurePolicy;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown keys
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// A module entry can never work
    #[error("module #{index} ({module_type}): {reason}")]
    Invalid {
        /// Zero-based position in the `[[module]]` list
        index: usize,
        /// Module `type`
        module_type: &'static str,
        /// What is wrong
        reason: String,
    },
}

/// Where the configuration came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// No file found, built-in defaults
    Default,
    /// Loaded from this file
    File(PathBuf),
}

/// Contents of the config file
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusConfig {
    /// Placement of module blocks
    pub order: OrderPolicy,
    /// Module failure handling
    pub failure_policy: FailurePolicy,
    /// Per-module tick bound in milliseconds, 0 or absent = unbounded
    pub tick_timeout_ms: Option<u64>,
    /// Copy the two preamble lines to output
    pub forward_preamble: bool,
    /// Carry through blocks found in the input line
    pub merge_upstream: bool,
    /// Modules in display order
    #[serde(rename = "module")]
    pub modules: Vec<ModuleConfig>,
}

impl Default for StatusConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            order: engine.order,
            failure_policy: engine.failure_policy,
            tick_timeout_ms: None,
            forward_preamble: engine.forward_preamble,
            merge_upstream: engine.merge_upstream,
            modules: Vec::new(),
        }
    }
}

impl StatusConfig {
    /// Parse TOML text
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the text is malformed.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Check every module entry
    ///
    /// # Errors
    ///
    /// Returns the first invalid module.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, module) in self.modules.iter().enumerate() {
            module.validate().map_err(|reason| ConfigError::Invalid {
                index,
                module_type: module.type_name(),
                reason,
            })?;
        }
        Ok(())
    }

    /// Apply overrides on top of this configuration
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(order) = overrides.order {
            self.order = order;
        }
        if let Some(policy) = overrides.failure_policy {
            self.failure_policy = policy;
        }
        if let Some(ms) = overrides.tick_timeout_ms {
            self.tick_timeout_ms = Some(ms);
        }
        if let Some(forward) = overrides.forward_preamble {
            self.forward_preamble = forward;
        }
        if let Some(merge) = overrides.merge_upstream {
            self.merge_upstream = merge;
        }
    }

    /// Engine settings from this configuration
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            order: self.order,
            failure_policy: self.failure_policy,
            tick_timeout: self
                .tick_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            forward_preamble: self.forward_preamble,
            merge_upstream: self.merge_upstream,
        }
    }
}

/// Optional settings layered over the file
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Placement of module blocks
    pub order: Option<OrderPolicy>,
    /// Module failure handling
    pub failure_policy: Option<FailurePolicy>,
    /// Per-module tick bound in milliseconds (0 = unbounded)
    pub tick_timeout_ms: Option<u64>,
    /// Copy the preamble
    pub forward_preamble: Option<bool>,
    /// Carry through upstream blocks
    pub merge_upstream: Option<bool>,
}

impl ConfigOverrides {
    /// Read overrides from the environment
    ///
    /// - `STATUSLINE_ORDER`: `prepend` | `append`
    /// - `STATUSLINE_STRICT`: `1`/`true` for strict, `0`/`false` for isolate
    /// - `STATUSLINE_TICK_TIMEOUT_MS`: milliseconds, `0` = unbounded
    /// - `STATUSLINE_FORWARD_PREAMBLE`: boolean
    /// - `STATUSLINE_MERGE_UPSTREAM`: boolean
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| lookup(key).and_then(|v| parse_bool(&v));
        Self {
            order: lookup("STATUSLINE_ORDER").and_then(|v| v.parse().ok()),
            failure_policy: flag("STATUSLINE_STRICT").map(|strict| {
                if strict {
                    FailurePolicy::Strict
                } else {
                    FailurePolicy::Isolate
                }
            }),
            tick_timeout_ms: lookup("STATUSLINE_TICK_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()),
            forward_preamble: flag("STATUSLINE_FORWARD_PREAMBLE"),
            merge_upstream: flag("STATUSLINE_MERGE_UPSTREAM"),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Default config file location
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("statusline").join("config.toml"))
}

/// Load and validate a specific config file
///
/// # Errors
///
/// Fails if the file cannot be read, parsed, or validated.
pub fn load_config_from_path(path: &Path) -> Result<StatusConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = StatusConfig::from_toml(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load configuration
///
/// An explicit path must exist. Without one, the default location is used
/// if it exists and built-in defaults otherwise.
///
/// # Errors
///
/// Fails if a file that should be read cannot be read, parsed, or validated.
pub fn load_config(path: Option<&Path>) -> Result<(StatusConfig, ConfigSource), ConfigError> {
    if let Some(path) = path {
        let config = load_config_from_path(path)?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }

    match default_config_path() {
        Some(default) if default.exists() => {
            let config = load_config_from_path(&default)?;
            Ok((config, ConfigSource::File(default)))
        }
        _ => Ok((StatusConfig::default(), ConfigSource::Default)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::modules::{ClockConfig, CommandConfig};

    #[test]
    fn test_empty_file_is_default() {
        let config = StatusConfig::from_toml("").unwrap();
        assert_eq!(config, StatusConfig::default());
        assert_eq!(config.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = StatusConfig::from_toml(
            r##"
            order = "append"
            failure_policy = "strict"
            tick_timeout_ms = 1500
            forward_preamble = false

            [[module]]
            type = "clock"
            format = "%H:%M"
            color = "#ffffff"

            [[module]]
            type = "command"
            command = "uptime -p"
            ttl_secs = 60
            name = "uptime"
            "##,
        )
        .unwrap();

        assert_eq!(config.order, OrderPolicy::Append);
        assert_eq!(config.failure_policy, FailurePolicy::Strict);
        assert!(!config.forward_preamble);
        assert!(config.merge_upstream);

        let engine = config.engine_config();
        assert_eq!(engine.tick_timeout, Some(Duration::from_millis(1500)));

        assert_eq!(config.modules.len(), 2);
        match &config.modules[0] {
            ModuleConfig::Clock(ClockConfig { format, color, .. }) => {
                assert_eq!(format, "%H:%M");
                assert_eq!(color.as_deref(), Some("#ffffff"));
            }
            other => panic!("expected clock, got {other:?}"),
        }
        match &config.modules[1] {
            ModuleConfig::Command(CommandConfig {
                command,
                ttl_secs,
                timeout_ms,
                name,
                ..
            }) => {
                assert_eq!(command, "uptime -p");
                assert_eq!(*ttl_secs, 60);
                assert_eq!(*timeout_ms, 2000);
                assert_eq!(name.as_deref(), Some("uptime"));
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        assert!(StatusConfig::from_toml("colour = \"red\"").is_err());
    }

    #[test]
    fn test_unknown_module_type_rejected() {
        assert!(StatusConfig::from_toml("[[module]]\ntype = \"imap\"").is_err());
    }

    #[test]
    fn test_unknown_module_key_rejected() {
        let err = StatusConfig::from_toml("[[module]]\ntype = \"clock\"\nformt = \"%H\"")
            .unwrap_err();
        assert!(err.to_string().contains("formt"));

        let config =
            StatusConfig::from_toml("[[module]]\ntype = \"clock\"\nformat = \"%H\"\ninstance = \"utc\"")
                .unwrap();
        match &config.modules[0] {
            ModuleConfig::Clock(clock) => assert_eq!(clock.instance.as_deref(), Some("utc")),
            other => panic!("expected clock, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_timeout_means_unbounded() {
        let config = StatusConfig::from_toml("tick_timeout_ms = 0").unwrap();
        assert_eq!(config.engine_config().tick_timeout, None);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = StatusConfig::default();
        config.apply(&ConfigOverrides {
            order: Some(OrderPolicy::Append),
            failure_policy: None,
            tick_timeout_ms: Some(250),
            forward_preamble: Some(false),
            merge_upstream: None,
        });
        assert_eq!(config.order, OrderPolicy::Append);
        assert_eq!(config.failure_policy, FailurePolicy::Isolate);
        assert_eq!(config.tick_timeout_ms, Some(250));
        assert!(!config.forward_preamble);
        assert!(config.merge_upstream);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("STATUSLINE_ORDER", "append"),
            ("STATUSLINE_STRICT", "true"),
            ("STATUSLINE_TICK_TIMEOUT_MS", "500"),
            ("STATUSLINE_MERGE_UPSTREAM", "nonsense"),
        ]
        .into_iter()
        .collect();
        let overrides = ConfigOverrides::from_lookup(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(overrides.order, Some(OrderPolicy::Append));
        assert_eq!(overrides.failure_policy, Some(FailurePolicy::Strict));
        assert_eq!(overrides.tick_timeout_ms, Some(500));
        assert_eq!(overrides.forward_preamble, None);
        assert_eq!(overrides.merge_upstream, None);
    }

    #[test]
    fn test_load_config_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "order = \"append\"").unwrap();
        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.order, OrderPolicy::Append);

        let (_, source) = load_config(Some(file.path())).unwrap();
        assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));
    }

    #[test]
    fn test_load_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));

        let mut bad = NamedTempFile::new().unwrap();
        writeln!(bad, "order = ").unwrap();
        assert!(matches!(
            load_config_from_path(bad.path()),
            Err(ConfigError::Parse { .. })
        ));

        let mut invalid = NamedTempFile::new().unwrap();
        writeln!(invalid, "[[module]]\ntype = \"command\"\ncommand = \"\"").unwrap();
        let err = load_config_from_path(invalid.path()).unwrap_err();
        assert_eq!(err.to_string(), "module #0 (command): command is empty");
    }
}
