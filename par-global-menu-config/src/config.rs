//! The `MirrorConfig` struct and its persistence helpers.
//!
//! Every switch defaults to `false` except `enabled` and
//! `suppress_fake_segments`, so an empty YAML file yields the stock behavior.
//! Process-level overrides are read from `PAR_GLOBAL_MENU_*` environment
//! variables after the file is parsed.

use crate::error::ConfigError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "PAR_GLOBAL_MENU_";

/// Debug-trace categories. Each one adds verbose output for a single
/// concern of the mirror; all are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Raw and filtered native interaction events.
    #[serde(default = "crate::defaults::bool_false")]
    pub events: bool,

    /// Created/deleted/updated counts for every reconciliation pass.
    #[serde(default = "crate::defaults::bool_false")]
    pub sync_stats: bool,

    /// Clear-timer scheduling and release of cached host children.
    #[serde(default = "crate::defaults::bool_false")]
    pub clearing: bool,

    /// Events or host items that do not match the mirrored hierarchy.
    #[serde(default = "crate::defaults::bool_false")]
    pub hierarchy: bool,
}

impl TraceConfig {
    /// Enable every category.
    pub fn all() -> Self {
        Self {
            events: true,
            sync_stats: true,
            clearing: true,
            hierarchy: true,
        }
    }

    /// Whether any category is enabled.
    pub fn any(&self) -> bool {
        self.events || self.sync_stats || self.clearing || self.hierarchy
    }
}

/// Configuration for the global menu mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    // ========================================================================
    // Feature switches
    // ========================================================================
    /// Mirror window menus into the desktop's global menu service.
    /// When false, every registry operation is a no-op and hosts keep their
    /// in-window menu bars.
    #[serde(default = "crate::defaults::bool_true")]
    pub enabled: bool,

    /// Only fill submenus on "about to show"; ignore "opened".
    #[serde(default = "crate::defaults::bool_false")]
    pub skip_open_fill: bool,

    /// Deliver native events as they arrive, without burst suppression.
    #[serde(default = "crate::defaults::bool_false")]
    pub disable_event_filtering: bool,

    /// Do not pre-populate root menus when the roots are set.
    #[serde(default = "crate::defaults::bool_false")]
    pub disable_root_prefill: bool,

    /// Do not pre-populate the level below a submenu being filled.
    #[serde(default = "crate::defaults::bool_false")]
    pub disable_submenu_prefill: bool,

    /// Leave the host's own popups open while a submenu is filled.
    #[serde(default = "crate::defaults::bool_false")]
    pub keep_popups_on_fill: bool,

    /// Drop the fake open/close segments some menu applets emit when the
    /// first root is opened. This is a heuristic and can suppress genuine
    /// navigation on wide menu bars, so it can be switched off.
    #[serde(default = "crate::defaults::bool_true")]
    pub suppress_fake_segments: bool,

    // ========================================================================
    // Debug tracing
    // ========================================================================
    #[serde(default)]
    pub trace: TraceConfig,

    // ========================================================================
    // Timing
    // ========================================================================
    #[serde(default = "crate::defaults::fill_debounce_ms")]
    pub fill_debounce_ms: u64,

    #[serde(default = "crate::defaults::clear_delay_ms")]
    pub clear_delay_ms: u64,

    #[serde(default = "crate::defaults::filter_idle_ms")]
    pub filter_idle_ms: u64,

    #[serde(default = "crate::defaults::filter_timeout_ms")]
    pub filter_timeout_ms: u64,

    #[serde(default = "crate::defaults::host_wait_ms")]
    pub host_wait_ms: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: crate::defaults::bool_true(),
            skip_open_fill: false,
            disable_event_filtering: false,
            disable_root_prefill: false,
            disable_submenu_prefill: false,
            keep_popups_on_fill: false,
            suppress_fake_segments: crate::defaults::bool_true(),
            trace: TraceConfig::default(),
            fill_debounce_ms: crate::defaults::fill_debounce_ms(),
            clear_delay_ms: crate::defaults::clear_delay_ms(),
            filter_idle_ms: crate::defaults::filter_idle_ms(),
            filter_timeout_ms: crate::defaults::filter_timeout_ms(),
            host_wait_ms: crate::defaults::host_wait_ms(),
        }
    }
}

impl MirrorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style switch for the whole feature.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder-style trace configuration.
    pub fn with_trace(mut self, trace: TraceConfig) -> Self {
        self.trace = trace;
        self
    }

    pub fn fill_debounce(&self) -> Duration {
        Duration::from_millis(self.fill_debounce_ms)
    }

    pub fn clear_delay(&self) -> Duration {
        Duration::from_millis(self.clear_delay_ms)
    }

    pub fn filter_idle(&self) -> Duration {
        Duration::from_millis(self.filter_idle_ms)
    }

    pub fn filter_timeout(&self) -> Duration {
        Duration::from_millis(self.filter_timeout_ms)
    }

    pub fn host_wait(&self) -> Duration {
        Duration::from_millis(self.host_wait_ms)
    }

    /// Depth budget used when the window's root list is (re)set: roots plus
    /// one level of their children, unless root pre-fill is disabled.
    pub fn root_depth(&self) -> usize {
        if self.disable_root_prefill { 1 } else { 2 }
    }

    /// Depth budget used when a submenu is filled on demand.
    pub fn fill_depth(&self) -> usize {
        if self.disable_submenu_prefill { 1 } else { 2 }
    }

    /// Check value ranges. Zero-length windows would turn the debounce and
    /// the filter into busy loops.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter_idle_ms == 0 {
            return Err(ConfigError::Validation(
                "filter_idle_ms must be greater than zero".to_string(),
            ));
        }
        if self.filter_timeout_ms <= self.filter_idle_ms {
            return Err(ConfigError::Validation(format!(
                "filter_timeout_ms ({}) must exceed filter_idle_ms ({})",
                self.filter_timeout_ms, self.filter_idle_ms
            )));
        }
        if self.host_wait_ms == 0 {
            return Err(ConfigError::Validation(
                "host_wait_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from the default path, falling back to defaults
    /// when the file does not exist. Environment overrides are applied last.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        log::info!("Global menu config path: {:?}", config_path);

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            log::info!("Global menu config not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML config file. No environment overrides are applied.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(ConfigError::from)?;
        let config: MirrorConfig = serde_yaml_ng::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml_ng::to_string(self)?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Get the configuration file path (using XDG convention)
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Get the configuration directory path (using XDG convention)
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(config_dir) = dirs::config_dir() {
                config_dir.join("par-global-menu")
            } else {
                PathBuf::from(".")
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".config").join("par-global-menu")
            } else {
                PathBuf::from(".")
            }
        }
    }

    /// Apply `PAR_GLOBAL_MENU_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply overrides from an arbitrary `(name, value)` source. Unknown
    /// names with the prefix are logged and ignored.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in vars {
            let name = name.as_ref();
            let value = value.as_ref();
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let bad = || ConfigError::EnvOverride {
                name: name.to_string(),
                value: value.to_string(),
            };
            match key {
                "ENABLED" => self.enabled = parse_flag(value).ok_or_else(bad)?,
                "SKIP_OPEN_FILL" => self.skip_open_fill = parse_flag(value).ok_or_else(bad)?,
                "DISABLE_EVENT_FILTERING" => {
                    self.disable_event_filtering = parse_flag(value).ok_or_else(bad)?
                }
                "DISABLE_ROOT_PREFILL" => {
                    self.disable_root_prefill = parse_flag(value).ok_or_else(bad)?
                }
                "DISABLE_SUBMENU_PREFILL" => {
                    self.disable_submenu_prefill = parse_flag(value).ok_or_else(bad)?
                }
                "KEEP_POPUPS_ON_FILL" => {
                    self.keep_popups_on_fill = parse_flag(value).ok_or_else(bad)?
                }
                "SUPPRESS_FAKE_SEGMENTS" => {
                    self.suppress_fake_segments = parse_flag(value).ok_or_else(bad)?
                }
                "TRACE" => {
                    if parse_flag(value).ok_or_else(bad)? {
                        self.trace = TraceConfig::all();
                    } else {
                        self.trace = TraceConfig::default();
                    }
                }
                "TRACE_EVENTS" => self.trace.events = parse_flag(value).ok_or_else(bad)?,
                "TRACE_SYNC_STATS" => self.trace.sync_stats = parse_flag(value).ok_or_else(bad)?,
                "TRACE_CLEARING" => self.trace.clearing = parse_flag(value).ok_or_else(bad)?,
                "TRACE_HIERARCHY" => self.trace.hierarchy = parse_flag(value).ok_or_else(bad)?,
                other => log::warn!("Ignoring unknown override {}{}", ENV_PREFIX, other),
            }
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
