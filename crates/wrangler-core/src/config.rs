use crate::error::Result;
use crate::types::ClassJob;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "wrangler.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TimingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Pause between state machine ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_interaction_timeout_secs")]
    pub interaction_timeout_secs: u64,
    /// Pause after a dialog-heavy transition so trailing windows can settle.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_class_switch_delay_ms")]
    pub class_switch_delay_ms: u64,
    #[serde(default = "default_class_switch_timeout_secs")]
    pub class_switch_timeout_secs: u64,
}

/// Longest timeout `validate` accepts without a warning (one day).
const MAX_TIMEOUT_SECS: u64 = 86_400;

fn default_tick_interval_ms() -> u64 {
    250
}

fn default_interaction_timeout_secs() -> u64 {
    90
}

fn default_settle_delay_ms() -> u64 {
    2000
}

fn default_class_switch_delay_ms() -> u64 {
    3000
}

fn default_class_switch_timeout_secs() -> u64 {
    10
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            interaction_timeout_secs: default_interaction_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            class_switch_delay_ms: default_class_switch_delay_ms(),
            class_switch_timeout_secs: default_class_switch_timeout_secs(),
        }
    }
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn interaction_timeout(&self) -> Duration {
        Duration::from_secs(self.interaction_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn class_switch_delay(&self) -> Duration {
        Duration::from_millis(self.class_switch_delay_ms)
    }

    pub fn class_switch_timeout(&self) -> Duration {
        Duration::from_secs(self.class_switch_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// InterpreterConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Hard ceiling on iterations of a single `While` step.
    #[serde(default = "default_while_iteration_limit")]
    pub while_iteration_limit: u32,
    /// How deep `LoadProfile` may nest.
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,
}

fn default_while_iteration_limit() -> u32 {
    10_000
}

fn default_max_include_depth() -> usize {
    16
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            while_iteration_limit: default_while_iteration_limit(),
            max_include_depth: default_max_include_depth(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default = "default_gatherer_target_level")]
    pub gatherer_target_level: u32,
    #[serde(default = "default_crafter_target_level")]
    pub crafter_target_level: u32,
    #[serde(default = "default_level_cap")]
    pub level_cap: u32,
    /// Classes the orchestrator leaves alone entirely.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_classes: Vec<ClassJob>,
}

fn default_gatherer_target_level() -> u32 {
    20
}

fn default_crafter_target_level() -> u32 {
    20
}

fn default_level_cap() -> u32 {
    100
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            gatherer_target_level: default_gatherer_target_level(),
            crafter_target_level: default_crafter_target_level(),
            level_cap: default_level_cap(),
            skip_classes: Vec::new(),
        }
    }
}

impl ProgressionConfig {
    pub fn is_skipped(&self, class: ClassJob) -> bool {
        self.skip_classes.contains(&class)
    }
}

// ---------------------------------------------------------------------------
// CraftingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CraftingConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5050".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    5
}

impl Default for CraftingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl CraftingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub crafting: CraftingConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            timing: TimingConfig::default(),
            interpreter: InterpreterConfig::default(),
            progression: ProgressionConfig::default(),
            crafting: CraftingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Defaults when `path` does not exist; a present but malformed file is
    /// still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let timing = &self.timing;

        if timing.tick_interval_ms == 0 {
            warnings.push(ConfigWarning::error(
                "timing.tick_interval_ms is 0; state machines would spin without yielding",
            ));
        }
        if timing.interaction_timeout_secs < 10 {
            warnings.push(ConfigWarning::warning(format!(
                "timing.interaction_timeout_secs={} is shorter than most dialog chains",
                timing.interaction_timeout_secs
            )));
        }
        for (name, secs) in [
            ("interaction_timeout_secs", timing.interaction_timeout_secs),
            ("class_switch_timeout_secs", timing.class_switch_timeout_secs),
        ] {
            if secs > MAX_TIMEOUT_SECS {
                warnings.push(ConfigWarning::warning(format!(
                    "timing.{name}={secs} is over {MAX_TIMEOUT_SECS}s; a stuck wait would never give up"
                )));
            }
        }
        if timing.class_switch_timeout_secs == 0 {
            warnings.push(ConfigWarning::error(
                "timing.class_switch_timeout_secs is 0; class switches can never be confirmed",
            ));
        }

        if self.interpreter.while_iteration_limit == 0 {
            warnings.push(ConfigWarning::error(
                "interpreter.while_iteration_limit is 0; every While step would be skipped",
            ));
        }
        if self.interpreter.max_include_depth == 0 {
            warnings.push(ConfigWarning::warning(
                "interpreter.max_include_depth is 0; LoadProfile steps will always fail",
            ));
        }

        let p = &self.progression;
        for (name, level) in [
            ("gatherer_target_level", p.gatherer_target_level),
            ("crafter_target_level", p.crafter_target_level),
        ] {
            if level == 0 {
                warnings.push(ConfigWarning::warning(format!(
                    "progression.{name} is 0; the leveling phase will do nothing"
                )));
            } else if level > p.level_cap {
                warnings.push(ConfigWarning::warning(format!(
                    "progression.{name}={level} exceeds level_cap={}",
                    p.level_cap
                )));
            }
        }

        let url = &self.crafting.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            warnings.push(ConfigWarning::error(format!(
                "crafting.base_url '{url}' is not an http(s) URL"
            )));
        }
        if self.crafting.poll_interval_ms == 0 {
            warnings.push(ConfigWarning::warning(
                "crafting.poll_interval_ms is 0; the order runner will be polled in a busy loop",
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.interpreter.while_iteration_limit, 10_000);
        assert_eq!(parsed.timing.tick_interval_ms, 250);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "timing:\n  interaction_timeout_secs: 120\nprogression:\n  skip_classes: [fisher]\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.timing.interaction_timeout_secs, 120);
        assert_eq!(cfg.timing.settle_delay_ms, 2000);
        assert!(cfg.progression.is_skipped(ClassJob::Fisher));
        assert!(!cfg.progression.is_skipped(ClassJob::Miner));
        assert_eq!(cfg.crafting.request_timeout_secs, 5);
    }

    #[test]
    fn default_config_has_no_warnings() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = Config::default();
        cfg.timing.tick_interval_ms = 0;
        cfg.interpreter.while_iteration_limit = 0;
        cfg.progression.crafter_target_level = 150;
        cfg.crafting.base_url = "localhost:5050".into();
        let warnings = cfg.validate();
        let errors = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .count();
        assert_eq!(errors, 3);
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("crafter_target_level=150")));
    }

    #[test]
    fn validate_warns_on_unbounded_timeouts() {
        let mut cfg = Config::default();
        cfg.timing.interaction_timeout_secs = u64::MAX;
        cfg.timing.class_switch_timeout_secs = 100_000;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Warning));
        assert!(warnings[0].message.contains("interaction_timeout_secs"));
        assert!(warnings[1].message.contains("class_switch_timeout_secs"));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let mut cfg = Config::default();
        cfg.progression.gatherer_target_level = 35;
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.progression.gatherer_target_level, 35);
    }

    #[test]
    fn load_or_default_when_missing() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(cfg.progression.level_cap, 100);
    }
}
