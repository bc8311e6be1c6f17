//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/alarmtree/alarmtree.toml`
//! 3. Explicit config file (`--config`)
//! 4. Environment variables: `ALARMTREE_*` prefix (scalar settings only)

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{PvRecord, DEFAULT_NAME_SEPARATOR, DEFAULT_PATH_SEPARATOR};

/// OPI file shown for channels of one voltage system (e.g. "hv").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemDisplay {
    pub system: String,
    pub opi: String,
}

/// Detector-specific OPI file that wins over the standard one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectorDisplay {
    pub detector: String,
    pub system: String,
    pub opi: String,
}

/// Display lookup used when deriving attributes from the legacy hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Detector-independent map, keyed by system name
    pub standard: Vec<SystemDisplay>,
    /// Per-detector overrides
    pub overrides: Vec<DetectorDisplay>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let opi = |file: &str| format!("/Hall-D/Default/ALARMS/Voltages/{}", file);
        let standard = [
            ("hv", "ShowHVChannel.opi"),
            ("lv", "ShowLVChannel.opi"),
            ("bias", "ShowBiasChannel.opi"),
        ]
        .into_iter()
        .map(|(system, file)| SystemDisplay {
            system: system.into(),
            opi: opi(file),
        })
        .collect();

        // FCAL bases have their own HV screen
        let overrides = vec![DetectorDisplay {
            detector: "FCAL".into(),
            system: "hv".into(),
            opi: opi("ShowBaseChannel.opi"),
        }];

        Self {
            standard,
            overrides,
        }
    }
}

impl DisplayConfig {
    /// OPI file for a channel of `system` under `detector`.
    pub fn lookup(&self, detector: &str, system: &str) -> Option<&str> {
        self.overrides
            .iter()
            .find(|o| o.detector == detector && o.system == system)
            .map(|o| o.opi.as_str())
            .or_else(|| {
                self.standard
                    .iter()
                    .find(|s| s.system == system)
                    .map(|s| s.opi.as_str())
            })
    }
}

/// PV record fields for channels derived from the legacy hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PvDefaults {
    pub enabled: bool,
    pub annunciating: bool,
    pub latching: bool,
    pub delay: i64,
    pub delay_count: i64,
    pub filter: String,
    pub global_alarm: bool,
}

impl Default for PvDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            annunciating: true,
            latching: true,
            delay: 2,
            delay_count: 0,
            filter: String::new(),
            global_alarm: false,
        }
    }
}

impl PvDefaults {
    pub fn to_record(&self, description: String) -> PvRecord {
        PvRecord {
            description,
            enabled: self.enabled,
            annunciating: self.annunciating,
            latching: self.latching,
            delay: self.delay,
            delay_count: self.delay_count,
            filter: self.filter.clone(),
            global_alarm: self.global_alarm,
        }
    }
}

/// Raw settings for intermediate parsing (`None` means "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub hierarchy_db: Option<PathBuf>,
    pub alarm_db: Option<PathBuf>,
    pub config_name: Option<String>,
    pub pv_prefix: Option<String>,
    pub leaf_suffix: Option<String>,
    pub path_separator: Option<String>,
    pub name_separator: Option<String>,
    pub displays: Option<DisplayConfig>,
    pub pv_defaults: Option<PvDefaults>,
}

/// Unified configuration for alarmtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Legacy detector hierarchy database (SQLite)
    pub hierarchy_db: Option<PathBuf>,
    /// Alarm configuration database (SQLite)
    pub alarm_db: Option<PathBuf>,
    /// Name of the `<config>` element in XML output
    pub config_name: String,
    /// Prefix prepended to alarm PV names, joined with ':'
    pub pv_prefix: String,
    /// Suffix carried by leaf channels of the legacy hierarchy
    pub leaf_suffix: String,
    /// Separator for full paths and diff keys
    pub path_separator: String,
    /// Separator for full names
    pub name_separator: String,
    pub displays: DisplayConfig,
    pub pv_defaults: PvDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hierarchy_db: None,
            alarm_db: None,
            config_name: "HallD".into(),
            pv_prefix: String::new(),
            leaf_suffix: ":alarm".into(),
            path_separator: DEFAULT_PATH_SEPARATOR.into(),
            name_separator: DEFAULT_NAME_SEPARATOR.into(),
            displays: DisplayConfig::default(),
            pv_defaults: PvDefaults::default(),
        }
    }
}

/// Get the XDG config directory for alarmtree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "alarmtree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("alarmtree.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

/// Expand `~`, `$VAR` and `${VAR}` in a path string.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// A missing global file is skipped; a missing explicit file is an error.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(raw);
            }
        }

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(ApplicationError::Config {
                    message: format!("config file not found: {}", path.display()),
                });
            }
            let raw = load_raw_settings(path)?;
            current = current.merge_with(raw);
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();

        Ok(current)
    }

    /// Overlay wins wherever it specifies a value.
    pub fn merge_with(&self, overlay: RawSettings) -> Self {
        Self {
            hierarchy_db: overlay.hierarchy_db.or_else(|| self.hierarchy_db.clone()),
            alarm_db: overlay.alarm_db.or_else(|| self.alarm_db.clone()),
            config_name: overlay
                .config_name
                .unwrap_or_else(|| self.config_name.clone()),
            pv_prefix: overlay.pv_prefix.unwrap_or_else(|| self.pv_prefix.clone()),
            leaf_suffix: overlay
                .leaf_suffix
                .unwrap_or_else(|| self.leaf_suffix.clone()),
            path_separator: overlay
                .path_separator
                .unwrap_or_else(|| self.path_separator.clone()),
            name_separator: overlay
                .name_separator
                .unwrap_or_else(|| self.name_separator.clone()),
            displays: overlay.displays.unwrap_or_else(|| self.displays.clone()),
            pv_defaults: overlay
                .pv_defaults
                .unwrap_or_else(|| self.pv_defaults.clone()),
        }
    }

    /// Apply ALARMTREE_* environment variables as explicit overrides.
    ///
    /// Covers every scalar setting; nested keys use `__`, e.g.
    /// `ALARMTREE_PV_DEFAULTS__DELAY=5`. The display maps are lists and can
    /// only be set in a config file.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("ALARMTREE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("hierarchy_db") {
            settings.hierarchy_db = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_string("alarm_db") {
            settings.alarm_db = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_string("config_name") {
            settings.config_name = val;
        }
        if let Ok(val) = config.get_string("pv_prefix") {
            settings.pv_prefix = val;
        }
        if let Ok(val) = config.get_string("leaf_suffix") {
            settings.leaf_suffix = val;
        }
        if let Ok(val) = config.get_string("path_separator") {
            settings.path_separator = val;
        }
        if let Ok(val) = config.get_string("name_separator") {
            settings.name_separator = val;
        }

        let pv = &mut settings.pv_defaults;
        if let Ok(val) = config.get_bool("pv_defaults.enabled") {
            pv.enabled = val;
        }
        if let Ok(val) = config.get_bool("pv_defaults.annunciating") {
            pv.annunciating = val;
        }
        if let Ok(val) = config.get_bool("pv_defaults.latching") {
            pv.latching = val;
        }
        if let Ok(val) = config.get_int("pv_defaults.delay") {
            pv.delay = val;
        }
        if let Ok(val) = config.get_int("pv_defaults.delay_count") {
            pv.delay_count = val;
        }
        if let Ok(val) = config.get_string("pv_defaults.filter") {
            pv.filter = val;
        }
        if let Ok(val) = config.get_bool("pv_defaults.global_alarm") {
            pv.global_alarm = val;
        }

        Ok(settings)
    }

    fn expand_paths(&mut self) {
        for path in [&mut self.hierarchy_db, &mut self.alarm_db].into_iter().flatten() {
            *path = PathBuf::from(expand_env_vars(path.to_string_lossy().as_ref()));
        }
    }

    /// Serialize as TOML (for `config show` and `config init`).
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize settings: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lookup_prefers_detector_override() {
        let displays = DisplayConfig::default();
        assert_eq!(
            displays.lookup("FCAL", "hv"),
            Some("/Hall-D/Default/ALARMS/Voltages/ShowBaseChannel.opi")
        );
        assert_eq!(
            displays.lookup("FCAL", "lv"),
            Some("/Hall-D/Default/ALARMS/Voltages/ShowLVChannel.opi")
        );
        assert_eq!(
            displays.lookup("BCAL", "hv"),
            Some("/Hall-D/Default/ALARMS/Voltages/ShowHVChannel.opi")
        );
        assert_eq!(displays.lookup("BCAL", "gas"), None);
    }

    #[test]
    fn test_merge_with_keeps_unspecified_values() {
        let base = Settings::default();
        let merged = base.merge_with(RawSettings {
            pv_prefix: Some("cj".into()),
            ..Default::default()
        });
        assert_eq!(merged.pv_prefix, "cj");
        assert_eq!(merged.config_name, "HallD");
        assert_eq!(merged.leaf_suffix, ":alarm");
    }

    #[test]
    fn test_settings_roundtrip_through_toml() {
        let settings = Settings::default();
        let text = settings.to_toml().unwrap();
        let raw: RawSettings = toml::from_str(&text).unwrap();
        assert_eq!(Settings::default().merge_with(raw), settings);
    }
}
