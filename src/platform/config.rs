// Lectern - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for Lectern configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/lectern/ or %APPDATA%\Lectern\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[resources]` section.
    pub resources: ResourcesSection,
    /// `[watcher]` section.
    pub watcher: WatcherSection,
    /// `[screensaver]` section.
    pub screensaver: ScreensaverSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[resources]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ResourcesSection {
    /// Directory containing `share/`; overrides layout detection.
    pub directory: Option<String>,
}

/// `[watcher]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct WatcherSection {
    /// Quiet period before a changed document is reloaded (ms).
    pub debounce_ms: Option<u64>,
}

/// `[screensaver]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ScreensaverSection {
    /// Suppress the screensaver while presenting.
    pub suppress: Option<bool>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Explicit resource base directory.
    pub resource_dir: Option<PathBuf>,
    /// Watcher debounce delay in milliseconds.
    pub watch_debounce_ms: u64,
    /// Whether presenting suppresses the screensaver.
    pub suppress_screensaver: bool,
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    /// Log file path.
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            resource_dir: None,
            watch_debounce_ms: constants::DEFAULT_WATCH_DEBOUNCE_MS,
            suppress_screensaver: true,
            log_level: None,
            log_file: None,
        }
    }
}

/// Load and validate `config.toml` from the given config directory.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first-run).
/// If the file is unreadable or unparseable, returns defaults with a warning;
/// the application still starts but the user is informed.
pub fn load_config(config_dir: &Path) -> (AppConfig, Vec<String>) {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), Vec::new());
    }

    match load_config_file(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            (AppConfig::default(), vec![msg])
        }
    }
}

/// Load an explicitly named config file.
///
/// Unlike `load_config`, a missing or malformed file is an error: the user
/// asked for this file by name. Out-of-range values are still only warnings.
pub fn load_config_file(path: &Path) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let raw: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), "Loaded config.toml");

    let mut warnings = Vec::new();
    let config = validate(raw, &mut warnings);

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    Ok((config, warnings))
}

/// Range-check a debounce delay from any source.
///
/// `origin` names where the value came from (config key or CLI flag) and
/// leads the error text; the caller appends what it falls back to.
pub fn check_debounce_ms(origin: &str, ms: u64) -> Result<u64, String> {
    if (constants::MIN_WATCH_DEBOUNCE_MS..=constants::MAX_WATCH_DEBOUNCE_MS).contains(&ms) {
        Ok(ms)
    } else {
        Err(format!(
            "{origin} = {ms} is out of range ({}-{})",
            constants::MIN_WATCH_DEBOUNCE_MS,
            constants::MAX_WATCH_DEBOUNCE_MS,
        ))
    }
}

/// Check each field against its named bounds, accumulating every problem.
fn validate(raw: RawConfig, warnings: &mut Vec<String>) -> AppConfig {
    let mut config = AppConfig::default();

    // -- Resources: directory --
    if let Some(dir) = raw.resources.directory {
        if !dir.is_empty() {
            config.resource_dir = Some(PathBuf::from(dir));
        }
    }

    // -- Watcher: debounce_ms --
    if let Some(ms) = raw.watcher.debounce_ms {
        match check_debounce_ms("[watcher] debounce_ms", ms) {
            Ok(ms) => config.watch_debounce_ms = ms,
            Err(problem) => warnings.push(format!(
                "{problem}. Using default ({}).",
                constants::DEFAULT_WATCH_DEBOUNCE_MS
            )),
        }
    }

    // -- Screensaver: suppress --
    if let Some(suppress) = raw.screensaver.suppress {
        config.suppress_screensaver = suppress;
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.clone());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    // -- Logging: file --
    if let Some(ref file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file.clone());
        }
    }

    config
}
