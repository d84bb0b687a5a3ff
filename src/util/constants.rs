// Lectern - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "Lectern";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "Lectern";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Resource layout
// =============================================================================

/// Environment variable that overrides the resource base directory.
pub const RESOURCE_DIR_ENV: &str = "LECTERN_RESOURCE_DIR";

/// Top-level directory holding every bundled resource, relative to the base.
pub const SHARE_DIR_NAME: &str = "share";

/// Stylesheets, relative to `share/`.
pub const CSS_DIR_NAME: &str = "css";

/// Icons, relative to `share/`.
pub const PIXMAPS_DIR_NAME: &str = "pixmaps";

/// UI definition files, relative to `share/`.
pub const XML_DIR_NAME: &str = "xml";

/// Translations, relative to `share/`.
pub const LOCALE_DIR_NAME: &str = "locale";

/// Stylesheet used on every platform except macOS.
pub const DEFAULT_CSS_FILE: &str = "default.css";

/// Stylesheet used on macOS.
pub const MACOS_CSS_FILE: &str = "macos.css";

/// Extension appended to UI definition names.
pub const UI_DEFINITION_EXTENSION: &str = "glade";

/// Glob matched (case-insensitively) against file names in `share/pixmaps`
/// to find application icons.
pub const ICON_FILE_PATTERN: &str = "lectern-*.png";

// =============================================================================
// File watcher
// =============================================================================

/// Quiet period after the last matching change before the reload callback runs.
pub const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 200;

/// Minimum user-configurable debounce delay (ms).
pub const MIN_WATCH_DEBOUNCE_MS: u64 = 10;

/// Maximum user-configurable debounce delay (ms).
pub const MAX_WATCH_DEBOUNCE_MS: u64 = 5_000;

/// How often the observer thread wakes to check its cancel flag (ms).
pub const WATCH_CANCEL_CHECK_INTERVAL_MS: u64 = 100;

/// Upper bound on signals drained per `poll` call, so a flood of events
/// cannot stall a UI frame.
pub const MAX_WATCH_SIGNALS_PER_POLL: usize = 256;

/// How often the CLI driver polls the watcher (ms). Stands in for a UI frame.
pub const CLI_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// Screensaver
// =============================================================================

/// Registry key holding the Windows screensaver switch.
pub const SCREENSAVER_REGISTRY_KEY: &str = r"HKCU\Control Panel\Desktop";

/// Registry value name of the Windows screensaver switch.
pub const SCREENSAVER_REGISTRY_VALUE: &str = "ScreenSaveActive";

/// Line fragment in `xset q` output that carries the DPMS state.
pub const XSET_DPMS_MARKER: &str = "DPMS is";

// =============================================================================
// Logging
// =============================================================================

/// Default log level when no override is specified.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// File names
// =============================================================================

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
