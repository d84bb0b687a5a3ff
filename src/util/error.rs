// Lectern - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Every subsystem error converts into `LecternError` and keeps its source
// so diagnostic logging can walk the full chain.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all Lectern operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LecternError {
    /// A bundled resource could not be located or decoded.
    Resource(ResourceError),

    /// Screensaver suppression or restoration failed.
    Screensaver(ScreensaverError),

    /// The file watcher could not be set up.
    Watch(WatchError),

    /// Opening a file with the default handler failed.
    Launcher(LauncherError),

    /// Configuration loading or validation failed.
    Config(ConfigError),
}

impl fmt::Display for LecternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(e) => write!(f, "Resource error: {e}"),
            Self::Screensaver(e) => write!(f, "Screensaver error: {e}"),
            Self::Watch(e) => write!(f, "Watch error: {e}"),
            Self::Launcher(e) => write!(f, "Launcher error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl std::error::Error for LecternError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resource(e) => Some(e),
            Self::Screensaver(e) => Some(e),
            Self::Watch(e) => Some(e),
            Self::Launcher(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Resource errors
// ---------------------------------------------------------------------------

/// Errors related to locating and loading bundled resources.
#[derive(Debug)]
pub enum ResourceError {
    /// The resolved resource path does not exist.
    NotFound { path: PathBuf },

    /// I/O error listing or reading a resource.
    Io { path: PathBuf, source: io::Error },

    /// An image resource could not be decoded.
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => {
                write!(f, "Resource '{}' does not exist", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "I/O error on resource '{}': {source}", path.display())
            }
            Self::Decode { path, source } => {
                write!(f, "Cannot decode image '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<ResourceError> for LecternError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

// ---------------------------------------------------------------------------
// Screensaver errors
// ---------------------------------------------------------------------------

/// Errors related to screensaver and display power management control.
#[derive(Debug)]
pub enum ScreensaverError {
    /// The OS refused access to the screensaver settings.
    PermissionDenied { detail: String },

    /// No screensaver backend exists for this host OS.
    UnsupportedPlatform { os: &'static str },

    /// A helper command ran but exited unsuccessfully.
    CommandFailed {
        command: String,
        status: Option<i32>,
    },

    /// A helper command produced output that could not be interpreted.
    UnexpectedOutput { command: String, reason: String },

    /// A helper command could not be started at all.
    Io { command: String, source: io::Error },
}

impl fmt::Display for ScreensaverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied { detail } => {
                write!(f, "Access denied to screensaver settings: {detail}")
            }
            Self::UnsupportedPlatform { os } => {
                write!(f, "Unsupported OS '{os}': cannot enable/disable screensaver")
            }
            Self::CommandFailed {
                command,
                status: Some(code),
            } => write!(f, "'{command}' exited with status {code}"),
            Self::CommandFailed {
                command,
                status: None,
            } => write!(f, "'{command}' was terminated by a signal"),
            Self::UnexpectedOutput { command, reason } => {
                write!(f, "Unexpected output from '{command}': {reason}")
            }
            Self::Io { command, source } => {
                write!(f, "Could not run '{command}': {source}")
            }
        }
    }
}

impl std::error::Error for ScreensaverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ScreensaverError> for LecternError {
    fn from(e: ScreensaverError) -> Self {
        Self::Screensaver(e)
    }
}

// ---------------------------------------------------------------------------
// Watch errors
// ---------------------------------------------------------------------------

/// Errors related to establishing a file watch.
#[derive(Debug)]
pub enum WatchError {
    /// The watched file has no parent directory to monitor.
    NoParent { path: PathBuf },

    /// The backend refused to monitor the parent directory
    /// (missing, unreadable, or out of watch handles).
    Setup {
        directory: PathBuf,
        source: notify::Error,
    },

    /// The backend itself could not be created.
    Backend { source: notify::Error },

    /// The observer thread could not be spawned.
    Spawn { source: io::Error },

    /// A relative path could not be made absolute.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoParent { path } => {
                write!(f, "'{}' has no parent directory to watch", path.display())
            }
            Self::Setup { directory, source } => {
                write!(
                    f,
                    "Impossible to watch directory '{}': {source}",
                    directory.display()
                )
            }
            Self::Backend { source } => {
                write!(f, "File-system event backend unavailable: {source}")
            }
            Self::Spawn { source } => {
                write!(f, "Could not start the file observer thread: {source}")
            }
            Self::Io { path, source } => {
                write!(f, "I/O error preparing watch on '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Setup { source, .. } => Some(source),
            Self::Backend { source } => Some(source),
            Self::Spawn { source } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::NoParent { .. } => None,
        }
    }
}

impl From<WatchError> for LecternError {
    fn from(e: WatchError) -> Self {
        Self::Watch(e)
    }
}

// ---------------------------------------------------------------------------
// Launcher errors
// ---------------------------------------------------------------------------

/// Errors related to opening files with the platform default handler.
#[derive(Debug)]
pub enum LauncherError {
    /// The opener process could not be spawned.
    Spawn {
        program: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

impl fmt::Display for LauncherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn {
                program,
                path,
                source,
            } => write!(
                f,
                "Failed to open '{}' with {program}: {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for LauncherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
        }
    }
}

impl From<LauncherError> for LecternError {
    fn from(e: LauncherError) -> Self {
        Self::Launcher(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {source}",
                    path.display()
                )
            }
            Self::Io { path, source } => {
                write!(f, "Could not read config file '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for LecternError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for Lectern results.
pub type Result<T> = std::result::Result<T, LecternError>;
