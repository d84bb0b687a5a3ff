// Lectern - platform/host.rs
//
// Host operating system detection. Detected once; everything downstream
// branches on the enum instead of scattering cfg! checks.

use std::fmt;

/// The operating system families the platform layer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    /// Windows (registry-based screensaver control).
    Windows,
    /// macOS (caffeinate-based display-sleep inhibition).
    MacOs,
    /// Linux, the BSDs and other X11 desktops.
    Posix,
    /// Anything else; platform features are disabled.
    Other,
}

impl HostOs {
    /// Detect the OS this binary was compiled for.
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(unix) {
            Self::Posix
        } else {
            Self::Other
        }
    }

    /// Short lowercase name used in log fields and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Posix => "posix",
            Self::Other => std::env::consts::OS,
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
