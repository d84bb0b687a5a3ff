// Lectern - platform/launcher.rs
//
// Open a file with whatever the desktop considers its default handler.

use crate::platform::host::HostOs;
use crate::util::error::LauncherError;
use std::path::Path;
use std::process::{Command, Stdio};

/// The program that hands a path to the default handler on `host`.
///
/// - **Windows**: `explorer <path>` (file associations apply).
/// - **macOS**: `open <path>`.
/// - **Everything else**: `xdg-open <path>`.
pub fn opener_for(host: HostOs) -> &'static str {
    match host {
        HostOs::Windows => "explorer",
        HostOs::MacOs => "open",
        HostOs::Posix | HostOs::Other => "xdg-open",
    }
}

/// Open `path` with the platform default handler.
///
/// The subprocess is spawned detached and never waited on, so the caller is
/// not blocked while the handler starts. Launch failures are logged at WARN
/// and returned so the UI can show them.
pub fn open_with_default(path: &Path) -> Result<(), LauncherError> {
    let program = opener_for(HostOs::detect());
    match Command::new(program)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => {
            tracing::debug!(
                path = %path.display(),
                program,
                pid = child.id(),
                "Opened file with default handler"
            );
            Ok(())
        }
        Err(source) => {
            tracing::warn!(
                path = %path.display(),
                program,
                error = %source,
                "Failed to open file with default handler"
            );
            Err(LauncherError::Spawn {
                program,
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opener_per_platform() {
        assert_eq!(opener_for(HostOs::Windows), "explorer");
        assert_eq!(opener_for(HostOs::MacOs), "open");
        assert_eq!(opener_for(HostOs::Posix), "xdg-open");
        assert_eq!(opener_for(HostOs::Other), "xdg-open");
    }
}
