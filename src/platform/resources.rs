// Lectern - platform/resources.rs
//
// Resource resolution: maps a relative resource name (stylesheet, icon, UI
// definition, locale tree) to an absolute path under `<base>/share/`.
//
// Layouts:
//   - Override:  an explicit directory from config or LECTERN_RESOURCE_DIR.
//   - Frozen:    a self-contained bundle with `share/` next to the executable.
//   - Installed: the package tree the binary was built from.
//
// Lookups never retry. A missing resource surfaces as
// `ResourceError::NotFound` and the caller decides what to do.

use crate::platform::host::HostOs;
use crate::util::constants;
use crate::util::error::ResourceError;
use glob::{MatchOptions, Pattern};
use std::fmt;
use std::path::{Path, PathBuf};

// =============================================================================
// Layout detection
// =============================================================================

/// How the resource base directory was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMode {
    /// Explicitly configured directory.
    Override,
    /// Bundled executable; resources sit next to the binary.
    Frozen,
    /// Installed package tree.
    Installed,
}

impl fmt::Display for ResourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Override => "override",
            Self::Frozen => "frozen",
            Self::Installed => "installed",
        })
    }
}

/// A decoded application icon.
#[derive(Clone, PartialEq, Eq)]
pub struct Icon {
    /// File name inside `share/pixmaps`.
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 pixels, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

impl fmt::Debug for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Icon")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// Resolves bundled resources for one layout.
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    mode: ResourceMode,
    base: PathBuf,
    host: HostOs,
}

impl ResourceLocator {
    /// Pick the resource layout for this process.
    ///
    /// Priority: `override_dir` > LECTERN_RESOURCE_DIR > frozen bundle next to
    /// the executable > installed package tree.
    pub fn detect(override_dir: Option<&Path>) -> Self {
        if let Some(dir) = override_dir {
            return Self::with_override(dir);
        }

        if let Some(dir) = std::env::var_os(constants::RESOURCE_DIR_ENV) {
            if !dir.is_empty() {
                return Self::with_override(Path::new(&dir));
            }
        }

        match std::env::current_exe() {
            Ok(exe) => {
                if let Some(exe_dir) = exe.parent() {
                    if exe_dir.join(constants::SHARE_DIR_NAME).is_dir() {
                        return Self::frozen(exe_dir);
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Cannot locate executable; skipping frozen layout");
            }
        }

        Self::installed(Path::new(env!("CARGO_MANIFEST_DIR")))
    }

    /// Layout rooted at an explicitly configured directory.
    pub fn with_override(dir: &Path) -> Self {
        Self::new(ResourceMode::Override, dir)
    }

    /// Layout for a bundled executable living in `exe_dir`.
    pub fn frozen(exe_dir: &Path) -> Self {
        Self::new(ResourceMode::Frozen, exe_dir)
    }

    /// Layout for an installed package rooted at `package_dir`.
    pub fn installed(package_dir: &Path) -> Self {
        Self::new(ResourceMode::Installed, package_dir)
    }

    fn new(mode: ResourceMode, base: &Path) -> Self {
        let locator = Self {
            mode,
            base: base.to_path_buf(),
            host: HostOs::detect(),
        };
        tracing::debug!(
            mode = %locator.mode,
            base = %locator.base.display(),
            "Resource layout selected"
        );
        locator
    }

    pub fn mode(&self) -> ResourceMode {
        self.mode
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    // -------------------------------------------------------------------------
    // Path resolution
    // -------------------------------------------------------------------------

    /// Resolve `parts` (relative to `share/`) to an existing absolute path.
    pub fn resource_path(&self, parts: &[&str]) -> Result<PathBuf, ResourceError> {
        let mut path = self.base.join(constants::SHARE_DIR_NAME);
        for part in parts {
            path.push(part);
        }
        if path.exists() {
            Ok(path)
        } else {
            Err(ResourceError::NotFound { path })
        }
    }

    /// Directory holding compiled translations.
    pub fn locale_dir(&self) -> Result<PathBuf, ResourceError> {
        self.resource_path(&[constants::LOCALE_DIR_NAME])
    }

    /// Stylesheet for the host OS.
    pub fn css_path(&self) -> Result<PathBuf, ResourceError> {
        self.css_path_for(self.host)
    }

    /// Stylesheet for `host`: macOS gets its own, every other OS the default.
    pub fn css_path_for(&self, host: HostOs) -> Result<PathBuf, ResourceError> {
        let file = match host {
            HostOs::MacOs => constants::MACOS_CSS_FILE,
            _ => constants::DEFAULT_CSS_FILE,
        };
        self.resource_path(&[constants::CSS_DIR_NAME, file])
    }

    /// Read the host stylesheet into memory.
    pub fn read_css(&self) -> Result<String, ResourceError> {
        let path = self.css_path()?;
        std::fs::read_to_string(&path).map_err(|source| ResourceError::Io { path, source })
    }

    /// Path of the icon file `name` in `share/pixmaps`.
    pub fn icon_path(&self, name: &str) -> Result<PathBuf, ResourceError> {
        self.resource_path(&[constants::PIXMAPS_DIR_NAME, name])
    }

    /// Path of the UI definition `name`; the `.glade` extension is appended.
    pub fn ui_definition_path(&self, name: &str) -> Result<PathBuf, ResourceError> {
        let file = format!("{name}.{}", constants::UI_DEFINITION_EXTENSION);
        self.resource_path(&[constants::XML_DIR_NAME, &file])
    }

    // -------------------------------------------------------------------------
    // Icons
    // -------------------------------------------------------------------------

    /// File names of the application icons, sorted.
    ///
    /// Matches `lectern-*.png`; the comparison ignores case so `.PNG` files
    /// produced by some image tools are picked up too.
    pub fn list_icons(&self) -> Result<Vec<String>, ResourceError> {
        let dir = self.resource_path(&[constants::PIXMAPS_DIR_NAME])?;
        let entries = std::fs::read_dir(&dir).map_err(|source| ResourceError::Io {
            path: dir.clone(),
            source,
        })?;

        let pattern = icon_pattern();
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| {
                pattern
                    .as_ref()
                    .is_some_and(|p| p.matches_with(name, options))
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Decode a single icon from `share/pixmaps`.
    pub fn load_icon(&self, name: &str) -> Result<Icon, ResourceError> {
        let path = self.icon_path(name)?;
        let bytes = std::fs::read(&path).map_err(|source| ResourceError::Io {
            path: path.clone(),
            source,
        })?;
        let image = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)
            .map_err(|source| ResourceError::Decode {
                path: path.clone(),
                source,
            })?;
        let rgba = image.into_rgba8();
        Ok(Icon {
            name: name.to_string(),
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }

    /// Decode every application icon.
    ///
    /// A broken icon is logged and skipped; the others still load. Fails only
    /// when the pixmaps directory itself cannot be listed.
    pub fn load_icons(&self) -> Result<Vec<Icon>, ResourceError> {
        let names = self.list_icons()?;
        let mut icons = Vec::with_capacity(names.len());
        for name in &names {
            match self.load_icon(name) {
                Ok(icon) => icons.push(icon),
                Err(e) => tracing::warn!(icon = %name, error = %e, "Error loading icon"),
            }
        }
        tracing::debug!(loaded = icons.len(), listed = names.len(), "Icons loaded");
        Ok(icons)
    }
}

fn icon_pattern() -> Option<Pattern> {
    Pattern::new(constants::ICON_FILE_PATTERN).ok()
}
