//! Platform persistent-data directory.
//!
//! The default settings root is the per-user application data folder:
//! - Windows:  `%APPDATA%\SettingsStore`
//! - Linux:    `$XDG_DATA_HOME/settings-store` or `~/.local/share/settings-store`
//! - macOS:    `~/Library/Application Support/SettingsStore`
//!
//! Applications normally pass their own root (for example a sub-folder named
//! after the product); [`default_root`] is what the CLI falls back to.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for data-directory resolution.
#[derive(Debug, Error)]
pub enum PathError {
    /// The platform data directory could not be determined.
    #[error("could not determine platform data directory")]
    NoPlatformDataDir,
}

/// Resolves the platform's per-user data directory for this library.
///
/// # Errors
///
/// Returns [`PathError::NoPlatformDataDir`] if the relevant environment
/// variable is unset or the platform is unsupported.
pub fn data_dir() -> Result<PathBuf, PathError> {
    platform_data_dir().ok_or(PathError::NoPlatformDataDir)
}

/// The settings root used when none is configured.
///
/// # Errors
///
/// Same as [`data_dir`].
pub fn default_root() -> Result<PathBuf, PathError> {
    data_dir()
}

fn platform_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("SettingsStore"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_DATA_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .map(|h| PathBuf::from(h).join(".local").join("share"))
            })?;
        Some(base.join("settings-store"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("SettingsStore")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}
