use std::path::{Path, PathBuf};

use tracing::warn;

use crate::consts::{APP_NAME, WORKING_DIR_NAME};

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Returns the directory for configuration files for the application
#[cfg(windows)]
pub fn config_dir() -> Option<PathBuf> {
  std::env::var_os("APPDATA").map(|appdata| PathBuf::from(appdata).join(APP_NAME))
}

/// Returns the directory for configuration files for the application
#[cfg(not(windows))]
pub fn config_dir() -> Option<PathBuf> {
  std::env::var_os("XDG_CONFIG_HOME")
    .map(PathBuf::from)
    .or_else(|| home_dir().map(|home| home.join(".config")))
    .map(|dir| dir.join(APP_NAME))
}

/// Installation directory holding the runtime files (`CppPlatform/...`, `7zS.sfx`...).
///
/// `GAMEPACK_HOME` overrides the default, which is the current directory.
pub fn base_dir() -> PathBuf {
  std::env::var_os("GAMEPACK_HOME")
    .map(PathBuf::from)
    .or_else(|| std::env::current_dir().ok())
    .unwrap_or_default()
}

/// Whether a file can be created inside `dir`.
pub fn is_dir_writable(dir: &Path) -> bool {
  dir.is_dir() && tempfile::Builder::new().prefix(".probe").tempfile_in(dir).is_ok()
}

/// Returns the build working directory.
///
/// Uses `forced` when set. Otherwise the first writable of the system temp
/// directory, the current directory and the home directory is used.
pub fn working_dir(forced: Option<&Path>) -> PathBuf {
  if let Some(dir) = forced {
    return dir.join(WORKING_DIR_NAME);
  }

  let candidates = [
    Some(std::env::temp_dir()),
    std::env::current_dir().ok(),
    home_dir(),
  ];

  let root = candidates
    .iter()
    .flatten()
    .find(|dir| is_dir_writable(dir))
    .cloned()
    .unwrap_or_else(|| {
      warn!("no writable temporary directory found, compilation may fail");
      std::env::temp_dir()
    });

  root.join(WORKING_DIR_NAME)
}
