//! Tool configuration.
//!
//! Describes the installation the pipeline runs against: where the runtime
//! launchers and extension libraries live, where generated code and objects
//! are written, and how the native compiler is invoked. Loaded from an
//! optional TOML file, then overridden by environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{DYNEXT_FILE, SFX_CONFIG, SFX_STUB};
use crate::platform::paths;

/// Interval at which a waiting build hands control back to its host.
pub const DEFAULT_YIELD_INTERVAL: Duration = Duration::from_millis(150);

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

/// How the native compiler is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
  /// Compiler driver used for both compiling and linking.
  pub program: String,
  pub include_dirs: Vec<PathBuf>,
  /// Extra flags passed when compiling.
  pub compile_flags: Vec<String>,
  /// Extra flags passed when linking.
  pub link_flags: Vec<String>,
}

impl Default for CompilerConfig {
  fn default() -> Self {
    Self {
      program: "c++".to_string(),
      include_dirs: Vec::new(),
      compile_flags: vec!["-fPIC".to_string()],
      link_flags: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
  /// Installation directory (holds `CppPlatform/`, the self-extracting stub...).
  pub base_dir: PathBuf,
  /// Directory generated sources, objects and the compiler log are written to.
  /// Defaults to `<base_dir>/CppPlatform/Generated`.
  pub generated_dir: Option<PathBuf>,
  /// Forced root for the working directory, instead of the system temp directory.
  pub temp_dir: Option<PathBuf>,
  pub compiler: CompilerConfig,
  /// Abort a compiler job that runs longer than this many seconds.
  pub job_timeout_secs: Option<u64>,
  pub yield_interval_ms: u64,
}

impl Default for ToolConfig {
  fn default() -> Self {
    Self {
      base_dir: PathBuf::new(),
      generated_dir: None,
      temp_dir: None,
      compiler: CompilerConfig::default(),
      job_timeout_secs: None,
      yield_interval_ms: DEFAULT_YIELD_INTERVAL.as_millis() as u64,
    }
  }
}

impl ToolConfig {
  /// A configuration rooted at `base_dir` with every other setting at its default.
  pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
    Self {
      base_dir: base_dir.into(),
      ..Default::default()
    }
  }

  /// Load the configuration.
  ///
  /// Reads `path` when given, else `<config dir>/config.toml` if it exists,
  /// then applies `GAMEPACK_HOME`, `GAMEPACK_TEMP_DIR` and `GAMEPACK_COMPILER`.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let file = match path {
      Some(p) => Some(p.to_path_buf()),
      None => paths::config_dir().map(|d| d.join("config.toml")).filter(|p| p.exists()),
    };

    let mut config = match &file {
      Some(p) => Self::from_file(p)?,
      None => Self::default(),
    };

    if config.base_dir.as_os_str().is_empty() || std::env::var_os("GAMEPACK_HOME").is_some() {
      config.base_dir = paths::base_dir();
    }
    if let Some(dir) = std::env::var_os("GAMEPACK_TEMP_DIR") {
      config.temp_dir = Some(PathBuf::from(dir));
    }
    if let Ok(program) = std::env::var("GAMEPACK_COMPILER") {
      config.compiler.program = program;
    }

    debug!(config_file = ?file, base_dir = ?config.base_dir, "loaded tool configuration");
    Ok(config)
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn generated_dir(&self) -> PathBuf {
    self
      .generated_dir
      .clone()
      .unwrap_or_else(|| self.platform_dir().join("Generated"))
  }

  pub fn platform_dir(&self) -> PathBuf {
    self.base_dir.join("CppPlatform")
  }

  /// Directory holding extension libraries and their runtime files.
  pub fn extensions_dir(&self) -> PathBuf {
    self.platform_dir().join("Extensions").join("Runtime")
  }

  /// JSON registry describing the installed extensions.
  pub fn extensions_file(&self) -> PathBuf {
    self.platform_dir().join("Extensions").join("extensions.json")
  }

  /// Windows and Linux launchers and runtime libraries.
  pub fn runtime_dir(&self) -> PathBuf {
    self.platform_dir().join("Runtime")
  }

  pub fn mac_runtime_dir(&self) -> PathBuf {
    self.platform_dir().join("MacRuntime")
  }

  pub fn sfx_stub(&self) -> PathBuf {
    self.base_dir.join(SFX_STUB)
  }

  pub fn sfx_config(&self) -> PathBuf {
    self.base_dir.join(SFX_CONFIG)
  }

  pub fn dynext_file(&self) -> PathBuf {
    self.base_dir.join(DYNEXT_FILE)
  }

  pub fn working_dir(&self) -> PathBuf {
    paths::working_dir(self.temp_dir.as_deref())
  }

  pub fn job_timeout(&self) -> Option<Duration> {
    self.job_timeout_secs.map(Duration::from_secs)
  }

  pub fn yield_interval(&self) -> Duration {
    Duration::from_millis(self.yield_interval_ms.max(1))
  }
}
