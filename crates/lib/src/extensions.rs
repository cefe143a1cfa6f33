//! Platform extensions known to the tool.
//!
//! Projects name the extensions they use; the registry says which of them
//! ship native runtime code, and which extra libraries and files that code needs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{BUILTIN_EXTENSION, NAMESPACELESS_RUNTIME_EXTENSION};
use crate::platform::TargetPlatform;

#[derive(Debug, Error)]
pub enum ExtensionError {
  #[error("failed to read extension registry {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse extension registry {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Native runtime code shipped by an extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeCapability {
  /// Additional libraries to link, by name (searched as `lib<name>.a` / `lib<name>.dll.a`).
  pub supplementary_lib_files: Vec<String>,
  /// Files copied next to the game for the given target.
  pub supplementary_runtime_files: Vec<(TargetPlatform, PathBuf)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformExtension {
  pub name: String,
  pub namespace: String,
  runtime: Option<RuntimeCapability>,
}

impl PlatformExtension {
  pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      namespace: namespace.into(),
      runtime: None,
    }
  }

  pub fn with_runtime(mut self, runtime: RuntimeCapability) -> Self {
    self.runtime = Some(runtime);
    self
  }

  /// The runtime capability, if the extension ships native code.
  pub fn runtime(&self) -> Option<&RuntimeCapability> {
    self.runtime.as_ref()
  }

  /// Whether the extension has its own runtime file (`.xgd` / `.xgdw`) to ship.
  pub fn ships_runtime_file(&self) -> bool {
    (!self.namespace.is_empty() || self.name == NAMESPACELESS_RUNTIME_EXTENSION) && self.name != BUILTIN_EXTENSION
  }

  /// File name of the extension's runtime file for `target`.
  pub fn runtime_file_name(&self, target: TargetPlatform) -> String {
    match target {
      TargetPlatform::Windows => format!("{}.xgdw", self.name),
      TargetPlatform::Linux | TargetPlatform::Mac => format!("{}.xgd", self.name),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
  extensions: BTreeMap<String, PlatformExtension>,
}

impl ExtensionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load a JSON array of extensions.
  pub fn load(path: &Path) -> Result<Self, ExtensionError> {
    let content = std::fs::read_to_string(path).map_err(|source| ExtensionError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let list: Vec<PlatformExtension> = serde_json::from_str(&content).map_err(|source| ExtensionError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    Ok(list.into_iter().collect())
  }

  /// Load the registry at `path` if it exists, else an empty one.
  pub fn load_or_default(path: &Path) -> Result<Self, ExtensionError> {
    if path.exists() {
      Self::load(path)
    } else {
      Ok(Self::new())
    }
  }

  pub fn register(&mut self, extension: PlatformExtension) {
    self.extensions.insert(extension.name.clone(), extension);
  }

  pub fn get(&self, name: &str) -> Option<&PlatformExtension> {
    self.extensions.get(name)
  }

  pub fn len(&self) -> usize {
    self.extensions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.extensions.is_empty()
  }
}

impl FromIterator<PlatformExtension> for ExtensionRegistry {
  fn from_iter<I: IntoIterator<Item = PlatformExtension>>(iter: I) -> Self {
    let mut registry = Self::new();
    for extension in iter {
      registry.register(extension);
    }
    registry
  }
}

/// Whether a library named `name` is present in `dir`, as a static or import library.
pub fn library_exists(dir: &Path, name: &str) -> bool {
  dir.join(format!("lib{}.a", name)).exists() || dir.join(format!("lib{}.dll.a", name)).exists()
}
