//! Project object model.
//!
//! A project is the unit a build consumes: scenes and external event sheets
//! (each compiling to its own translation unit), native source files,
//! resources, objects and the extensions the game uses. Only the shape needed
//! to drive the pipeline is modelled here.
//!
//! # Submodules
//!
//! - [`events`] - Event trees and their traversal helpers
//! - [`resources`] - Resource remapping into the working directory
//! - [`strip`] - Removal of editor-only data before shipping

pub mod events;
pub mod resources;
pub mod strip;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{DEFAULT_LINUX_EXECUTABLE, DEFAULT_MAC_EXECUTABLE, DEFAULT_WIN_EXECUTABLE, NATIVE_LANGUAGE};

pub use events::{Argument, Event, Instruction};

/// Editor-only settings attached to a project or scene (window layout, grid, zoom...).
pub type EditorMetadata = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("failed to read project {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse project {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize project: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("failed to write project {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// A whole game project.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
  pub name: String,
  /// Path of the file the project was loaded from. Relative resource paths resolve against its directory.
  #[serde(skip)]
  pub project_file: PathBuf,
  pub scenes: Vec<Scene>,
  pub external_events: Vec<ExternalEvents>,
  pub source_files: Vec<SourceFile>,
  pub resources: Vec<Resource>,
  /// Global objects, shared by every scene.
  pub objects: Vec<Object>,
  pub used_extensions: Vec<String>,
  pub win_executable_filename: String,
  pub linux_executable_filename: String,
  pub mac_executable_filename: String,
  pub use_external_source_files: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub editor: Option<EditorMetadata>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
  pub name: String,
  pub objects: Vec<Object>,
  pub events: Vec<Event>,
  pub profiler_enabled: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub editor: Option<EditorMetadata>,
}

/// An event sheet that is not tied to a single scene and can be included by links.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalEvents {
  pub name: String,
  /// Scene the sheet was written for, as chosen in the editor. Informational only.
  pub associated_scene: String,
  pub events: Vec<Event>,
}

/// A native source file shipped with the project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceFile {
  pub name: String,
  pub file: String,
  pub language: String,
}

impl SourceFile {
  /// Whether the file takes part in native compilation and linking.
  pub fn is_native(&self) -> bool {
    self.language == NATIVE_LANGUAGE
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resource {
  pub name: String,
  pub kind: String,
  pub file: String,
  /// Resources such as generated fonts carry no file.
  pub use_file: bool,
}

impl Default for Resource {
  fn default() -> Self {
    Self {
      name: String::new(),
      kind: String::new(),
      file: String::new(),
      use_file: true,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Object {
  pub name: String,
  pub kind: String,
  /// Files the object needs at runtime (textures, sounds...).
  pub resources: Vec<String>,
}

impl Project {
  /// Load a project from a JSON file.
  pub fn load(path: &Path) -> Result<Self, ProjectError> {
    let content = std::fs::read_to_string(path).map_err(|source| ProjectError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut project: Project = serde_json::from_str(&content).map_err(|source| ProjectError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    project.project_file = path.to_path_buf();
    Ok(project)
  }

  /// Serialize the project as JSON to `path`.
  pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
    let json = serde_json::to_string_pretty(self)?;
    std::fs::write(path, json).map_err(|source| ProjectError::Write {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Directory relative resource and source paths resolve against.
  pub fn base_directory(&self) -> PathBuf {
    self
      .project_file
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default()
  }

  pub fn scene(&self, name: &str) -> Option<&Scene> {
    self.scenes.iter().find(|s| s.name == name)
  }

  pub fn external_events_named(&self, name: &str) -> Option<&ExternalEvents> {
    self.external_events.iter().find(|e| e.name == name)
  }

  /// Find a source file by name, restricted to files in the native language.
  pub fn native_source_file(&self, name: &str) -> Option<&SourceFile> {
    self.source_files.iter().find(|f| f.name == name && f.is_native())
  }

  pub fn win_executable_name(&self) -> String {
    if self.win_executable_filename.is_empty() {
      DEFAULT_WIN_EXECUTABLE.to_string()
    } else {
      format!("{}.exe", self.win_executable_filename)
    }
  }

  pub fn linux_executable_name(&self) -> String {
    if self.linux_executable_filename.is_empty() {
      DEFAULT_LINUX_EXECUTABLE.to_string()
    } else {
      self.linux_executable_filename.clone()
    }
  }

  pub fn mac_executable_name(&self) -> String {
    if self.mac_executable_filename.is_empty() {
      DEFAULT_MAC_EXECUTABLE.to_string()
    } else {
      self.mac_executable_filename.clone()
    }
  }
}
