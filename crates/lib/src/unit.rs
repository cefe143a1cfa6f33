//! Translation units and their on-disk naming.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{GENERATED_SOURCE_SUFFIX, OBJECT_FILE_SUFFIX};
use crate::project::Project;

/// Identifies something that compiles to one object file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum UnitId {
  Scene(String),
  ExternalEvents(String),
  SourceFile(String),
}

impl UnitId {
  pub fn name(&self) -> &str {
    match self {
      UnitId::Scene(name) | UnitId::ExternalEvents(name) | UnitId::SourceFile(name) => name,
    }
  }

  fn tag(&self) -> &'static str {
    match self {
      UnitId::Scene(_) => "Scene",
      UnitId::ExternalEvents(_) => "Ext",
      UnitId::SourceFile(_) => "Src",
    }
  }

  /// File stem shared by the unit's generated source and object file.
  pub fn file_stem(&self) -> String {
    format!("GD{}{}", self.tag(), mangle_name(self.name()))
  }
}

impl fmt::Display for UnitId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      UnitId::Scene(name) => write!(f, "scene '{}'", name),
      UnitId::ExternalEvents(name) => write!(f, "external events '{}'", name),
      UnitId::SourceFile(name) => write!(f, "source file '{}'", name),
    }
  }
}

/// Make a name usable in file names and C++ identifiers.
///
/// ASCII alphanumerics are kept; every other character becomes `_<codepoint>_`.
pub fn mangle_name(name: &str) -> String {
  let mut mangled = String::with_capacity(name.len());
  for c in name.chars() {
    if c.is_ascii_alphanumeric() {
      mangled.push(c);
    } else {
      mangled.push_str(&format!("_{}_", c as u32));
    }
  }
  mangled
}

/// One compilable source for a single build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
  pub id: UnitId,
  /// File handed to the compiler: generated code for event sheets, the file itself for source files.
  pub source_path: PathBuf,
  pub object_path: PathBuf,
}

impl TranslationUnit {
  /// Unit for generated event code (scene or external sheet).
  pub fn generated(id: UnitId, generated_dir: &Path) -> Self {
    let stem = id.file_stem();
    Self {
      source_path: generated_dir.join(format!("{}{}", stem, GENERATED_SOURCE_SUFFIX)),
      object_path: generated_dir.join(format!("{}{}", stem, OBJECT_FILE_SUFFIX)),
      id,
    }
  }

  /// Unit for a native source file of the project. Relative paths resolve against the project directory.
  pub fn source_file(name: &str, file: &str, project: &Project, generated_dir: &Path) -> Self {
    let id = UnitId::SourceFile(name.to_string());
    let file = Path::new(file);
    let source_path = if file.is_absolute() {
      file.to_path_buf()
    } else {
      project.base_directory().join(file)
    };
    Self {
      object_path: generated_dir.join(format!("{}{}", id.file_stem(), OBJECT_FILE_SUFFIX)),
      source_path,
      id,
    }
  }

  /// Every unit the project declares: scenes, then external sheets, then native source files.
  pub fn all(project: &Project, generated_dir: &Path) -> Vec<Self> {
    let scenes = project
      .scenes
      .iter()
      .map(|s| Self::generated(UnitId::Scene(s.name.clone()), generated_dir));
    let externals = project
      .external_events
      .iter()
      .map(|e| Self::generated(UnitId::ExternalEvents(e.name.clone()), generated_dir));
    let sources = project
      .source_files
      .iter()
      .filter(|f| f.is_native())
      .map(|f| Self::source_file(&f.name, &f.file, project, generated_dir));
    scenes.chain(externals).chain(sources).collect()
  }
}
