//! Resource remapping.
//!
//! Every file a project references is given a new, flat name inside the build
//! working directory. The working copy of the project is rewritten to use the
//! new names; the files themselves are only copied later, by the pipeline.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::Project;
use super::events::visit_file_arguments_mut;

/// Maps original resource paths to their names inside the working directory.
#[derive(Debug, Clone, Default)]
pub struct ResourceMap {
  /// Absolute original path -> file name in the working directory.
  entries: BTreeMap<PathBuf, String>,
}

impl ResourceMap {
  /// Entries in path order.
  pub fn iter(&self) -> impl Iterator<Item = (&Path, &str)> {
    self.entries.iter().map(|(k, v)| (k.as_path(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// New name assigned to the original path, if it was exposed.
  pub fn new_name(&self, original: &Path) -> Option<&str> {
    self.entries.get(original).map(String::as_str)
  }
}

/// Assigns working-directory names to resources, deduplicating by original path.
#[derive(Debug)]
pub struct ResourceMerger {
  base_directory: PathBuf,
  map: ResourceMap,
  used_names: HashSet<String>,
}

impl ResourceMerger {
  /// Create a merger resolving relative paths against `base_directory`.
  pub fn new(base_directory: impl Into<PathBuf>) -> Self {
    Self {
      base_directory: base_directory.into(),
      map: ResourceMap::default(),
      used_names: HashSet::new(),
    }
  }

  /// Register `path` and rewrite it to its new name. Empty paths are left untouched.
  pub fn expose(&mut self, path: &mut String) {
    if path.is_empty() {
      return;
    }

    let original = self.resolve(path);
    let new_name = match self.map.entries.get(&original) {
      Some(name) => name.clone(),
      None => {
        let name = self.unique_name(&original);
        debug!(original = ?original, new_name = %name, "resource exposed");
        self.used_names.insert(name.clone());
        self.map.entries.insert(original, name.clone());
        name
      }
    };

    *path = new_name;
  }

  fn resolve(&self, path: &str) -> PathBuf {
    let path = Path::new(path);
    let joined = if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.base_directory.join(path)
    };
    dunce::canonicalize(&joined).unwrap_or(joined)
  }

  fn unique_name(&self, original: &Path) -> String {
    let file_name = original
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_else(|| "resource".to_string());
    if !self.used_names.contains(&file_name) {
      return file_name;
    }

    let stem = original
      .file_stem()
      .map(|s| s.to_string_lossy().to_string())
      .unwrap_or_else(|| "resource".to_string());
    let extension = original.extension().map(|e| e.to_string_lossy().to_string());

    (2..)
      .map(|n| match &extension {
        Some(ext) => format!("{}{}.{}", stem, n, ext),
        None => format!("{}{}", stem, n),
      })
      .find(|candidate| !self.used_names.contains(candidate))
      .unwrap_or(file_name)
  }

  pub fn into_map(self) -> ResourceMap {
    self.map
  }
}

/// Expose every resource reachable from the project and rewrite its paths.
///
/// Walks standalone resources, scene objects, file arguments in every scene
/// and external event sheet, and global objects, in that order.
pub fn expose_project_resources(project: &mut Project, merger: &mut ResourceMerger, mut on_resource: impl FnMut(&str)) {
  for resource in project.resources.iter_mut() {
    on_resource(&resource.name);
    if resource.use_file {
      merger.expose(&mut resource.file);
    }
  }

  for scene in project.scenes.iter_mut() {
    for object in scene.objects.iter_mut() {
      object.resources.iter_mut().for_each(|file| merger.expose(file));
    }
    visit_file_arguments_mut(&mut scene.events, &mut |file| merger.expose(file));
  }

  for external in project.external_events.iter_mut() {
    visit_file_arguments_mut(&mut external.events, &mut |file| merger.expose(file));
  }

  for object in project.objects.iter_mut() {
    object.resources.iter_mut().for_each(|file| merger.expose(file));
  }
}
