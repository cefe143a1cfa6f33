//! Removal of editor-only data.
//!
//! Events are compiled into the shared library, so the shipped descriptor
//! keeps neither scene events nor external event sheets.

use super::Project;

/// Strip the project in place, leaving only what the runtime needs.
pub fn strip_project(project: &mut Project) {
  project.editor = None;
  project.external_events.clear();

  for scene in project.scenes.iter_mut() {
    scene.events.clear();
    scene.editor = None;
    scene.profiler_enabled = false;
  }
}
