//! Implementation of the `gamepack deps` command.

use std::path::Path;

use anyhow::{Context, Result, bail};

use gamepack_lib::unit::UnitId;
use gamepack_lib::{DependencyGraph, DependencySet, Project};

use crate::output::{Status, print_item, print_json, print_stat, status};

pub fn cmd_deps(project_file: &Path, scene: Option<&str>, json: bool) -> Result<()> {
  let project =
    Project::load(project_file).with_context(|| format!("Failed to load project {}", project_file.display()))?;
  let graph = DependencyGraph::from_project(&project);

  let scenes: Vec<&str> = match scene {
    Some(name) => {
      if project.scene(name).is_none() {
        bail!("No scene named '{}'", name);
      }
      vec![name]
    }
    None => project.scenes.iter().map(|s| s.name.as_str()).collect(),
  };

  let mut analyzed = Vec::with_capacity(scenes.len());
  for name in scenes {
    let deps = graph
      .analyze(&UnitId::Scene(name.to_string()))
      .with_context(|| format!("Failed to analyze scene '{}'", name))?;
    analyzed.push((name, deps));
  }

  if json {
    let items: Vec<_> = analyzed
      .iter()
      .map(|(name, deps)| {
        let own_sheets: Vec<&String> = deps
          .external_events
          .iter()
          .filter(|sheet| graph.compilable_for_scene(sheet).as_deref() == Some(*name))
          .collect();
        serde_json::json!({ "scene": name, "dependencies": deps, "compiled_sheets": own_sheets })
      })
      .collect();
    return print_json(&items);
  }

  for (name, deps) in &analyzed {
    print_scene(&graph, name, deps);
  }
  Ok(())
}

fn print_scene(graph: &DependencyGraph, name: &str, deps: &DependencySet) {
  status(Status::Info, &format!("Scene '{}'", name));
  if deps.is_empty() {
    println!("  (no dependencies)");
    return;
  }

  for scene in &deps.scenes {
    print_item(&format!("scene {}", scene));
  }
  for sheet in &deps.external_events {
    let how = if graph.compilable_for_scene(sheet).as_deref() == Some(name) {
      "own object"
    } else {
      "inlined"
    };
    print_item(&format!("external events {} ({})", sheet, how));
  }
  for source in &deps.source_files {
    print_item(&format!("source file {}", source));
  }
  print_stat("Units", &(deps.scenes.len() + deps.external_events.len() + deps.source_files.len()).to_string());
}
