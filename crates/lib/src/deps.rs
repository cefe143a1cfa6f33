//! Dependency analysis between translation units.
//!
//! Scenes and external event sheets include other sheets through link events
//! and require native source files through code events. This module builds
//! that inclusion graph and answers, per unit, which other units it
//! transitively needs in the final link.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::project::Project;
use crate::project::events::{Event, visit_code_dependencies, visit_links};
use crate::unit::UnitId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
  /// A unit reachable from the analyzed one lies on an inclusion cycle.
  #[error("circular dependency detected for {unit} (cycle through {})", .cycle.join(", "))]
  CircularDependency { unit: UnitId, cycle: Vec<String> },

  #[error("unknown unit: {0}")]
  UnknownUnit(UnitId),
}

/// How a unit is included by another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inclusion {
  /// The link sits directly in the including sheet, not inside sub-events.
  pub top_level: bool,
}

/// Everything a unit transitively requires, by name. The unit itself is excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencySet {
  pub scenes: BTreeSet<String>,
  pub external_events: BTreeSet<String>,
  pub source_files: BTreeSet<String>,
  /// External sheets reached through at least one link nested in sub-events.
  pub nested_external_events: BTreeSet<String>,
}

impl DependencySet {
  fn insert(&mut self, unit: &UnitId, top_level: bool) {
    match unit {
      UnitId::Scene(name) => {
        self.scenes.insert(name.clone());
      }
      UnitId::ExternalEvents(name) => {
        self.external_events.insert(name.clone());
        if !top_level {
          self.nested_external_events.insert(name.clone());
        }
      }
      UnitId::SourceFile(name) => {
        self.source_files.insert(name.clone());
      }
    }
  }

  pub fn is_empty(&self) -> bool {
    self.scenes.is_empty() && self.external_events.is_empty() && self.source_files.is_empty()
  }
}

/// Inclusion graph over every unit of a project.
pub struct DependencyGraph {
  graph: DiGraph<UnitId, Inclusion>,
  nodes: HashMap<UnitId, NodeIndex>,
  /// Node -> members of the cycle it belongs to.
  cyclic: HashMap<NodeIndex, Vec<NodeIndex>>,
  scenes: Vec<String>,
}

impl DependencyGraph {
  /// Build the graph from the project's current state.
  pub fn from_project(project: &Project) -> Self {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for scene in &project.scenes {
      let id = UnitId::Scene(scene.name.clone());
      nodes.entry(id.clone()).or_insert_with(|| graph.add_node(id));
    }
    for external in &project.external_events {
      let id = UnitId::ExternalEvents(external.name.clone());
      nodes.entry(id.clone()).or_insert_with(|| graph.add_node(id));
    }
    for source in project.source_files.iter().filter(|s| s.is_native()) {
      let id = UnitId::SourceFile(source.name.clone());
      nodes.entry(id.clone()).or_insert_with(|| graph.add_node(id));
    }

    let sheets = project
      .scenes
      .iter()
      .map(|s| (UnitId::Scene(s.name.clone()), &s.events))
      .chain(
        project
          .external_events
          .iter()
          .map(|e| (UnitId::ExternalEvents(e.name.clone()), &e.events)),
      );

    for (id, events) in sheets {
      let from = nodes[&id];
      for (target, inclusion) in sheet_edges(project, &id, events) {
        if let Some(&to) = nodes.get(&target) {
          graph.add_edge(from, to, inclusion);
        }
      }
    }

    let mut cyclic = HashMap::new();
    for component in tarjan_scc(&graph) {
      let is_cycle = component.len() > 1 || graph.contains_edge(component[0], component[0]);
      if is_cycle {
        for &idx in &component {
          cyclic.insert(idx, component.clone());
        }
      }
    }

    debug!(
      units = graph.node_count(),
      inclusions = graph.edge_count(),
      cyclic_units = cyclic.len(),
      "built dependency graph"
    );

    Self {
      graph,
      nodes,
      cyclic,
      scenes: project.scenes.iter().map(|s| s.name.clone()).collect(),
    }
  }

  /// Compute the transitive dependencies of `unit`.
  ///
  /// # Errors
  ///
  /// Returns `CircularDependency` if `unit` or anything it reaches lies on a cycle.
  pub fn analyze(&self, unit: &UnitId) -> Result<DependencySet, DependencyError> {
    let Some(&start) = self.nodes.get(unit) else {
      return Err(DependencyError::UnknownUnit(unit.clone()));
    };

    let mut set = DependencySet::default();
    let mut seen: HashSet<(NodeIndex, bool)> = HashSet::new();
    let mut stack = vec![(start, true)];

    while let Some((idx, top_level)) = stack.pop() {
      if !seen.insert((idx, top_level)) {
        continue;
      }

      if let Some(cycle) = self.cyclic.get(&idx) {
        let mut names: Vec<String> = cycle.iter().map(|&n| self.graph[n].to_string()).collect();
        names.sort();
        return Err(DependencyError::CircularDependency {
          unit: unit.clone(),
          cycle: names,
        });
      }

      if idx != start {
        set.insert(&self.graph[idx], top_level);
      }

      for edge in self.graph.edges(idx) {
        stack.push((edge.target(), top_level && edge.weight().top_level));
      }
    }

    Ok(set)
  }

  /// The scene an external sheet can be compiled for on its own.
  ///
  /// A sheet gets its own object file only when exactly one scene includes it,
  /// and only through top-level links. Otherwise its events are inlined into
  /// every scene that includes them.
  pub fn compilable_for_scene(&self, external_events: &str) -> Option<String> {
    let mut found = None;

    for scene in &self.scenes {
      let Ok(deps) = self.analyze(&UnitId::Scene(scene.clone())) else {
        continue;
      };
      if deps.external_events.contains(external_events) && !deps.nested_external_events.contains(external_events) {
        if found.is_some() {
          return None;
        }
        found = Some(scene.clone());
      }
    }

    found
  }
}

/// Resolve the direct inclusions of one sheet.
fn sheet_edges(project: &Project, sheet: &UnitId, events: &[Event]) -> Vec<(UnitId, Inclusion)> {
  let mut edges = Vec::new();

  visit_links(events, &mut |target, top_level| {
    let resolved = if project.external_events_named(target).is_some() {
      Some(UnitId::ExternalEvents(target.to_string()))
    } else if project.scene(target).is_some() {
      Some(UnitId::Scene(target.to_string()))
    } else {
      None
    };

    match resolved {
      Some(id) => edges.push((id, Inclusion { top_level })),
      None => warn!(sheet = %sheet, target = %target, "link to unknown events ignored"),
    }
  });

  visit_code_dependencies(events, &mut |name| {
    if project.native_source_file(name).is_some() {
      edges.push((UnitId::SourceFile(name.to_string()), Inclusion { top_level: true }));
    } else {
      debug!(sheet = %sheet, source_file = %name, "dependency on non-native or unknown source file ignored");
    }
  });

  edges
}

/// Analyze one unit of a project.
pub fn analyze(project: &Project, unit: &UnitId) -> Result<DependencySet, DependencyError> {
  DependencyGraph::from_project(project).analyze(unit)
}
