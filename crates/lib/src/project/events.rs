//! Event trees.

use serde::{Deserialize, Serialize};

/// One node of an event sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
  /// Conditions/actions run by the runtime.
  Standard {
    #[serde(default)]
    instructions: Vec<Instruction>,
    #[serde(default)]
    sub_events: Vec<Event>,
  },
  /// Include the events of an external sheet (or of another scene) at this position.
  Link { target: String },
  /// Inline native code, requiring the listed source files to be linked.
  Code {
    #[serde(default)]
    code: String,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    sub_events: Vec<Event>,
  },
  Comment {
    #[serde(default)]
    text: String,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Instruction {
  pub name: String,
  pub args: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Argument {
  Value(String),
  /// A path to a resource file, rewritten when resources are remapped.
  File(String),
}

impl Event {
  fn sub_events(&self) -> &[Event] {
    match self {
      Event::Standard { sub_events, .. } | Event::Code { sub_events, .. } => sub_events.as_slice(),
      Event::Link { .. } | Event::Comment { .. } => &[],
    }
  }

  fn sub_events_mut(&mut self) -> Option<&mut Vec<Event>> {
    match self {
      Event::Standard { sub_events, .. } | Event::Code { sub_events, .. } => Some(sub_events),
      Event::Link { .. } | Event::Comment { .. } => None,
    }
  }
}

/// Call `f(target, top_level)` for every link in the tree.
///
/// `top_level` is true only for links that are direct children of the sheet.
pub fn visit_links(events: &[Event], f: &mut impl FnMut(&str, bool)) {
  visit_links_at(events, true, f);
}

fn visit_links_at(events: &[Event], top_level: bool, f: &mut impl FnMut(&str, bool)) {
  for event in events {
    if let Event::Link { target } = event {
      f(target, top_level);
    }
    visit_links_at(event.sub_events(), false, f);
  }
}

/// Call `f(source_file_name)` for every dependency declared by code events.
pub fn visit_code_dependencies(events: &[Event], f: &mut impl FnMut(&str)) {
  for event in events {
    if let Event::Code { dependencies, .. } = event {
      for dependency in dependencies {
        f(dependency);
      }
    }
    visit_code_dependencies(event.sub_events(), f);
  }
}

/// Call `f` with a mutable reference to every file argument in the tree.
pub fn visit_file_arguments_mut(events: &mut [Event], f: &mut impl FnMut(&mut String)) {
  for event in events.iter_mut() {
    if let Event::Standard { instructions, .. } = event {
      for instruction in instructions.iter_mut() {
        for arg in instruction.args.iter_mut() {
          if let Argument::File(path) = arg {
            f(path);
          }
        }
      }
    }
    if let Some(sub_events) = event.sub_events_mut() {
      visit_file_arguments_mut(sub_events, f);
    }
  }
}
