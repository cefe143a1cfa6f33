//! C++ generation for event sheets.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::project::{Argument, Event, Project};
use crate::queue::PreWorkError;
use crate::unit::UnitId;

/// Renders the code of a scene or external event sheet.
pub trait EventsCodeGenerator: Send + Sync {
  /// Generate the full translation unit for `unit`.
  ///
  /// `compiled_sheets` names the external sheets that get their own object
  /// file in this build. Links to them become calls to their entry point;
  /// links to any other sheet are inlined.
  fn generate(&self, project: &Project, unit: &UnitId, compiled_sheets: &BTreeSet<String>) -> Result<String, PreWorkError>;
}

/// Name of the function a unit's events are compiled into.
pub fn entry_symbol(unit: &UnitId) -> String {
  format!("{}Run", unit.file_stem())
}

/// Emits calls into the game runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeCodeGenerator;

impl EventsCodeGenerator for RuntimeCodeGenerator {
  fn generate(&self, project: &Project, unit: &UnitId, compiled_sheets: &BTreeSet<String>) -> Result<String, PreWorkError> {
    let events = sheet_events(project, unit).ok_or_else(|| PreWorkError::Generation {
      unit: unit.clone(),
      message: "no such scene or external events".to_string(),
    })?;

    let mut writer = Writer {
      project,
      unit,
      compiled_sheets,
      out: String::new(),
      depth: 1,
      inlining: vec![unit.clone()],
      called: BTreeSet::new(),
    };
    writer.events(events)?;

    let mut source = String::new();
    let _ = writeln!(source, "// Events of {} in project '{}'.", unit, project.name);
    source.push_str("#include \"GDCpp/Runtime/RuntimeContext.h\"\n\n");
    for sheet in &writer.called {
      let _ = writeln!(
        source,
        "void {}(RuntimeContext & ctx);",
        entry_symbol(&UnitId::ExternalEvents(sheet.clone()))
      );
    }
    if !writer.called.is_empty() {
      source.push('\n');
    }
    let _ = writeln!(source, "extern \"C\" void {}(RuntimeContext & ctx)\n{{", entry_symbol(unit));
    source.push_str(&writer.out);
    source.push_str("}\n");

    Ok(source)
  }
}

fn sheet_events<'a>(project: &'a Project, unit: &UnitId) -> Option<&'a [Event]> {
  match unit {
    UnitId::Scene(name) => project.scene(name).map(|s| s.events.as_slice()),
    UnitId::ExternalEvents(name) => project.external_events_named(name).map(|e| e.events.as_slice()),
    UnitId::SourceFile(_) => None,
  }
}

struct Writer<'a> {
  project: &'a Project,
  unit: &'a UnitId,
  compiled_sheets: &'a BTreeSet<String>,
  out: String,
  depth: usize,
  /// Sheets currently being inlined, outermost first.
  inlining: Vec<UnitId>,
  /// Separately compiled sheets called from this unit.
  called: BTreeSet<String>,
}

impl Writer<'_> {
  fn line(&mut self, text: &str) {
    for _ in 0..self.depth {
      self.out.push_str("    ");
    }
    self.out.push_str(text);
    self.out.push('\n');
  }

  fn events(&mut self, events: &[Event]) -> Result<(), PreWorkError> {
    for event in events {
      self.event(event)?;
    }
    Ok(())
  }

  fn block(&mut self, sub_events: &[Event]) -> Result<(), PreWorkError> {
    if sub_events.is_empty() {
      return Ok(());
    }
    self.line("{");
    self.depth += 1;
    self.events(sub_events)?;
    self.depth -= 1;
    self.line("}");
    Ok(())
  }

  fn event(&mut self, event: &Event) -> Result<(), PreWorkError> {
    match event {
      Event::Standard {
        instructions,
        sub_events,
      } => {
        self.line("{");
        self.depth += 1;
        for instruction in instructions {
          let args: Vec<String> = instruction.args.iter().map(argument).collect();
          let call = format!("ctx.Call({}, {{{}}});", literal(&instruction.name), args.join(", "));
          self.line(&call);
        }
        self.block(sub_events)?;
        self.depth -= 1;
        self.line("}");
      }
      Event::Link { target } => self.link(target)?,
      Event::Code { code, sub_events, .. } => {
        for line in code.lines() {
          self.line(line);
        }
        self.block(sub_events)?;
      }
      Event::Comment { text } => {
        for line in text.lines() {
          self.line(&format!("// {}", line));
        }
      }
    }
    Ok(())
  }

  fn link(&mut self, target: &str) -> Result<(), PreWorkError> {
    let (id, events) = if let Some(sheet) = self.project.external_events_named(target) {
      (UnitId::ExternalEvents(sheet.name.clone()), sheet.events.as_slice())
    } else if let Some(scene) = self.project.scene(target) {
      (UnitId::Scene(scene.name.clone()), scene.events.as_slice())
    } else {
      self.line(&format!("// Link to unknown events '{}' ignored.", target));
      return Ok(());
    };

    if matches!(id, UnitId::ExternalEvents(_)) && self.compiled_sheets.contains(target) && &id != self.unit {
      self.called.insert(target.to_string());
      self.line(&format!("{}(ctx);", entry_symbol(&id)));
      return Ok(());
    }

    if self.inlining.contains(&id) {
      return Err(PreWorkError::Generation {
        unit: self.unit.clone(),
        message: format!("{} links back to itself", id),
      });
    }

    self.line(&format!("// Begin {}", id));
    self.inlining.push(id.clone());
    self.events(events)?;
    self.inlining.pop();
    self.line(&format!("// End {}", id));
    Ok(())
  }
}

fn argument(arg: &Argument) -> String {
  match arg {
    Argument::Value(value) => literal(value),
    Argument::File(path) => format!("ctx.Resource({})", literal(path)),
  }
}

/// A C++ string literal.
fn literal(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('"');
  for c in text.chars() {
    match c {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      c => out.push(c),
    }
  }
  out.push('"');
  out
}
