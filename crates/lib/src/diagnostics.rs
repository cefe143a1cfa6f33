//! Build progress reporting.
//!
//! The orchestrator only talks to a [`DiagnosticSink`]. Hosts choose the
//! variant: an interactive front end redraws its UI from [`DiagnosticSink::on_idle`],
//! a headless one simply prints.

use tracing::{error, info};

/// Receiver of build progress and errors.
pub trait DiagnosticSink: Send {
  /// An informational message, optionally about a specific item.
  fn on_message(&mut self, text: &str, detail: Option<&str>);

  /// Overall progress, from 0 to 100.
  fn on_percent_update(&mut self, percent: f32);

  fn on_compilation_failed(&mut self);

  fn on_compilation_succeeded(&mut self);

  /// Record an error. Recorded errors make the build count as failed.
  fn add_error(&mut self, message: String);

  /// Every error recorded so far.
  fn errors(&self) -> &[String];

  /// Called periodically while the build waits on the compiler.
  fn on_idle(&mut self) {}
}

/// Prints to stdout and mirrors everything to `tracing`.
#[derive(Debug, Default)]
pub struct ConsoleDiagnostics {
  errors: Vec<String>,
  last_percent: Option<u32>,
}

impl ConsoleDiagnostics {
  pub fn new() -> Self {
    Self::default()
  }
}

impl DiagnosticSink for ConsoleDiagnostics {
  fn on_message(&mut self, text: &str, detail: Option<&str>) {
    info!(detail = ?detail, "{}", text);
    match detail {
      Some(detail) => println!("{} ({})", text, detail),
      None => println!("{}", text),
    }
  }

  fn on_percent_update(&mut self, percent: f32) {
    let whole = percent.floor() as u32;
    if self.last_percent != Some(whole) {
      self.last_percent = Some(whole);
      println!("[{:>3}%]", whole);
    }
  }

  fn on_compilation_failed(&mut self) {
    error!(errors = self.errors.len(), "build failed");
    println!("Build failed.");
    for message in &self.errors {
      println!("  - {}", message);
    }
  }

  fn on_compilation_succeeded(&mut self) {
    info!("build succeeded");
    println!("Build succeeded.");
  }

  fn add_error(&mut self, message: String) {
    error!("{}", message);
    self.errors.push(message);
  }

  fn errors(&self) -> &[String] {
    &self.errors
  }
}

/// What a [`RecordingDiagnostics`] observed last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
  Succeeded,
  Failed,
}

/// Keeps every callback for later inspection.
#[derive(Debug, Default, Clone)]
pub struct RecordingDiagnostics {
  pub messages: Vec<(String, Option<String>)>,
  pub percents: Vec<f32>,
  pub errors: Vec<String>,
  pub completions: Vec<Completion>,
  pub idle_ticks: usize,
}

impl RecordingDiagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn completion(&self) -> Option<Completion> {
    self.completions.last().copied()
  }

  /// True if the percentages only ever went up.
  pub fn percents_strictly_increase(&self) -> bool {
    self.percents.windows(2).all(|w| w[0] < w[1])
  }
}

impl DiagnosticSink for RecordingDiagnostics {
  fn on_message(&mut self, text: &str, detail: Option<&str>) {
    self.messages.push((text.to_string(), detail.map(str::to_string)));
  }

  fn on_percent_update(&mut self, percent: f32) {
    self.percents.push(percent);
  }

  fn on_compilation_failed(&mut self) {
    self.completions.push(Completion::Failed);
  }

  fn on_compilation_succeeded(&mut self) {
    self.completions.push(Completion::Succeeded);
  }

  fn add_error(&mut self, message: String) {
    self.errors.push(message);
  }

  fn errors(&self) -> &[String] {
    &self.errors
  }

  fn on_idle(&mut self) {
    self.idle_ticks += 1;
  }
}
