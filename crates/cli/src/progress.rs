//! Status-line progress for interactive builds.

use std::io::Write;

use owo_colors::{OwoColorize, Stream};
use tracing::info;

use gamepack_lib::DiagnosticSink;

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// Redraws one status line on stderr; the spinner turns while the compiler runs.
#[derive(Debug, Default)]
pub struct ProgressDiagnostics {
  percent: f32,
  status: String,
  frame: usize,
  errors: Vec<String>,
}

impl ProgressDiagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  fn redraw(&self) {
    let line = format!(
      "\r{} [{:>3.0}%] {}",
      SPINNER[self.frame % SPINNER.len()],
      self.percent,
      self.status
    );
    let mut stderr = std::io::stderr().lock();
    let _ = write!(stderr, "{}\x1b[K", line.if_supports_color(Stream::Stderr, |s| s.cyan()));
    let _ = stderr.flush();
  }

  fn finish_line(&self) {
    eprintln!();
  }
}

impl DiagnosticSink for ProgressDiagnostics {
  fn on_message(&mut self, text: &str, detail: Option<&str>) {
    info!(detail = ?detail, "{}", text);
    self.status = match detail {
      Some(detail) => format!("{} ({})", text, detail),
      None => text.to_string(),
    };
    self.redraw();
  }

  fn on_percent_update(&mut self, percent: f32) {
    self.percent = percent;
    self.redraw();
  }

  fn on_compilation_failed(&mut self) {
    self.finish_line();
  }

  fn on_compilation_succeeded(&mut self) {
    self.finish_line();
  }

  fn add_error(&mut self, message: String) {
    self.errors.push(message);
  }

  fn errors(&self) -> &[String] {
    &self.errors
  }

  fn on_idle(&mut self) {
    self.frame = self.frame.wrapping_add(1);
    self.redraw();
  }
}
