//! Terminal output for build reports, dependency listings and container
//! contents.

use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

pub const ARROW: &str = "→";

/// Kind of a one-line status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Success,
  Info,
  Warning,
  Error,
}

impl Status {
  fn symbol(self) -> &'static str {
    match self {
      Status::Success => "✓",
      Status::Info => "•",
      Status::Warning => "⚠",
      Status::Error => "✗",
    }
  }

  /// Problems go to stderr so `--json` output stays parseable.
  fn stream(self) -> Stream {
    match self {
      Status::Success | Status::Info => Stream::Stdout,
      Status::Warning | Status::Error => Stream::Stderr,
    }
  }
}

/// Print `message` behind the colored symbol of `kind`.
pub fn status(kind: Status, message: &str) {
  let symbol_text = kind.symbol();
  let symbol = symbol_text.if_supports_color(kind.stream(), |s| match kind {
    Status::Success => s.green().to_string(),
    Status::Info => s.blue().to_string(),
    Status::Warning => s.yellow().to_string(),
    Status::Error => s.red().to_string(),
  });
  match kind {
    Status::Success | Status::Info => println!("{} {}", symbol, message),
    Status::Warning | Status::Error => eprintln!("{} {}", symbol, message),
  }
}

/// `1 file`, `3 files`.
pub fn plural(count: usize, word: &str) -> String {
  if count == 1 {
    format!("{} {}", count, word)
  } else {
    format!("{} {}s", count, word)
  }
}

pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", size, UNITS[unit])
}

/// Wall time of a build, to the millisecond.
pub fn format_duration(duration: Duration) -> String {
  let millis = Duration::from_millis(duration.as_millis() as u64);
  humantime::format_duration(millis).to_string()
}

/// An indented `→ text` line under a heading.
pub fn print_item(text: &str) {
  println!("  {} {}", ARROW.if_supports_color(Stream::Stdout, |s| s.dimmed()), text);
}

/// A `  label: value` summary line.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
