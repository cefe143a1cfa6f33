//! Implementation of the `gamepack build` command.
//!
//! Loads a project, runs a full build against the configured native compiler
//! and prints the report.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use gamepack_lib::config::ToolConfig;
use gamepack_lib::consts::COMPILATION_LOG;
use gamepack_lib::diagnostics::ConsoleDiagnostics;
use gamepack_lib::extensions::ExtensionRegistry;
use gamepack_lib::platform::{TargetPlatform, TargetSet};
use gamepack_lib::queue::CommandBackend;
use gamepack_lib::{BuildOptions, BuildOrchestrator, BuildReport, DiagnosticSink, Project, TaskQueue};

use crate::output::{ARROW, Status, format_duration, plural, print_item, print_json, print_stat, status};
use crate::progress::ProgressDiagnostics;

pub struct BuildArgs {
  pub project: PathBuf,
  pub out: PathBuf,
  /// Empty means the host platform.
  pub targets: Vec<TargetPlatform>,
  pub compress: bool,
  pub optimize: bool,
  pub plain: bool,
  pub json: bool,
}

impl BuildArgs {
  fn options(&self) -> BuildOptions {
    let mut options = BuildOptions::new(&self.out)
      .with_compression(self.compress)
      .with_optimization(self.optimize);
    if !self.targets.is_empty() {
      let mut targets = TargetSet::default();
      for target in &self.targets {
        targets.insert(*target);
      }
      options = options.with_targets(targets);
    }
    options
  }
}

pub fn cmd_build(config: ToolConfig, args: BuildArgs) -> Result<()> {
  let project =
    Project::load(&args.project).with_context(|| format!("Failed to load project {}", args.project.display()))?;
  let extensions = ExtensionRegistry::load_or_default(&config.extensions_file()).context("Failed to load extensions")?;
  debug!(extensions = extensions.len(), "extensions loaded");

  let options = args.options();
  if !args.json {
    status(
      Status::Info,
      &format!("Building {} {} {}", project.name, ARROW, options.out_dir.display()),
    );
  }

  let mut sink: Box<dyn DiagnosticSink> = if args.plain {
    Box::new(ConsoleDiagnostics::new())
  } else {
    Box::new(ProgressDiagnostics::new())
  };

  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(async {
    let queue = TaskQueue::spawn(
      CommandBackend::new(config.compiler.clone()),
      config.generated_dir().join(COMPILATION_LOG),
      config.job_timeout(),
    );
    let orchestrator = BuildOrchestrator::new(queue, config).with_extensions(extensions);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, cancelling build");
        on_interrupt.cancel();
      }
    });

    orchestrator.build(&project, &options, sink.as_mut(), &cancel).await
  });
  let elapsed = started.elapsed();

  if args.json {
    print_json(&report_json(&report, elapsed.as_millis()))?;
  } else {
    print_report(&report, sink.errors());
    print_stat("Time", &format_duration(elapsed));
  }

  if let Some(err) = report.error() {
    bail!("Build failed at stage {}: {}", report.stage, err);
  }
  if !report.warnings.is_empty() {
    bail!("Build finished with {}", plural(report.warnings.len(), "error"));
  }
  Ok(())
}

fn print_report(report: &BuildReport, errors: &[String]) {
  for message in errors {
    status(Status::Error, message);
  }

  if report.is_success() {
    status(Status::Success, &format!("Build complete ({})", plural(report.artifacts.len(), "file")));
  } else if report.succeeded_with_warnings() {
    status(Status::Warning, &format!("Build finished with {}", plural(report.warnings.len(), "error")));
  }
  for artifact in &report.artifacts {
    print_item(&artifact.display().to_string());
  }
  print_stat("Compiler jobs", &report.jobs_submitted.to_string());
}

fn report_json(report: &BuildReport, elapsed_ms: u128) -> serde_json::Value {
  serde_json::json!({
    "success": report.is_success(),
    "stage": report.stage.as_str(),
    "error": report.error().map(|e| e.to_string()),
    "warnings": report.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
    "artifacts": report.artifacts,
    "jobs_submitted": report.jobs_submitted,
    "elapsed_ms": elapsed_ms as u64,
  })
}
