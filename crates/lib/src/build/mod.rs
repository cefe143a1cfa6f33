//! Full project builds.
//!
//! A build turns a [`Project`] into a runnable game in an output directory:
//! event sheets are compiled to object files through the shared
//! [`TaskQueue`], resources are gathered, the stripped project descriptor is
//! encrypted and packed with them into a container, the objects are linked
//! into one shared library and the platform runtime is copied alongside.
//!
//! # Stages
//!
//! `Init → ValidateTargets → PrepareResources → CompileUnits → CopyResources →
//! StripAndEncrypt → Link → CopyPlatformFiles → Package → Done`
//!
//! The first fatal error ends the build; see [`BuildError::is_fatal`].
//!
//! # Submodules
//!
//! - [`execute`] - The stages themselves
//! - [`platform_files`] - Runtime files and final packaging

mod execute;
mod platform_files;
mod types;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::codegen::{EventsCodeGenerator, RuntimeCodeGenerator};
use crate::config::ToolConfig;
use crate::diagnostics::DiagnosticSink;
use crate::extensions::ExtensionRegistry;
use crate::package::{Archiver, ContainerPacker, DatFilePacker, ZipArchiver};
use crate::project::Project;
use crate::queue::TaskQueue;

pub use types::*;

use execute::BuildRun;

/// Drives builds against one compiler queue.
pub struct BuildOrchestrator {
  queue: TaskQueue,
  config: ToolConfig,
  extensions: ExtensionRegistry,
  codegen: Arc<dyn EventsCodeGenerator>,
  packer: Box<dyn ContainerPacker>,
  archiver: Box<dyn Archiver>,
  /// Held for the whole of a build: the working directory belongs to one build at a time.
  build_lock: Mutex<()>,
}

impl BuildOrchestrator {
  pub fn new(queue: TaskQueue, config: ToolConfig) -> Self {
    Self {
      queue,
      config,
      extensions: ExtensionRegistry::new(),
      codegen: Arc::new(RuntimeCodeGenerator),
      packer: Box::new(DatFilePacker),
      archiver: Box::new(ZipArchiver),
      build_lock: Mutex::new(()),
    }
  }

  pub fn with_extensions(mut self, extensions: ExtensionRegistry) -> Self {
    self.extensions = extensions;
    self
  }

  pub fn with_code_generator(mut self, codegen: impl EventsCodeGenerator + 'static) -> Self {
    self.codegen = Arc::new(codegen);
    self
  }

  pub fn with_packer(mut self, packer: impl ContainerPacker + 'static) -> Self {
    self.packer = Box::new(packer);
    self
  }

  pub fn with_archiver(mut self, archiver: impl Archiver + 'static) -> Self {
    self.archiver = Box::new(archiver);
    self
  }

  pub fn queue(&self) -> &TaskQueue {
    &self.queue
  }

  pub fn config(&self) -> &ToolConfig {
    &self.config
  }

  /// Build `project` as described by `options`.
  ///
  /// `project` is only read: every change the build makes (remapped resource
  /// paths, stripping) happens on a private copy. Progress and errors go to
  /// `sink`, which also receives exactly one of `on_compilation_succeeded` /
  /// `on_compilation_failed` at the end. Cancelling `cancel` stops the build
  /// at its next wait on the compiler.
  pub async fn build(
    &self,
    project: &Project,
    options: &BuildOptions,
    sink: &mut dyn DiagnosticSink,
    cancel: &CancellationToken,
  ) -> BuildReport {
    let _guard = self.build_lock.lock().await;
    info!(project = %project.name, out_dir = ?options.out_dir, "build started");

    let mut run = BuildRun::new(self, project.clone(), options, sink, cancel);
    let result = run.run().await;
    let (stage, warnings, artifacts, jobs_submitted) = run.finish();

    let outcome = match result {
      Ok(()) => BuildOutcome::Done,
      Err(err) => {
        warn!(stage = %stage, error = %err, "build failed");
        sink.add_error(err.to_string());
        BuildOutcome::Failed(err)
      }
    };

    let report = BuildReport {
      outcome,
      stage,
      warnings,
      artifacts,
      jobs_submitted,
    };

    if report.is_success() {
      info!(project = %project.name, artifacts = report.artifacts.len(), "build succeeded");
      sink.on_compilation_succeeded();
    } else {
      if report.succeeded_with_warnings() {
        warn!(warnings = report.warnings.len(), "build finished with errors");
      }
      sink.on_compilation_failed();
    }

    report
  }
}
