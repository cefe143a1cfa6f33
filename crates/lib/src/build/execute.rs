//! Build stages up to and including the link.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::{BuildError, BuildOptions, BuildStage};
use super::BuildOrchestrator;
use crate::consts::{CONTAINER_FILE, DESCRIPTOR_ENCRYPTED, DESCRIPTOR_PLAINTEXT};
use crate::crypto;
use crate::deps::DependencyGraph;
use crate::diagnostics::DiagnosticSink;
use crate::extensions::library_exists;
use crate::package::{self, PackageError};
use crate::platform::TargetPlatform;
use crate::project::Project;
use crate::project::resources::{ResourceMap, ResourceMerger, expose_project_resources};
use crate::project::strip::strip_project;
use crate::queue::{CompileJob, CompilerCall, PreWorkError, WaitCancelled};
use crate::unit::{TranslationUnit, UnitId};

/// State of one build. Dropped when the build ends.
pub(super) struct BuildRun<'a> {
  pub(super) orchestrator: &'a BuildOrchestrator,
  pub(super) options: &'a BuildOptions,
  pub(super) sink: &'a mut dyn DiagnosticSink,
  /// Caller's token. Distinguishes a cancellation from a job timeout.
  external: &'a CancellationToken,
  /// Child of `external`, also fired by the queue when a job times out.
  cancel: CancellationToken,
  /// Private working copy of the project.
  pub(super) project: Project,
  pub(super) working_dir: PathBuf,
  generated_dir: PathBuf,
  resources: ResourceMap,
  /// Object files of this build, in compile order.
  objects: Vec<PathBuf>,
  stage: BuildStage,
  warnings: Vec<BuildError>,
  pub(super) artifacts: Vec<PathBuf>,
  jobs_submitted: usize,
}

impl<'a> BuildRun<'a> {
  pub(super) fn new(
    orchestrator: &'a BuildOrchestrator,
    project: Project,
    options: &'a BuildOptions,
    sink: &'a mut dyn DiagnosticSink,
    external: &'a CancellationToken,
  ) -> Self {
    Self {
      orchestrator,
      options,
      sink,
      external,
      cancel: external.child_token(),
      project,
      working_dir: orchestrator.config.working_dir(),
      generated_dir: orchestrator.config.generated_dir(),
      resources: ResourceMap::default(),
      objects: Vec::new(),
      stage: BuildStage::Init,
      warnings: Vec::new(),
      artifacts: Vec::new(),
      jobs_submitted: 0,
    }
  }

  /// Stage reached, warnings, artifacts and jobs submitted.
  pub(super) fn finish(self) -> (BuildStage, Vec<BuildError>, Vec<PathBuf>, usize) {
    (self.stage, self.warnings, self.artifacts, self.jobs_submitted)
  }

  pub(super) async fn run(&mut self) -> Result<(), BuildError> {
    self.sink.on_message("Project compilation launching", None);

    self.enter(BuildStage::ValidateTargets);
    self.validate_targets()?;

    self.enter(BuildStage::PrepareResources);
    self.prepare_resources().await?;

    self.enter(BuildStage::CompileUnits);
    self.compile_units().await?;

    self.enter(BuildStage::CopyResources);
    self.copy_resources()?;

    self.enter(BuildStage::StripAndEncrypt);
    self.strip_and_encrypt()?;

    self.enter(BuildStage::Link);
    self.link().await?;

    self.enter(BuildStage::CopyPlatformFiles);
    self.copy_platform_files()?;

    self.enter(BuildStage::Package);
    self.package()?;

    self.enter(BuildStage::Done);
    self.sink.on_percent_update(100.0);
    Ok(())
  }

  fn enter(&mut self, stage: BuildStage) {
    info!(stage = %stage, "entering stage");
    self.stage = stage;
  }

  /// Record a non-fatal error, or hand back a fatal one.
  pub(super) fn record(&mut self, err: BuildError) -> Result<(), BuildError> {
    if err.is_fatal() {
      return Err(err);
    }
    warn!(stage = %self.stage, error = %err, "recorded error");
    self.sink.add_error(err.to_string());
    self.warnings.push(err);
    Ok(())
  }

  fn interruption(&self) -> BuildError {
    if self.external.is_cancelled() {
      BuildError::Cancelled
    } else {
      BuildError::Timeout {
        after: self.orchestrator.config.job_timeout().unwrap_or_default(),
      }
    }
  }

  fn check_cancelled(&self) -> Result<(), BuildError> {
    if self.cancel.is_cancelled() {
      return Err(self.interruption());
    }
    Ok(())
  }

  /// Wait for the compiler queue to drain, yielding to the sink.
  async fn wait_for_queue(&mut self) -> Result<(), BuildError> {
    let orchestrator = self.orchestrator;
    let interval = orchestrator.config.yield_interval();
    let waited = {
      let sink = &mut *self.sink;
      orchestrator.queue.wait_idle(interval, &self.cancel, || sink.on_idle()).await
    };
    waited.map_err(|WaitCancelled| self.interruption())
  }

  async fn submit_and_wait(&mut self, job: CompileJob) -> Result<(), BuildError> {
    self.check_cancelled()?;
    self.orchestrator.queue.submit(job);
    self.jobs_submitted += 1;
    self.wait_for_queue().await
  }

  fn log_path(&self) -> PathBuf {
    self.orchestrator.queue.log_path().to_path_buf()
  }

  fn validate_targets(&mut self) -> Result<(), BuildError> {
    self.sink.on_percent_update(0.0);
    if self.options.targets.is_empty() {
      return Err(BuildError::NoTargetSelected);
    }
    debug!(targets = ?self.options.targets.iter().collect::<Vec<_>>(), "targets selected");
    Ok(())
  }

  async fn prepare_resources(&mut self) -> Result<(), BuildError> {
    if self.orchestrator.queue.is_busy() {
      self.sink.on_message("Compilation waiting for other task to finish...", None);
      self.wait_for_queue().await?;
    }

    self.reset_working_dir()?;

    self.sink.on_message("Preparing resources...", None);
    let mut merger = ResourceMerger::new(self.project.base_directory());
    let sink = &mut *self.sink;
    expose_project_resources(&mut self.project, &mut merger, |name| {
      sink.on_message("Preparing resources...", Some(name));
    });
    self.resources = merger.into_map();
    debug!(resources = self.resources.len(), "resources exposed");
    Ok(())
  }

  /// Create the working directory if needed and empty it.
  fn reset_working_dir(&mut self) -> Result<(), BuildError> {
    let dir = self.working_dir.clone();
    if let Err(source) = std::fs::create_dir_all(&dir) {
      return self.record(BuildError::WorkingDirectory { path: dir, source });
    }

    let entries = match std::fs::read_dir(&dir) {
      Ok(entries) => entries,
      Err(source) => return self.record(BuildError::WorkingDirectory { path: dir, source }),
    };
    for entry in entries.flatten() {
      let path = entry.path();
      let removed = if path.is_dir() {
        std::fs::remove_dir_all(&path)
      } else {
        std::fs::remove_file(&path)
      };
      if let Err(source) = removed {
        self.record(BuildError::WorkingDirectory { path, source })?;
      }
    }
    debug!(path = ?dir, "working directory ready");
    Ok(())
  }

  async fn compile_units(&mut self) -> Result<(), BuildError> {
    for scene in self.project.scenes.iter_mut() {
      scene.profiler_enabled = false;
    }

    if let Err(source) = std::fs::create_dir_all(&self.generated_dir) {
      self.record(BuildError::WorkingDirectory {
        path: self.generated_dir.clone(),
        source,
      })?;
    }

    let graph = DependencyGraph::from_project(&self.project);

    // Sheet -> the one scene it is compiled for.
    let mut own_object: BTreeMap<String, String> = BTreeMap::new();
    for sheet in &self.project.external_events {
      if let Some(scene) = graph.compilable_for_scene(&sheet.name) {
        own_object.insert(sheet.name.clone(), scene);
      }
    }
    let compiled_sheets: Arc<BTreeSet<String>> = Arc::new(own_object.keys().cloned().collect());
    let snapshot = Arc::new(self.project.clone());
    let mut compiled_sources: BTreeSet<String> = BTreeSet::new();

    let scenes: Vec<String> = self.project.scenes.iter().map(|s| s.name.clone()).collect();
    let total = scenes.len();

    for (index, scene) in scenes.iter().enumerate() {
      let scene_id = UnitId::Scene(scene.clone());
      let deps = graph.analyze(&scene_id)?;
      self.sink.on_message(&format!("Compiling scene {}.", scene), None);

      for source in &deps.source_files {
        if compiled_sources.insert(source.clone()) {
          self.compile_source_file(source).await?;
        }
      }

      for sheet in &deps.external_events {
        if own_object.get(sheet) == Some(scene) {
          let unit = TranslationUnit::generated(UnitId::ExternalEvents(sheet.clone()), &self.generated_dir);
          self.compile_events(unit, &snapshot, &compiled_sheets).await?;
        }
      }

      let unit = TranslationUnit::generated(scene_id, &self.generated_dir);
      self.compile_events(unit, &snapshot, &compiled_sheets).await?;

      self.sink.on_message(&format!("Compiling scene {} succeeded", scene), None);
      self.sink.on_percent_update((index + 1) as f32 / total as f32 * 50.0);
    }

    // Source files required by sheets no scene includes are linked too.
    let sheets: Vec<String> = self.project.external_events.iter().map(|e| e.name.clone()).collect();
    for sheet in sheets {
      let deps = graph.analyze(&UnitId::ExternalEvents(sheet))?;
      for source in &deps.source_files {
        if compiled_sources.insert(source.clone()) {
          self.compile_source_file(source).await?;
        }
      }
    }

    Ok(())
  }

  async fn compile_source_file(&mut self, name: &str) -> Result<(), BuildError> {
    let Some(source) = self.project.native_source_file(name) else {
      return Ok(());
    };
    let unit = TranslationUnit::source_file(&source.name, &source.file, &self.project, &self.generated_dir);
    self.sink.on_message("Compiling source file", Some(name));

    let mut call = CompilerCall::compile(&unit.source_path, &unit.object_path);
    call.optimize = self.options.optimize;
    let job = CompileJob::new(call, format!("Compilation of {}", unit.id), self.cancel.clone()).for_unit(unit.id.clone());

    self.submit_and_wait(job).await?;
    self.check_object(unit)
  }

  async fn compile_events(
    &mut self,
    unit: TranslationUnit,
    snapshot: &Arc<Project>,
    compiled_sheets: &Arc<BTreeSet<String>>,
  ) -> Result<(), BuildError> {
    let mut call = CompilerCall::compile(&unit.source_path, &unit.object_path);
    call.optimize = self.options.optimize;
    call.events_generated_code = true;

    let codegen = Arc::clone(&self.orchestrator.codegen);
    let project = Arc::clone(snapshot);
    let sheets = Arc::clone(compiled_sheets);
    let id = unit.id.clone();
    let source_path = unit.source_path.clone();
    let pre_work = move || {
      let code = codegen.generate(&project, &id, &sheets)?;
      std::fs::write(&source_path, code).map_err(|source| PreWorkError::WriteSource {
        path: source_path.clone(),
        source,
      })
    };

    let job = CompileJob::new(call, format!("Compilation of events of {}", unit.id), self.cancel.clone())
      .for_unit(unit.id.clone())
      .with_pre_work(pre_work);

    self.submit_and_wait(job).await?;
    self.check_object(unit)
  }

  fn check_object(&mut self, unit: TranslationUnit) -> Result<(), BuildError> {
    if !unit.object_path.exists() {
      return Err(BuildError::CompileFailed {
        unit: unit.id,
        log: self.log_path(),
      });
    }
    debug!(unit = %unit.id, object = ?unit.object_path, "compiled");
    self.objects.push(unit.object_path);
    Ok(())
  }

  fn copy_resources(&mut self) -> Result<(), BuildError> {
    self.sink.on_message("Copying resources...", None);
    let entries: Vec<(PathBuf, String)> = self
      .resources
      .iter()
      .map(|(original, name)| (original.to_path_buf(), name.to_string()))
      .collect();
    let total = entries.len();

    for (index, (original, name)) in entries.into_iter().enumerate() {
      self.sink.on_message("Copying resources...", Some(&original.to_string_lossy()));
      if let Err(source) = package::copy_file(&original, &self.working_dir.join(&name)) {
        self.record(BuildError::ResourceCopyFailed { path: original, source })?;
      }
      self.sink.on_percent_update(50.0 + (index + 1) as f32 / total as f32 * 25.0);
    }
    Ok(())
  }

  fn strip_and_encrypt(&mut self) -> Result<(), BuildError> {
    self.sink.on_message("Copying resources...", Some("Step 1 out of 3"));
    let mut stripped = self.project.clone();
    strip_project(&mut stripped);
    let plaintext = self.working_dir.join(DESCRIPTOR_PLAINTEXT);
    stripped.save(&plaintext)?;
    self.sink.on_percent_update(80.0);

    self.sink.on_message("Copying resources...", Some("Step 2 out of 3"));
    crypto::encrypt_file(&plaintext, &self.working_dir.join(DESCRIPTOR_ENCRYPTED))?;
    if let Err(source) = std::fs::remove_file(&plaintext) {
      self.record(BuildError::WorkingDirectory { path: plaintext, source })?;
    }
    self.sink.on_percent_update(85.0);

    self.sink.on_message("Copying resources...", Some("Step 3 out of 3"));
    let container = self.working_dir.join(CONTAINER_FILE);
    let fatal = |source: PackageError| BuildError::PackagingFailed {
      path: container.clone(),
      fatal: true,
      source,
    };
    let files = package::list_files(&self.working_dir).map_err(fatal)?;
    self
      .orchestrator
      .packer
      .create(&files, &self.working_dir, &container)
      .map_err(fatal)?;

    for name in files {
      let path = self.working_dir.join(&name);
      if let Err(source) = std::fs::remove_file(&path) {
        self.record(BuildError::WorkingDirectory { path, source })?;
      }
    }
    Ok(())
  }

  /// Shared library output of the link, inside the working directory.
  fn link_output(&self) -> PathBuf {
    let name = if self.options.targets.contains(TargetPlatform::Windows) {
      "Code.dll"
    } else {
      "Code.so"
    };
    self.working_dir.join(name)
  }

  async fn link(&mut self) -> Result<(), BuildError> {
    self.sink.on_message("Linking project files...", None);
    let output = self.link_output();
    let extensions_dir = self.orchestrator.config.extensions_dir();

    let mut call = CompilerCall::link(&output);
    call.extra_object_files = self.objects.clone();
    call.extra_lib_files = self.extension_libraries(&extensions_dir);
    call.lib_dirs = vec![extensions_dir];
    let job = CompileJob::new(
      call,
      format!("Linking code for project {}", self.project.name),
      self.cancel.clone(),
    );

    self.submit_and_wait(job).await?;

    if !output.exists() {
      return Err(BuildError::LinkFailed { log: self.log_path() });
    }
    self
      .sink
      .on_message(&format!("Linking project {} succeeded", self.project.name), None);
    self.sink.on_percent_update(90.0);
    Ok(())
  }

  /// Libraries of used extensions present in `dir`.
  fn extension_libraries(&self, dir: &Path) -> Vec<String> {
    let mut libraries = Vec::new();
    for name in &self.project.used_extensions {
      let Some(extension) = self.orchestrator.extensions.get(name) else {
        continue;
      };
      let Some(runtime) = extension.runtime() else {
        continue;
      };

      let candidates = std::iter::once(&extension.name).chain(runtime.supplementary_lib_files.iter());
      for library in candidates {
        if library_exists(dir, library) {
          libraries.push(library.clone());
        } else {
          debug!(extension = %name, library = %library, "library not found, not linked");
        }
      }
    }
    libraries
  }
}
