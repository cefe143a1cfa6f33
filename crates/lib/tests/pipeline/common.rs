//! Shared fixtures: a fake compiler and a throwaway tool installation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gamepack_lib::config::ToolConfig;
use gamepack_lib::consts::COMPILATION_LOG;
use gamepack_lib::extensions::ExtensionRegistry;
use gamepack_lib::project::{Event, Project, Scene};
use gamepack_lib::queue::{BackendError, CompilerBackend, CompilerCall, JobKind};
use gamepack_lib::{BuildOrchestrator, TaskQueue};
use tempfile::TempDir;

/// Sleeps, then writes a marker file at the call's output path.
///
/// Outputs whose file name is listed in `failing` are never written.
#[derive(Clone, Default)]
pub struct FakeBackend {
  pub delay: Duration,
  pub calls: Arc<Mutex<Vec<CompilerCall>>>,
  pub failing: Arc<Mutex<HashSet<String>>>,
}

impl FakeBackend {
  pub fn new() -> Self {
    Self {
      delay: Duration::from_millis(2),
      ..Default::default()
    }
  }

  pub fn with_delay(delay: Duration) -> Self {
    Self {
      delay,
      ..Default::default()
    }
  }

  pub fn fail_output(&self, file_name: &str) {
    self.failing.lock().unwrap().insert(file_name.to_string());
  }

  pub fn calls(&self) -> Vec<CompilerCall> {
    self.calls.lock().unwrap().clone()
  }

  pub fn link_calls(&self) -> Vec<CompilerCall> {
    self.calls().into_iter().filter(|c| c.kind == JobKind::Link).collect()
  }

  /// File names of every output, in call order.
  pub fn outputs(&self) -> Vec<String> {
    self
      .calls()
      .iter()
      .map(|c| c.output_file.file_name().unwrap().to_string_lossy().to_string())
      .collect()
  }
}

impl CompilerBackend for FakeBackend {
  async fn invoke(&self, call: &CompilerCall, log_path: &Path) -> Result<(), BackendError> {
    tokio::time::sleep(self.delay).await;
    self.calls.lock().unwrap().push(call.clone());

    let name = call.output_file.file_name().unwrap().to_string_lossy().to_string();
    if self.failing.lock().unwrap().contains(&name) {
      let _ = std::fs::write(log_path, format!("error: cannot build {}\n", name));
      return Err(BackendError::Exited {
        program: "fake".to_string(),
        code: Some(1),
      });
    }

    std::fs::write(&call.output_file, format!("fake output for {}", name)).unwrap();
    Ok(())
  }
}

/// A tool installation, project directory and output directory under one temp dir.
pub struct Fixture {
  pub temp: TempDir,
  pub config: ToolConfig,
  pub project_dir: PathBuf,
  pub out_dir: PathBuf,
}

pub const SFX_STUB_BYTES: &[u8] = b"MZ-fake-sfx-stub";
pub const SFX_CONFIG_BYTES: &[u8] = b";!@Install@!UTF-8!\nRunProgram=\"internalstart.exe\"\n;!@InstallEnd@!\n";

impl Fixture {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("install");

    let mut config = ToolConfig::with_base_dir(&base);
    config.generated_dir = Some(temp.path().join("generated"));
    config.temp_dir = Some(temp.path().join("tmp"));
    config.yield_interval_ms = 5;

    let runtime = config.runtime_dir();
    let mac_runtime = config.mac_runtime_dir();
    std::fs::create_dir_all(&runtime).unwrap();
    std::fs::create_dir_all(&mac_runtime).unwrap();
    std::fs::create_dir_all(config.extensions_dir()).unwrap();
    std::fs::create_dir_all(temp.path().join("tmp")).unwrap();

    for name in ["PlayWin.exe", "GDCpp.dll", "ExeLinux", "PlayLinux", "libGDCpp.so"] {
      std::fs::write(runtime.join(name), format!("runtime {}", name)).unwrap();
    }
    for name in ["MacExe", "libGDCpp.dylib"] {
      std::fs::write(mac_runtime.join(name), format!("runtime {}", name)).unwrap();
    }
    std::fs::write(config.sfx_stub(), SFX_STUB_BYTES).unwrap();
    std::fs::write(config.sfx_config(), SFX_CONFIG_BYTES).unwrap();

    let project_dir = temp.path().join("project");
    std::fs::create_dir_all(&project_dir).unwrap();
    let out_dir = temp.path().join("out");

    Self {
      temp,
      config,
      project_dir,
      out_dir,
    }
  }

  pub fn working_dir(&self) -> PathBuf {
    self.config.working_dir()
  }

  pub fn generated_dir(&self) -> PathBuf {
    self.config.generated_dir()
  }

  pub fn queue(&self, backend: FakeBackend) -> TaskQueue {
    TaskQueue::spawn(
      backend,
      self.generated_dir().join(COMPILATION_LOG),
      self.config.job_timeout(),
    )
  }

  pub fn orchestrator(&self, backend: FakeBackend) -> BuildOrchestrator {
    BuildOrchestrator::new(self.queue(backend), self.config.clone())
  }

  pub fn orchestrator_with_extensions(&self, backend: FakeBackend, extensions: ExtensionRegistry) -> BuildOrchestrator {
    self.orchestrator(backend).with_extensions(extensions)
  }

  /// Write a file in the project directory and return its path relative to it.
  pub fn project_file(&self, relative: &str, content: &[u8]) -> String {
    let path = self.project_dir.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    relative.to_string()
  }

  /// An empty project whose file lives in the project directory.
  pub fn project(&self, name: &str) -> Project {
    Project {
      name: name.to_string(),
      project_file: self.project_dir.join("game.json"),
      ..Default::default()
    }
  }

  pub fn out_file(&self, name: &str) -> PathBuf {
    self.out_dir.join(name)
  }
}

pub fn scene(name: &str, events: Vec<Event>) -> Scene {
  Scene {
    name: name.to_string(),
    events,
    ..Default::default()
  }
}

pub fn link(target: &str) -> Event {
  Event::Link {
    target: target.to_string(),
  }
}

pub fn nested(events: Vec<Event>) -> Event {
  Event::Standard {
    instructions: vec![],
    sub_events: events,
  }
}

pub fn code(dependencies: &[&str]) -> Event {
  Event::Code {
    code: "ctx.Native();".to_string(),
    dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
    sub_events: vec![],
  }
}
