//! Compiler backends.
//!
//! A backend turns one [`CompilerCall`] into a finished compiler process. It
//! does not decide success: the queue's callers check for the expected output
//! file, since a compiler can exit cleanly without producing it.

use std::ffi::OsString;
use std::fs::File;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::CompilerConfig;

#[derive(Debug, Error)]
pub enum BackendError {
  #[error("failed to open compiler log {path}: {source}")]
  Log {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{program} exited with code {code:?}")]
  Exited { program: String, code: Option<i32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
  Compile,
  Link,
}

/// Parameters of one compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerCall {
  pub kind: JobKind,
  /// Source to compile, or an object to link. Links may rely on `extra_object_files` only.
  pub input_file: Option<PathBuf>,
  pub output_file: PathBuf,
  pub optimize: bool,
  /// Build for the shipped runtime rather than the editor.
  pub for_runtime: bool,
  /// The input is generated event code.
  pub events_generated_code: bool,
  pub extra_object_files: Vec<PathBuf>,
  /// Libraries given by name, resolved by the linker (`-l<name>`).
  pub extra_lib_files: Vec<String>,
  /// Directories searched for `extra_lib_files`.
  pub lib_dirs: Vec<PathBuf>,
}

impl CompilerCall {
  pub fn compile(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
    Self {
      kind: JobKind::Compile,
      input_file: Some(input.into()),
      output_file: output.into(),
      optimize: false,
      for_runtime: true,
      events_generated_code: false,
      extra_object_files: Vec::new(),
      extra_lib_files: Vec::new(),
      lib_dirs: Vec::new(),
    }
  }

  pub fn link(output: impl Into<PathBuf>) -> Self {
    Self {
      kind: JobKind::Link,
      input_file: None,
      ..Self::compile(PathBuf::new(), output)
    }
  }
}

/// Runs compiler invocations for the task queue's worker.
pub trait CompilerBackend: Send + Sync + 'static {
  /// Run `call` to completion, writing the compiler's output to `log_path`.
  fn invoke(&self, call: &CompilerCall, log_path: &Path) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Backend spawning the configured compiler driver.
#[derive(Debug, Clone)]
pub struct CommandBackend {
  config: CompilerConfig,
}

impl CommandBackend {
  pub fn new(config: CompilerConfig) -> Self {
    Self { config }
  }

  /// Command-line arguments for `call`, program excluded.
  pub fn arguments(&self, call: &CompilerCall) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();

    match call.kind {
      JobKind::Compile => {
        args.extend(self.config.compile_flags.iter().map(OsString::from));
        for dir in &self.config.include_dirs {
          let mut flag = OsString::from("-I");
          flag.push(dir);
          args.push(flag);
        }
        if call.for_runtime {
          args.push("-DGD_RUNTIME".into());
        }
        if call.events_generated_code {
          // Generated code is noisy and not actionable by users.
          args.push("-w".into());
        }
        if call.optimize {
          args.push("-O2".into());
        }
        args.push("-c".into());
        if let Some(input) = &call.input_file {
          args.push(input.into());
        }
        args.push("-o".into());
        args.push(call.output_file.as_os_str().to_owned());
      }
      JobKind::Link => {
        args.push("-shared".into());
        if call.optimize {
          args.push("-s".into());
        }
        args.push("-o".into());
        args.push(call.output_file.as_os_str().to_owned());
        if let Some(input) = &call.input_file {
          args.push(input.into());
        }
        args.extend(call.extra_object_files.iter().map(|p| p.as_os_str().to_owned()));
        for dir in &call.lib_dirs {
          let mut flag = OsString::from("-L");
          flag.push(dir);
          args.push(flag);
        }
        args.extend(call.extra_lib_files.iter().map(|name| OsString::from(format!("-l{}", name))));
        args.extend(self.config.link_flags.iter().map(OsString::from));
      }
    }

    args
  }
}

impl CompilerBackend for CommandBackend {
  async fn invoke(&self, call: &CompilerCall, log_path: &Path) -> Result<(), BackendError> {
    let log_error = |source| BackendError::Log {
      path: log_path.to_path_buf(),
      source,
    };
    let stdout = File::create(log_path).map_err(log_error)?;
    let stderr = stdout.try_clone().map_err(log_error)?;

    let args = self.arguments(call);
    debug!(program = %self.config.program, args = ?args, "spawning compiler");

    let status = Command::new(&self.config.program)
      .args(&args)
      .stdin(Stdio::null())
      .stdout(Stdio::from(stdout))
      .stderr(Stdio::from(stderr))
      .kill_on_drop(true)
      .status()
      .await
      .map_err(|source| BackendError::Spawn {
        program: self.config.program.clone(),
        source,
      })?;

    if !status.success() {
      return Err(BackendError::Exited {
        program: self.config.program.clone(),
        code: status.code(),
      });
    }

    info!(output = ?call.output_file, "compiler finished");
    Ok(())
  }
}
