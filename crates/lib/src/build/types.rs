//! Types for a full project build.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::deps::DependencyError;
use crate::package::PackageError;
use crate::platform::TargetSet;
use crate::project::ProjectError;
use crate::unit::UnitId;

/// Pipeline stages, in the order a build enters them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildStage {
  Init,
  ValidateTargets,
  PrepareResources,
  CompileUnits,
  CopyResources,
  StripAndEncrypt,
  Link,
  CopyPlatformFiles,
  Package,
  Done,
}

impl BuildStage {
  pub fn as_str(&self) -> &'static str {
    match self {
      BuildStage::Init => "init",
      BuildStage::ValidateTargets => "validate-targets",
      BuildStage::PrepareResources => "prepare-resources",
      BuildStage::CompileUnits => "compile-units",
      BuildStage::CopyResources => "copy-resources",
      BuildStage::StripAndEncrypt => "strip-and-encrypt",
      BuildStage::Link => "link",
      BuildStage::CopyPlatformFiles => "copy-platform-files",
      BuildStage::Package => "package",
      BuildStage::Done => "done",
    }
  }
}

impl fmt::Display for BuildStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Everything that can go wrong in a build.
///
/// Whether an error stops the build is decided by [`BuildError::is_fatal`].
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("no target system selected")]
  NoTargetSelected,

  #[error("circular dependency detected for {unit} (cycle through {})", .cycle.join(", "))]
  CircularDependency { unit: UnitId, cycle: Vec<String> },

  #[error("compilation of {unit} failed, see the compiler output in {}", .log.display())]
  CompileFailed { unit: UnitId, log: PathBuf },

  #[error("linking of the project failed, see the compiler output in {}", .log.display())]
  LinkFailed { log: PathBuf },

  #[error("unable to copy resource {}: {source}", .path.display())]
  ResourceCopyFailed {
    path: PathBuf,
    #[source]
    source: PackageError,
  },

  #[error("unable to copy {}{}: {source}", .path.display(), if *.required { " (required to run the game)" } else { "" })]
  PlatformFileCopyFailed {
    path: PathBuf,
    /// The game cannot start without this file.
    required: bool,
    #[source]
    source: PackageError,
  },

  #[error("packaging of {} failed: {source}", .path.display())]
  PackagingFailed {
    path: PathBuf,
    fatal: bool,
    #[source]
    source: PackageError,
  },

  #[error("failed to write project descriptor: {0}")]
  Descriptor(#[from] ProjectError),

  #[error("failed to encrypt project descriptor: {0}")]
  Encryption(#[from] CryptoError),

  #[error("working directory {}: {source}", .path.display())]
  WorkingDirectory {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("build cancelled")]
  Cancelled,

  #[error("compiler job timed out after {after:?}")]
  Timeout { after: Duration },
}

impl BuildError {
  /// Fatal errors stop the pipeline; the others are recorded and the build goes on.
  pub fn is_fatal(&self) -> bool {
    match self {
      BuildError::NoTargetSelected
      | BuildError::CircularDependency { .. }
      | BuildError::CompileFailed { .. }
      | BuildError::LinkFailed { .. }
      | BuildError::Descriptor(_)
      | BuildError::Encryption(_)
      | BuildError::Cancelled
      | BuildError::Timeout { .. } => true,
      BuildError::PlatformFileCopyFailed { required, .. } => *required,
      BuildError::PackagingFailed { fatal, .. } => *fatal,
      BuildError::ResourceCopyFailed { .. } | BuildError::WorkingDirectory { .. } => false,
    }
  }
}

impl From<DependencyError> for BuildError {
  fn from(err: DependencyError) -> Self {
    match err {
      DependencyError::CircularDependency { unit, cycle } => BuildError::CircularDependency { unit, cycle },
      DependencyError::UnknownUnit(unit) => BuildError::CircularDependency { cycle: vec![unit.to_string()], unit },
    }
  }
}

/// What to build and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
  pub out_dir: PathBuf,
  pub targets: TargetSet,
  /// Produce a single self-extracting executable where the target supports it.
  pub compress: bool,
  pub optimize: bool,
}

impl BuildOptions {
  /// Build for the host platform into `out_dir`, uncompressed.
  pub fn new(out_dir: impl Into<PathBuf>) -> Self {
    Self {
      out_dir: out_dir.into(),
      targets: TargetSet::for_host(),
      compress: false,
      optimize: false,
    }
  }

  pub fn with_targets(mut self, targets: TargetSet) -> Self {
    self.targets = targets;
    self
  }

  pub fn with_compression(mut self, compress: bool) -> Self {
    self.compress = compress;
    self
  }

  pub fn with_optimization(mut self, optimize: bool) -> Self {
    self.optimize = optimize;
    self
  }
}

#[derive(Debug)]
pub enum BuildOutcome {
  Done,
  Failed(BuildError),
}

/// Result of one build.
#[derive(Debug)]
pub struct BuildReport {
  pub outcome: BuildOutcome,
  /// Last stage entered. For a failed build, the stage that failed.
  pub stage: BuildStage,
  /// Non-fatal errors, in the order they were recorded.
  pub warnings: Vec<BuildError>,
  /// Files written to the output directory.
  pub artifacts: Vec<PathBuf>,
  pub jobs_submitted: usize,
}

impl BuildReport {
  /// Done, with nothing recorded along the way.
  pub fn is_success(&self) -> bool {
    matches!(self.outcome, BuildOutcome::Done) && self.warnings.is_empty()
  }

  pub fn succeeded_with_warnings(&self) -> bool {
    matches!(self.outcome, BuildOutcome::Done) && !self.warnings.is_empty()
  }

  pub fn error(&self) -> Option<&BuildError> {
    match &self.outcome {
      BuildOutcome::Done => None,
      BuildOutcome::Failed(err) => Some(err),
    }
  }
}
