//! Packaging collaborators: the resource container, the archiver and the
//! file helpers the final stages use.

mod archive;
mod container;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

pub use archive::{Archiver, ZipArchiver};
pub use container::{ContainerPacker, DatEntry, DatFile, DatFilePacker};

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("i/o error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to copy {from} to {to}: {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("archive error on {path}: {source}")]
  Zip {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("{path} is not a valid container: {message}")]
  InvalidContainer { path: PathBuf, message: String },
}

impl PackageError {
  pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
    Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  /// The file the error is about.
  pub fn path(&self) -> &Path {
    match self {
      Self::Io { path, .. } | Self::Zip { path, .. } | Self::InvalidContainer { path, .. } => path,
      Self::Copy { from, .. } => from,
    }
  }
}

/// Names of the regular files directly inside `dir`, sorted.
pub fn list_files(dir: &Path) -> Result<Vec<String>, PackageError> {
  let mut names = Vec::new();
  for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
    let entry = entry.map_err(|e| PackageError::io(dir, e.into()))?;
    if entry.file_type().is_file() {
      names.push(entry.file_name().to_string_lossy().to_string());
    }
  }
  names.sort();
  Ok(names)
}

/// Copy `from` to `to`, overwriting.
pub fn copy_file(from: &Path, to: &Path) -> Result<(), PackageError> {
  std::fs::copy(from, to).map_err(|source| PackageError::Copy {
    from: from.to_path_buf(),
    to: to.to_path_buf(),
    source,
  })?;
  debug!(from = ?from, to = ?to, "copied");
  Ok(())
}

/// Write the raw concatenation of `parts` to `output`.
///
/// A part that cannot be read is skipped and reported in the returned list;
/// only a failure to write `output` itself is an error.
pub fn concatenate(output: &Path, parts: &[PathBuf]) -> Result<Vec<PackageError>, PackageError> {
  let file = File::create(output).map_err(|e| PackageError::io(output, e))?;
  let mut writer = BufWriter::new(file);
  let mut skipped = Vec::new();

  for part in parts {
    match File::open(part) {
      Ok(mut input) => {
        std::io::copy(&mut input, &mut writer).map_err(|e| PackageError::io(output, e))?;
      }
      Err(e) => skipped.push(PackageError::io(part, e)),
    }
  }

  writer.flush().map_err(|e| PackageError::io(output, e))?;
  debug!(output = ?output, parts = parts.len(), skipped = skipped.len(), "concatenated");
  Ok(skipped)
}
