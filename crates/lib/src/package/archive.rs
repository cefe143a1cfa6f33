//! Archiving of the working directory for self-extracting executables.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::PackageError;

pub trait Archiver: Send + Sync {
  /// Archive every file under `source_dir` into `output`. `output` itself is skipped if it lies inside.
  fn archive(&self, source_dir: &Path, output: &Path) -> Result<(), PackageError>;
}

/// Deflate-compressed zip archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
  fn archive(&self, source_dir: &Path, output: &Path) -> Result<(), PackageError> {
    let file = File::create(output).map_err(|e| PackageError::io(output, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let zip_err = |source| PackageError::Zip {
      path: output.to_path_buf(),
      source,
    };

    let mut count = 0usize;
    for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
      let entry = entry.map_err(|e| PackageError::io(source_dir, e.into()))?;
      let path = entry.path();
      if !entry.file_type().is_file() || path == output {
        continue;
      }

      let Ok(relative) = path.strip_prefix(source_dir) else {
        continue;
      };
      // Zip entry names always use forward slashes.
      let name = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

      zip.start_file(name.as_str(), options).map_err(zip_err)?;
      let mut input = File::open(path).map_err(|e| PackageError::io(path, e))?;
      std::io::copy(&mut input, &mut zip).map_err(|e| PackageError::io(output, e))?;
      debug!(entry = %name, "archived");
      count += 1;
    }

    zip.finish().map_err(zip_err)?;
    info!(output = ?output, files = count, "archive created");
    Ok(())
  }
}
