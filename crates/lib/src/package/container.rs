//! The resource container shipped next to the game.
//!
//! Layout of a container written by [`DatFilePacker`]:
//!
//! ```text
//! "GDAT" | version: u32 LE | manifest length: u32 LE | manifest (JSON) | blobs...
//! ```
//!
//! The manifest is a JSON array of `{ "name", "size" }` and the blobs follow
//! in manifest order, without separators.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::PackageError;

const MAGIC: &[u8; 4] = b"GDAT";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 12;

/// Builds the container from files of a directory.
pub trait ContainerPacker: Send + Sync {
  /// Pack `files` (names relative to `source_dir`) into `output`.
  fn create(&self, files: &[String], source_dir: &Path, output: &Path) -> Result<(), PackageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatEntry {
  pub name: String,
  pub size: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DatFilePacker;

impl ContainerPacker for DatFilePacker {
  fn create(&self, files: &[String], source_dir: &Path, output: &Path) -> Result<(), PackageError> {
    let mut manifest = Vec::with_capacity(files.len());
    for name in files {
      let path = source_dir.join(name);
      let metadata = std::fs::metadata(&path).map_err(|e| PackageError::io(&path, e))?;
      manifest.push(DatEntry {
        name: name.clone(),
        size: metadata.len(),
      });
    }

    let manifest_bytes = serde_json::to_vec(&manifest).map_err(|e| PackageError::io(output, e.into()))?;
    let manifest_len = u32::try_from(manifest_bytes.len()).map_err(|_| PackageError::InvalidContainer {
      path: output.to_path_buf(),
      message: "manifest too large".to_string(),
    })?;

    let file = File::create(output).map_err(|e| PackageError::io(output, e))?;
    let mut writer = BufWriter::new(file);
    let write_err = |e| PackageError::io(output, e);

    writer.write_all(MAGIC).map_err(write_err)?;
    writer.write_all(&VERSION.to_le_bytes()).map_err(write_err)?;
    writer.write_all(&manifest_len.to_le_bytes()).map_err(write_err)?;
    writer.write_all(&manifest_bytes).map_err(write_err)?;

    for entry in &manifest {
      let path = source_dir.join(&entry.name);
      let mut input = File::open(&path).map_err(|e| PackageError::io(&path, e))?;
      let copied = std::io::copy(&mut input, &mut writer).map_err(write_err)?;
      if copied != entry.size {
        return Err(PackageError::InvalidContainer {
          path: path.clone(),
          message: format!("size changed while packing ({} != {})", copied, entry.size),
        });
      }
    }

    writer.flush().map_err(write_err)?;
    info!(output = ?output, files = manifest.len(), "container created");
    Ok(())
  }
}

/// A container read back into memory.
#[derive(Debug, Clone)]
pub struct DatFile {
  entries: Vec<DatEntry>,
  data: Vec<u8>,
  /// Offset of each entry's blob in `data`.
  offsets: Vec<usize>,
}

impl DatFile {
  pub fn open(path: &Path) -> Result<Self, PackageError> {
    let mut bytes = Vec::new();
    File::open(path)
      .and_then(|mut f| f.read_to_end(&mut bytes))
      .map_err(|e| PackageError::io(path, e))?;
    Self::parse(path, bytes)
  }

  fn parse(path: &Path, bytes: Vec<u8>) -> Result<Self, PackageError> {
    let invalid = |message: &str| PackageError::InvalidContainer {
      path: path.to_path_buf(),
      message: message.to_string(),
    };

    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
      return Err(invalid("bad magic"));
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != VERSION {
      return Err(invalid(&format!("unsupported version {}", version)));
    }
    let manifest_len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let manifest_end = HEADER_LEN
      .checked_add(manifest_len)
      .filter(|end| *end <= bytes.len())
      .ok_or_else(|| invalid("truncated manifest"))?;

    let entries: Vec<DatEntry> =
      serde_json::from_slice(&bytes[HEADER_LEN..manifest_end]).map_err(|e| invalid(&e.to_string()))?;

    let mut offsets = Vec::with_capacity(entries.len());
    let mut offset = manifest_end;
    for entry in &entries {
      offsets.push(offset);
      offset = usize::try_from(entry.size)
        .ok()
        .and_then(|size| offset.checked_add(size))
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| invalid(&format!("truncated blob for {}", entry.name)))?;
    }

    Ok(Self {
      entries,
      data: bytes,
      offsets,
    })
  }

  pub fn entries(&self) -> &[DatEntry] {
    &self.entries
  }

  /// Contents of the entry named `name`.
  pub fn read(&self, name: &str) -> Option<&[u8]> {
    let index = self.entries.iter().position(|e| e.name == name)?;
    let start = self.offsets[index];
    let end = start + self.entries[index].size as usize;
    self.data.get(start..end)
  }
}
