//! Runtime files and final packaging.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::execute::BuildRun;
use super::types::BuildError;
use crate::consts::{ARCHIVE_FILE, COMPRESSED_LAUNCHER, DYNEXT_FILE};
use crate::package::{self, PackageError};
use crate::platform::TargetPlatform;

/// One file copied into the working directory.
struct PlatformFile {
  from: PathBuf,
  to: String,
  /// The game cannot start without it.
  required: bool,
}

impl PlatformFile {
  fn required(from: PathBuf, to: impl Into<String>) -> Self {
    Self {
      from,
      to: to.into(),
      required: true,
    }
  }

  fn optional(from: PathBuf, to: impl Into<String>) -> Self {
    Self {
      from,
      to: to.into(),
      required: false,
    }
  }
}

fn file_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_default()
}

impl BuildRun<'_> {
  /// The self-extracting executable can only carry a Windows-only export.
  fn compressed(&self) -> bool {
    self.options.compress && self.options.targets.iter().all(|t| t.supports_compression())
  }

  pub(super) fn copy_platform_files(&mut self) -> Result<(), BuildError> {
    self.sink.on_message("Exporting game...", None);
    if self.options.compress && !self.compressed() {
      warn!(targets = ?self.options.targets, "compression needs Windows as the only target, copying files instead");
      self.sink.on_message(
        "Compression skipped",
        Some("only a Windows-only export can be compressed, files are copied instead"),
      );
    }

    let mut files = self.extension_files();
    if self.project.use_external_source_files {
      files.push(PlatformFile::optional(
        self.orchestrator.config.dynext_file(),
        DYNEXT_FILE,
      ));
    }
    files.extend(self.runtime_files());

    for file in files {
      let to = self.working_dir.join(&file.to);
      if let Err(source) = package::copy_file(&file.from, &to) {
        self.record(BuildError::PlatformFileCopyFailed {
          path: file.from,
          required: file.required,
          source,
        })?;
      }
    }

    self.sink.on_percent_update(95.0);
    Ok(())
  }

  /// Runtime files of used extensions, for every selected target.
  fn extension_files(&self) -> Vec<PlatformFile> {
    let dir = self.orchestrator.config.extensions_dir();
    let mut files = Vec::new();

    for name in &self.project.used_extensions {
      let Some(extension) = self.orchestrator.extensions.get(name) else {
        debug!(extension = %name, "unknown extension, nothing to copy");
        continue;
      };
      let Some(runtime) = extension.runtime() else {
        continue;
      };

      if extension.ships_runtime_file() {
        let mut names: Vec<String> = self
          .options
          .targets
          .iter()
          .map(|target| extension.runtime_file_name(target))
          .collect();
        names.dedup();
        for runtime_file in names {
          files.push(PlatformFile::optional(dir.join(&runtime_file), runtime_file));
        }
      }

      for (target, path) in &runtime.supplementary_runtime_files {
        if self.options.targets.contains(*target) {
          files.push(PlatformFile::optional(path.clone(), file_name(path)));
        }
      }
    }

    files
  }

  /// Launchers and runtime libraries of the selected targets.
  fn runtime_files(&self) -> Vec<PlatformFile> {
    let config = &self.orchestrator.config;
    let runtime = config.runtime_dir();
    let mac_runtime = config.mac_runtime_dir();
    let mut files = Vec::new();

    for target in self.options.targets.iter() {
      match target {
        TargetPlatform::Windows => {
          let launcher = if self.compressed() {
            COMPRESSED_LAUNCHER.to_string()
          } else {
            self.project.win_executable_name()
          };
          files.push(PlatformFile::required(runtime.join("PlayWin.exe"), launcher));
          files.push(PlatformFile::required(runtime.join("GDCpp.dll"), "GDCpp.dll"));
        }
        TargetPlatform::Linux => {
          files.push(PlatformFile::required(runtime.join("ExeLinux"), "ExeLinux"));
          files.push(PlatformFile::optional(
            runtime.join("PlayLinux"),
            self.project.linux_executable_name(),
          ));
          files.push(PlatformFile::required(runtime.join("libGDCpp.so"), "libGDCpp.so"));
        }
        TargetPlatform::Mac => {
          files.push(PlatformFile::required(mac_runtime.join("MacExe"), self.project.mac_executable_name()));
          files.push(PlatformFile::required(mac_runtime.join("libGDCpp.dylib"), "libGDCpp.dylib"));
        }
      }
    }

    files
  }

  pub(super) fn package(&mut self) -> Result<(), BuildError> {
    let out_dir = self.options.out_dir.clone();
    if let Err(source) = std::fs::create_dir_all(&out_dir) {
      return Err(BuildError::PackagingFailed {
        path: out_dir.clone(),
        fatal: true,
        source: PackageError::Io { path: out_dir, source },
      });
    }

    if self.compressed() {
      self.package_compressed(&out_dir)
    } else {
      self.package_verbatim(&out_dir)
    }
  }

  fn package_verbatim(&mut self, out_dir: &Path) -> Result<(), BuildError> {
    let files = match package::list_files(&self.working_dir) {
      Ok(files) => files,
      Err(source) => {
        return Err(BuildError::PackagingFailed {
          path: self.working_dir.clone(),
          fatal: true,
          source,
        });
      }
    };

    for name in files {
      let to = out_dir.join(&name);
      match package::copy_file(&self.working_dir.join(&name), &to) {
        Ok(()) => self.artifacts.push(to),
        Err(source) => self.record(BuildError::PackagingFailed {
          path: to,
          fatal: false,
          source,
        })?,
      }
    }

    info!(out_dir = ?out_dir, files = self.artifacts.len(), "game exported");
    Ok(())
  }

  fn package_compressed(&mut self, out_dir: &Path) -> Result<(), BuildError> {
    self.sink.on_message("Exporting game... ( Compressing )", None);
    let archive = self.working_dir.join(ARCHIVE_FILE);
    if let Err(source) = self.orchestrator.archiver.archive(&self.working_dir, &archive) {
      self.record(BuildError::PackagingFailed {
        path: archive.clone(),
        fatal: false,
        source,
      })?;
    }

    let config = &self.orchestrator.config;
    let executable = out_dir.join(self.project.win_executable_name());
    let parts = vec![config.sfx_stub(), config.sfx_config(), archive];

    match package::concatenate(&executable, &parts) {
      Ok(skipped) => {
        self.artifacts.push(executable);
        for source in skipped {
          self.record(BuildError::PackagingFailed {
            path: source.path().to_path_buf(),
            fatal: false,
            source,
          })?;
        }
      }
      Err(source) => self.record(BuildError::PackagingFailed {
        path: executable,
        fatal: false,
        source,
      })?,
    }

    info!(out_dir = ?out_dir, "compressed executable written");
    Ok(())
  }
}
