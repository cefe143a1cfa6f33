//! Implementation of the `gamepack decrypt` command.
//!
//! Accepts either the encrypted descriptor itself or a container holding it.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use gamepack_lib::consts::DESCRIPTOR_ENCRYPTED;
use gamepack_lib::crypto;
use gamepack_lib::package::DatFile;

use crate::output::{Status, status};

pub fn cmd_decrypt(input: &Path, output: Option<&Path>) -> Result<()> {
  let plaintext = match DatFile::open(input) {
    Ok(container) => {
      let ciphertext = container
        .read(DESCRIPTOR_ENCRYPTED)
        .with_context(|| format!("{} holds no '{}' entry", input.display(), DESCRIPTOR_ENCRYPTED))?;
      crypto::strip_padding(crypto::decrypt(ciphertext).context("Failed to decrypt descriptor")?)
    }
    Err(err) => {
      debug!(error = %err, "not a container, decrypting as a descriptor");
      crypto::decrypt_file(input).context("Failed to decrypt descriptor")?
    }
  };

  match output {
    Some(path) => {
      std::fs::write(path, &plaintext).with_context(|| format!("Failed to write {}", path.display()))?;
      status(Status::Success, &format!("Decrypted descriptor written to {}", path.display()));
    }
    None => {
      let mut stdout = std::io::stdout().lock();
      stdout.write_all(&plaintext).context("Failed to write to stdout")?;
      stdout.flush().context("Failed to write to stdout")?;
    }
  }
  Ok(())
}
