//! Descriptor encryption.
//!
//! The shipped project descriptor is AES-192-CBC encrypted with a key and IV
//! fixed in the tool, because the runtime decrypts it with the same constants.
//! This keeps the descriptor from casual inspection only: anyone holding a
//! copy of the tool can decrypt it.

use std::path::{Path, PathBuf};

use aes::cipher::block_padding::NoPadding;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use thiserror::Error;
use tracing::debug;

type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;

pub const BLOCK_SIZE: usize = 16;

const KEY: [u8; 24] = *b"-P:j$4t&OHIUVM/Z+u4DeDP.";
const IV: [u8; BLOCK_SIZE] = [
  0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
];

#[derive(Debug, Error)]
pub enum CryptoError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("ciphertext length {0} is not a multiple of the block size")]
  Length(usize),
}

/// Encrypt `plaintext`, zero-padded up to a whole number of blocks.
pub fn encrypt(plaintext: &[u8]) -> Vec<u8> {
  let padded_len = plaintext.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
  let mut buffer = plaintext.to_vec();
  buffer.resize(padded_len, 0);

  let mut encryptor = Aes192CbcEnc::new(&KEY.into(), &IV.into());
  for block in buffer.chunks_exact_mut(BLOCK_SIZE) {
    encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
  }
  buffer
}

/// Decrypt `ciphertext`. Padding zeros are kept; see [`strip_padding`].
pub fn decrypt(ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
  if ciphertext.len() % BLOCK_SIZE != 0 {
    return Err(CryptoError::Length(ciphertext.len()));
  }

  let mut buffer = ciphertext.to_vec();
  let len = Aes192CbcDec::new(&KEY.into(), &IV.into())
    .decrypt_padded_mut::<NoPadding>(&mut buffer)
    .map_err(|_| CryptoError::Length(ciphertext.len()))?
    .len();
  buffer.truncate(len);
  Ok(buffer)
}

/// Drop the trailing zero bytes added by [`encrypt`].
pub fn strip_padding(mut plaintext: Vec<u8>) -> Vec<u8> {
  while plaintext.last() == Some(&0) {
    plaintext.pop();
  }
  plaintext
}

/// Encrypt the file at `input` into `output`.
pub fn encrypt_file(input: &Path, output: &Path) -> Result<(), CryptoError> {
  let plaintext = std::fs::read(input).map_err(|source| CryptoError::Read {
    path: input.to_path_buf(),
    source,
  })?;
  let ciphertext = encrypt(&plaintext);
  std::fs::write(output, &ciphertext).map_err(|source| CryptoError::Write {
    path: output.to_path_buf(),
    source,
  })?;
  debug!(input = ?input, output = ?output, size = ciphertext.len(), "descriptor encrypted");
  Ok(())
}

/// Decrypt the file at `input`, padding removed.
pub fn decrypt_file(input: &Path) -> Result<Vec<u8>, CryptoError> {
  let ciphertext = std::fs::read(input).map_err(|source| CryptoError::Read {
    path: input.to_path_buf(),
    source,
  })?;
  decrypt(&ciphertext).map(strip_padding)
}
