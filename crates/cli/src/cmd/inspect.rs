use std::path::Path;

use anyhow::{Context, Result};

use gamepack_lib::package::DatFile;

use crate::output::{Status, format_bytes, print_json, print_stat, status};

pub fn cmd_inspect(container: &Path, json: bool) -> Result<()> {
  let file = DatFile::open(container).with_context(|| format!("Failed to open container {}", container.display()))?;

  if json {
    return print_json(&file.entries());
  }

  status(Status::Info, &container.display().to_string());
  for entry in file.entries() {
    println!("  {:<40} {:>10}", entry.name, format_bytes(entry.size));
  }
  let total: u64 = file.entries().iter().map(|e| e.size).sum();
  println!();
  print_stat("Entries", &file.entries().len().to_string());
  print_stat("Total", &format_bytes(total));
  Ok(())
}
