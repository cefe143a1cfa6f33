use std::fmt;

use super::TargetPlatform;

/// Operating system the tool itself runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// `None` on a host no target platform exists for.
  pub fn current() -> Option<Self> {
    Self::parse(std::env::consts::OS)
  }

  fn parse(name: &str) -> Option<Self> {
    match name {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "macos",
      Self::Windows => "windows",
    }
  }

  /// The platform games built on this host run on.
  pub fn native_target(&self) -> TargetPlatform {
    match self {
      Self::Windows => TargetPlatform::Windows,
      Self::Linux => TargetPlatform::Linux,
      Self::MacOs => TargetPlatform::Mac,
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
