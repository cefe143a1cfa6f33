//! Target platforms and host detection.

pub mod os;
pub mod paths;

use std::fmt;

use serde::{Deserialize, Serialize};

use os::Os;

/// A platform a build can produce a runnable game for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
  Windows,
  Linux,
  Mac,
}

impl TargetPlatform {
  pub const ALL: [TargetPlatform; 3] = [TargetPlatform::Windows, TargetPlatform::Linux, TargetPlatform::Mac];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Windows => "windows",
      Self::Linux => "linux",
      Self::Mac => "mac",
    }
  }

  /// Whether the platform supports a self-extracting compressed executable.
  pub fn supports_compression(&self) -> bool {
    matches!(self, Self::Windows)
  }
}

impl fmt::Display for TargetPlatform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Set of selected targets. The flags are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSet {
  pub windows: bool,
  pub linux: bool,
  pub mac: bool,
}

impl TargetSet {
  /// Targets supported when building on the current host. Empty on an unknown OS.
  pub fn for_host() -> Self {
    Os::current().map(|os| Self::only(os.native_target())).unwrap_or_default()
  }

  pub fn only(target: TargetPlatform) -> Self {
    let mut set = Self::default();
    set.insert(target);
    set
  }

  pub fn insert(&mut self, target: TargetPlatform) {
    match target {
      TargetPlatform::Windows => self.windows = true,
      TargetPlatform::Linux => self.linux = true,
      TargetPlatform::Mac => self.mac = true,
    }
  }

  pub fn contains(&self, target: TargetPlatform) -> bool {
    match target {
      TargetPlatform::Windows => self.windows,
      TargetPlatform::Linux => self.linux,
      TargetPlatform::Mac => self.mac,
    }
  }

  pub fn is_empty(&self) -> bool {
    !self.windows && !self.linux && !self.mac
  }

  /// Selected targets in a fixed order.
  pub fn iter(&self) -> impl Iterator<Item = TargetPlatform> + '_ {
    TargetPlatform::ALL.into_iter().filter(|t| self.contains(*t))
  }
}

impl FromIterator<TargetPlatform> for TargetSet {
  fn from_iter<I: IntoIterator<Item = TargetPlatform>>(iter: I) -> Self {
    let mut set = Self::default();
    for target in iter {
      set.insert(target);
    }
    set
  }
}
