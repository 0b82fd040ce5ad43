//! Host and target platform identification.
//!
//! The host platform is what `loom` runs on; the target platform (selected
//! with the `loom.platform` setting) decides how exported commands are wrapped.

pub mod arch;
pub mod os;

use arch::Arch;
use os::Os;
use std::fmt;

use crate::consts::OPT_PLATFORM;
use crate::settings::Settings;

/// Platform identifier combining architecture and OS (e.g., "aarch64-darwin")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// Returns the platform triple for the current system (e.g., "aarch64-darwin")
pub fn platform_triple() -> Option<String> {
  Platform::current().map(|p| p.triple())
}

/// Resolve the OS exported commands are meant to run on.
///
/// Reads `loom.platform` and falls back to the host OS. An unknown value is
/// reported back as the error string.
pub fn target_os(settings: &Settings) -> Result<Os, String> {
  match settings.get(OPT_PLATFORM) {
    Some(name) => name.parse(),
    None => Os::current().ok_or_else(|| format!("unsupported host platform: {}", std::env::consts::OS)),
  }
}
