use std::fmt;

/// Host CPU architecture, exposed to build scripts as `loom.arch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X86,
  X86_64,
  Arm,
  Aarch64,
  Riscv64,
}

impl Arch {
  pub fn current() -> Option<Self> {
    Self::from_rust(std::env::consts::ARCH)
  }

  /// Map an architecture name as spelled by `std::env::consts::ARCH`.
  pub fn from_rust(name: &str) -> Option<Self> {
    Some(match name {
      "x86" => Self::X86,
      "x86_64" => Self::X86_64,
      "arm" => Self::Arm,
      "aarch64" => Self::Aarch64,
      "riscv64" => Self::Riscv64,
      _ => return None,
    })
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86 => "x86",
      Self::X86_64 => "x86_64",
      Self::Arm => "arm",
      Self::Aarch64 => "aarch64",
      Self::Riscv64 => "riscv64",
    }
  }

  pub fn pointer_width(&self) -> u32 {
    match self {
      Self::X86 | Self::Arm => 32,
      Self::X86_64 | Self::Aarch64 | Self::Riscv64 => 64,
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
