//! Target CPU architectures.
//!
//! Every build is planned and dispatched per architecture, and every
//! artifact lands in an architecture-scoped subdirectory of the output
//! tree. The canonical on-disk directory name is the apk convention
//! (`x86_64`, `aarch64`, ...), which is also what [`std::fmt::Display`]
//! renders.

use serde::{Deserialize, Serialize};

/// A supported target CPU architecture.
///
/// # Example
///
/// ```
/// use apkforge_schema::Arch;
///
/// let arch: Arch = "arm64".parse().unwrap();
/// assert_eq!(arch.as_apk(), "aarch64");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 32-bit x86.
    X86,
    /// 64-bit x86 (amd64).
    X86_64,
    /// 64-bit ARM (arm64).
    Aarch64,
    /// 32-bit ARM hard-float (arm/v6).
    Armhf,
    /// 32-bit ARMv7 (arm/v7).
    Armv7,
    /// 64-bit little-endian POWER.
    Ppc64le,
    /// 64-bit RISC-V.
    Riscv64,
    /// IBM z/Architecture.
    S390x,
}

impl Arch {
    /// Canonical apk directory name, used to scope artifact paths.
    pub fn as_apk(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Armhf => "armhf",
            Self::Armv7 => "armv7",
            Self::Ppc64le => "ppc64le",
            Self::Riscv64 => "riscv64",
            Self::S390x => "s390x",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_apk())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    /// Parses either the apk name or the Docker-style alias
    /// (`amd64`, `arm64`, `arm/v7`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86" | "386" | "i386" => Ok(Self::X86),
            "x86_64" | "amd64" => Ok(Self::X86_64),
            "aarch64" | "arm64" => Ok(Self::Aarch64),
            "armhf" | "arm/v6" => Ok(Self::Armhf),
            "armv7" | "arm/v7" => Ok(Self::Armv7),
            "ppc64le" => Ok(Self::Ppc64le),
            "riscv64" => Ok(Self::Riscv64),
            "s390x" => Ok(Self::S390x),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}
