//! Target platform descriptor.
//!
//! A run always builds for exactly one operating system and bit-width, and
//! either includes DFHack or does not. Component eligibility, asset selection
//! and OS-keyed extraction rules are all decided against this descriptor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating system a pack is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    #[serde(alias = "windows")]
    Win,
    Linux,
    #[serde(alias = "mac", alias = "macos", alias = "darwin")]
    Osx,
}

impl Os {
    /// Detect the OS this binary was compiled for.
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(target_os = "windows") {
            Self::Win
        } else if cfg!(target_os = "macos") {
            Self::Osx
        } else {
            Self::Linux
        }
    }

    /// Key used in asset file names and in `{key}_exe` manifest fields.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Linux => "linux",
            Self::Osx => "osx",
        }
    }

    /// Extension that identifies a native installer or launcher for this OS.
    #[must_use]
    pub const fn typical_extension(self) -> &'static str {
        match self {
            Self::Win => ".exe",
            Self::Osx => ".dmg",
            Self::Linux => ".sh",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" | "windows" => Ok(Self::Win),
            "linux" => Ok(Self::Linux),
            "osx" | "mac" | "macos" | "darwin" => Ok(Self::Osx),
            other => Err(format!("unknown operating system '{other}'")),
        }
    }
}

/// Pointer width of the pack's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BitsRepr", into = "String")]
pub enum Bits {
    B32,
    B64,
}

impl Bits {
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(target_pointer_width = "32") { Self::B32 } else { Self::B64 }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::B32 => "32",
            Self::B64 => "64",
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::B32 => Self::B64,
            Self::B64 => Self::B32,
        }
    }

    /// Key of the architecture variant block in component configuration.
    #[must_use]
    pub fn variant_key(self) -> String {
        format!("{}bit", self.as_str())
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches("bit") {
            "32" => Ok(Self::B32),
            "64" => Ok(Self::B64),
            other => Err(format!("unknown bit-width '{other}' (expected 32 or 64)")),
        }
    }
}

/// Bit-widths appear both as YAML integers (`32`) and as strings (`"64"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum BitsRepr {
    Int(u64),
    Str(String),
}

impl TryFrom<BitsRepr> for Bits {
    type Error = String;

    fn try_from(value: BitsRepr) -> Result<Self, Self::Error> {
        match value {
            BitsRepr::Int(n) => n.to_string().parse(),
            BitsRepr::Str(s) => s.parse(),
        }
    }
}

impl From<Bits> for String {
    fn from(value: Bits) -> Self {
        value.as_str().to_string()
    }
}

/// The platform a single run builds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPlatform {
    pub os: Os,
    pub bits: Bits,
    /// Whether DFHack is wanted in this run at all.
    #[serde(default = "default_dfhack")]
    pub dfhack: bool,
}

const fn default_dfhack() -> bool {
    true
}

impl TargetPlatform {
    #[must_use]
    pub const fn new(os: Os, bits: Bits, dfhack: bool) -> Self {
        Self {
            os,
            bits,
            dfhack,
        }
    }

    /// Descriptor for the machine running the build.
    #[must_use]
    pub const fn host() -> Self {
        Self::new(Os::host(), Bits::host(), true)
    }
}

impl Default for TargetPlatform {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}bit", self.os, self.bits)?;
        if !self.dfhack {
            f.write_str(" (no DFHack)")?;
        }
        Ok(())
    }
}
