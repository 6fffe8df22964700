//! Mapping of the running host onto the `{os}_{arch}` naming used by
//! geoipupdate release archives.

use serde_derive::Serialize;
use std::{env::consts, fmt, str::FromStr};

use crate::errors::{ErrorKind, UpdaterError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Os {
    Darwin,
    Linux,
    Windows,
    FreeBsd,
    OpenBsd,
}

impl Os {
    /// Map a Rust `target_os` value onto a release OS.
    pub fn from_target(os: &str) -> Result<Self, UpdaterError> {
        match os {
            "macos" => Ok(Os::Darwin),
            "linux" => Ok(Os::Linux),
            "windows" => Ok(Os::Windows),
            "freebsd" => Ok(Os::FreeBsd),
            "openbsd" => Ok(Os::OpenBsd),
            other => Err(UpdaterError::new(
                ErrorKind::UnsupportedPlatform,
                format!("no geoipupdate release for OS {:?}", other),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Os::Darwin => "darwin",
            Os::Linux => "linux",
            Os::Windows => "windows",
            Os::FreeBsd => "freebsd",
            Os::OpenBsd => "openbsd",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arch {
    Amd64,
    I386,
    Arm64,
    Armv6,
}

impl Arch {
    /// Map a Rust `target_arch` value onto a release architecture.
    ///
    /// Every 32-bit ARM host is treated as ARMv6, the lowest revision that
    /// upstream publishes.
    pub fn from_target(arch: &str) -> Result<Self, UpdaterError> {
        match arch {
            "x86_64" => Ok(Arch::Amd64),
            "x86" => Ok(Arch::I386),
            "aarch64" => Ok(Arch::Arm64),
            "arm" => Ok(Arch::Armv6),
            other => Err(UpdaterError::new(
                ErrorKind::UnsupportedArchitecture,
                format!("no geoipupdate release for architecture {:?}", other),
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::I386 => "386",
            Arch::Arm64 => "arm64",
            Arch::Armv6 => "armv6",
        }
    }
}

/// The `{os}_{arch}` token that release asset names contain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlatformSuffix(String);

impl PlatformSuffix {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self(format!("{}_{}", os.as_str(), arch.as_str()))
    }

    pub fn from_target(os: &str, arch: &str) -> Result<Self, UpdaterError> {
        Ok(Self::new(Os::from_target(os)?, Arch::from_target(arch)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformSuffix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Explicit suffixes are taken verbatim, for installs targeting another host.
impl FromStr for PlatformSuffix {
    type Err = UpdaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(UpdaterError::new(
                ErrorKind::UnsupportedPlatform,
                "empty platform suffix",
            ));
        }
        Ok(Self(s.to_owned()))
    }
}

/// Suffix for the host this binary was compiled for.
pub fn resolve_platform_suffix() -> Result<PlatformSuffix, UpdaterError> {
    PlatformSuffix::from_target(consts::OS, consts::ARCH)
}
