//! Host platform detection.
//!
//! The plugin registry serves per-platform wheels keyed by an
//! `{os}-{arch}` tag plus a Python ABI tag (`cp312`).

use serde::Serialize;

/// Environment variable overriding the detected Python ABI tag.
pub const ABI_ENV_VAR: &str = "GGSHIELD_PLUGIN_ABI";

/// ABI tag used when no override is set.
pub const DEFAULT_ABI: &str = "cp312";

/// Wildcard platform tag accepted by every host.
pub const ANY_PLATFORM: &str = "any-any";

/// The OS / architecture / ABI triple of the running host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformInfo {
    /// Operating system (`linux`, `macos`, `windows`).
    pub os: String,
    /// CPU architecture (`x86_64`, `arm64`).
    pub arch: String,
    /// Python ABI tag (`cp312`).
    pub abi: String,
}

impl PlatformInfo {
    /// Build a platform triple from explicit values.
    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>, abi: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            abi: abi.into(),
        }
    }

    /// Detect the running host.
    #[must_use]
    pub fn detect() -> Self {
        let abi = std::env::var(ABI_ENV_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ABI.to_string());
        Self::new(
            normalize_os(std::env::consts::OS),
            normalize_arch(std::env::consts::ARCH),
            abi,
        )
    }

    /// `{os}-{arch}` tag as listed in `supported_platforms`.
    #[must_use]
    pub fn tag(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    /// Whether a wheel file name targets this platform.
    ///
    /// Looks at the wheel's platform tag (last dash-separated field), so
    /// `pkg-1.0-cp312-cp312-manylinux_2_17_x86_64.whl` matches `linux-x86_64`.
    #[must_use]
    pub fn matches_wheel(&self, filename: &str) -> bool {
        let Some(stem) = filename.strip_suffix(".whl") else {
            return false;
        };
        let Some(platform_tag) = stem.rsplit('-').next() else {
            return false;
        };
        let platform_tag = platform_tag.to_ascii_lowercase();

        let os_hit = os_wheel_markers(&self.os)
            .iter()
            .any(|m| platform_tag.contains(m));
        let arch_hit = arch_wheel_markers(&self.arch)
            .iter()
            .any(|m| platform_tag.contains(m));
        os_hit && arch_hit
    }
}

fn normalize_os(os: &str) -> String {
    match os {
        "macos" | "darwin" => "macos".to_string(),
        other => other.to_string(),
    }
}

fn normalize_arch(arch: &str) -> String {
    match arch {
        "aarch64" | "arm64" => "arm64".to_string(),
        "x86_64" | "amd64" => "x86_64".to_string(),
        other => other.to_string(),
    }
}

fn os_wheel_markers(os: &str) -> &'static [&'static str] {
    match os {
        "linux" => &["linux"],
        "macos" => &["macosx"],
        "windows" => &["win"],
        _ => &[],
    }
}

fn arch_wheel_markers(arch: &str) -> &'static [&'static str] {
    match arch {
        "x86_64" => &["x86_64", "amd64"],
        "arm64" => &["aarch64", "arm64", "universal2"],
        _ => &[],
    }
}
