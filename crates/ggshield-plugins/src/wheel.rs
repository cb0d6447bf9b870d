//! Wheel (`.whl`) inspection without executing package code.
//!
//! A wheel is a zip archive. Metadata lives in `{name}-{version}.dist-info/`:
//! `METADATA` holds RFC 822 style headers and `entry_points.txt` holds INI
//! sections. ggshield plugins declare themselves under `[ggshield.plugins]`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use zip::ZipArchive;

use crate::error::{PluginError, PluginResult};

/// Entry-point group under which plugins are declared.
pub const PLUGIN_ENTRY_POINT_GROUP: &str = "ggshield.plugins";

/// Maximum number of entries extracted from a wheel.
const MAX_ENTRY_COUNT: usize = 10_000;

/// Maximum total extracted size (500 MB).
const MAX_EXTRACTED_SIZE: u64 = 500_000_000;

/// Maximum size of a metadata member read into memory (1 MB).
const MAX_METADATA_SIZE: u64 = 1_048_576;

static METADATA_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^/]+-[^/]+\.dist-info/METADATA$").expect("invalid regex")
});

static ENTRY_POINTS_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^/]+\.dist-info/entry_points\.txt$").expect("invalid regex")
});

static WHEEL_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_.-]+?)-(\d+[^-]*)-").expect("invalid regex")
});

/// Core metadata read from a wheel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelMetadata {
    /// Distribution name.
    pub name: String,
    /// Distribution version.
    pub version: String,
    /// One-line summary.
    pub summary: Option<String>,
    /// Author.
    pub author: Option<String>,
    /// License.
    pub license: Option<String>,
}

/// A `name = value` line from `[ggshield.plugins]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointSpec {
    /// Entry-point name (the plugin key).
    pub name: String,
    /// Target symbol, `module.path:ClassName`.
    pub value: String,
}

/// Read `Name`, `Version` and optional fields from a wheel's `METADATA`.
///
/// # Errors
///
/// - [`PluginError::InvalidWheel`] if the path is missing, not a `.whl`, or
///   not a zip archive
/// - [`PluginError::MetadataNotFound`] if there is no `*.dist-info/METADATA`
/// - [`PluginError::Wheel`] if `Name` or `Version` is absent
pub fn read_wheel_metadata(path: &Path) -> PluginResult<WheelMetadata> {
    if !path.exists() {
        return Err(PluginError::InvalidWheel(format!(
            "Wheel file not found: {}",
            path.display()
        )));
    }
    if path.extension().is_none_or(|ext| ext != "whl") {
        return Err(PluginError::InvalidWheel(format!(
            "Not a wheel file: {}",
            path.display()
        )));
    }

    let mut archive = open_archive(path)
        .map_err(|e| PluginError::InvalidWheel(format!("Invalid wheel file (not a valid ZIP): {e}")))?;

    let Some(member) = archive
        .file_names()
        .find(|name| METADATA_PATH.is_match(name))
        .map(String::from)
    else {
        return Err(PluginError::MetadataNotFound(path.to_path_buf()));
    };

    let content = read_member(&mut archive, &member)
        .map_err(|e| PluginError::Wheel(format!("failed to read {member}: {e}")))?;
    parse_metadata(&content)
}

/// First `[ggshield.plugins]` entry point declared by a wheel.
///
/// Returns `None` when the wheel is unreadable, has no `entry_points.txt`, or
/// declares no plugin.
#[must_use]
pub fn read_entry_point(path: &Path) -> Option<EntryPointSpec> {
    let mut archive = match open_archive(path) {
        Ok(archive) => archive,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Failed to open wheel");
            return None;
        },
    };
    let member = archive
        .file_names()
        .find(|name| ENTRY_POINTS_PATH.is_match(name))
        .map(String::from)?;
    let content = read_member(&mut archive, &member).ok()?;
    parse_entry_points(&content)
}

/// Split a wheel file name into `(distribution, version)`.
#[must_use]
pub fn parse_wheel_filename(filename: &str) -> Option<(String, String)> {
    WHEEL_FILENAME
        .captures(filename)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}

/// Extract a wheel into `dest`, which must not exist yet.
///
/// # Security
///
/// - Rejects entries whose path escapes `dest` (`..`, absolute paths)
/// - Rejects symlink entries
/// - Limits entry count to [`MAX_ENTRY_COUNT`] and total size to
///   [`MAX_EXTRACTED_SIZE`]
///
/// # Errors
///
/// Returns [`PluginError::ExtractionError`] or [`PluginError::PathTraversal`].
pub fn extract_wheel(wheel: &Path, dest: &Path) -> PluginResult<()> {
    let mut archive = open_archive(wheel).map_err(|e| PluginError::ExtractionError {
        message: format!("failed to open {}: {e}", wheel.display()),
    })?;

    if archive.len() > MAX_ENTRY_COUNT {
        return Err(PluginError::ExtractionError {
            message: format!("archive exceeds maximum entry count ({MAX_ENTRY_COUNT})"),
        });
    }

    std::fs::create_dir_all(dest).map_err(|e| PluginError::ExtractionError {
        message: format!("failed to create {}: {e}", dest.display()),
    })?;

    let mut total_size: u64 = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| PluginError::ExtractionError {
                message: format!("failed to read archive entry: {e}"),
            })?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(PluginError::PathTraversal {
                path: entry.name().to_string(),
            });
        };

        if entry
            .unix_mode()
            .is_some_and(|mode| mode & 0o170_000 == 0o120_000)
        {
            return Err(PluginError::ExtractionError {
                message: format!("symlink entries are not allowed: {}", entry.name()),
            });
        }

        let target: PathBuf = dest.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let remaining = MAX_EXTRACTED_SIZE.saturating_sub(total_size);
        let mut out = File::create(&target)?;
        let written = std::io::copy(&mut (&mut entry).take(remaining.saturating_add(1)), &mut out)
            .map_err(|e| PluginError::ExtractionError {
                message: format!("failed to unpack {}: {e}", target.display()),
            })?;
        total_size = total_size.saturating_add(written);
        if total_size > MAX_EXTRACTED_SIZE {
            return Err(PluginError::ExtractionError {
                message: format!(
                    "archive exceeds maximum extracted size ({MAX_EXTRACTED_SIZE} bytes)"
                ),
            });
        }
    }

    Ok(())
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| e.to_string())
}

fn read_member(archive: &mut ZipArchive<BufReader<File>>, name: &str) -> Result<String, String> {
    let entry = archive.by_name(name).map_err(|e| e.to_string())?;
    let mut buf = Vec::new();
    entry
        .take(MAX_METADATA_SIZE)
        .read_to_end(&mut buf)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buf).map_err(|e| e.to_string())
}

fn parse_metadata(content: &str) -> PluginResult<WheelMetadata> {
    let headers = parse_headers(content);
    let get = |key: &str| {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    };

    let name = get("Name")
        .ok_or_else(|| PluginError::Wheel("METADATA missing required 'Name' field".to_string()))?;
    let version = get("Version").ok_or_else(|| {
        PluginError::Wheel("METADATA missing required 'Version' field".to_string())
    })?;

    Ok(WheelMetadata {
        name,
        version,
        summary: get("Summary"),
        author: get("Author"),
        license: get("License"),
    })
}

/// RFC 822 header block: stops at the first blank line, folds continuations.
fn parse_headers(content: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    headers
}

fn parse_entry_points(content: &str) -> Option<EntryPointSpec> {
    let mut in_group = false;
    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_group = section.trim() == PLUGIN_ENTRY_POINT_GROUP;
            continue;
        }
        if !in_group {
            continue;
        }
        let split = line.split_once('=').or_else(|| line.split_once(':'));
        if let Some((name, value)) = split {
            let (name, value) = (name.trim(), value.trim());
            if !name.is_empty() {
                return Some(EntryPointSpec {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
    }
    None
}
