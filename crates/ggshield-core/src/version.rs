//! Loose dotted versions for plugin compatibility and update checks.
//!
//! Plugin versions are not guaranteed to be semver. Comparison is a
//! component-wise integer comparison where missing trailing components count
//! as zero, so `1.0` and `1.0.0` are equal.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The running ggshield version.
#[must_use]
pub fn host_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// A version made of dot-separated unsigned integers (`1.2.3`, `v2.0`).
#[derive(Debug, Clone)]
pub struct DottedVersion {
    parts: Vec<u64>,
}

/// Error parsing a dotted version.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    /// The input was empty.
    #[error("empty version string")]
    Empty,
    /// A component was not an unsigned integer.
    #[error("invalid version component {component:?} in {input:?}")]
    InvalidComponent {
        /// The whole input.
        input: String,
        /// The offending component.
        component: String,
    },
}

impl DottedVersion {
    /// Parse a version, accepting an optional leading `v`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty or any component is not an
    /// unsigned integer.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let parts = body
            .split('.')
            .map(|component| {
                component
                    .parse::<u64>()
                    .map_err(|_| VersionParseError::InvalidComponent {
                        input: input.to_string(),
                        component: component.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { parts })
    }

    /// Numeric components.
    #[must_use]
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// Whether `candidate` is strictly newer than `current`.
    ///
    /// Unparseable input on either side is never an update.
    #[must_use]
    pub fn is_upgrade(current: &str, candidate: &str) -> bool {
        match (Self::parse(current), Self::parse(candidate)) {
            (Ok(current), Ok(candidate)) => candidate > current,
            _ => false,
        }
    }
}

impl FromStr for DottedVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DottedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.parts {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
            first = false;
        }
        Ok(())
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for idx in 0..len {
            let lhs = self.parts.get(idx).copied().unwrap_or(0);
            let rhs = other.parts.get(idx).copied().unwrap_or(0);
            match lhs.cmp(&rhs) {
                Ordering::Equal => {},
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DottedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DottedVersion {}
