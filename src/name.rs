//! Service names: immutable, structurally-equal paths.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static SEGMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// An invalid service name segment (empty, or containing characters other
/// than alphanumerics, `-` and `_`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid service name segment: '{0}'")]
pub struct NameError(pub String);

/// An immutable path of non-empty segments, compared structurally.
///
/// Cloning a `ServiceName` is an `Arc` bump, not a deep copy — names are
/// passed around freely as map keys, edge targets and log fields.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct ServiceName(Arc<[Arc<str>]>);

impl ServiceName {
    /// Build a name from already-validated segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, NameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let segments: Vec<Arc<str>> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(NameError(String::new()));
        }
        for seg in &segments {
            if !SEGMENT_RE.is_match(seg) {
                return Err(NameError(seg.to_string()));
            }
        }
        Ok(Self(segments.into()))
    }

    /// Parse a dotted path, e.g. `"db.pool.primary"`.
    pub fn parse(path: &str) -> Result<Self, NameError> {
        Self::from_segments(path.split('.'))
    }

    /// A single-segment name; convenient for tests and simple services.
    pub fn simple(name: impl Into<Arc<str>>) -> Result<Self, NameError> {
        Self::from_segments([name.into()])
    }

    pub fn segments(&self) -> &[Arc<str>] {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceName({self})")
    }
}

impl TryFrom<&str> for ServiceName {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
