//! Slash-separated locations in the document namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A location in the document namespace, e.g. `/cfg/a`.
///
/// The empty path is the root of the namespace and prints as `/`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorePath(Vec<String>);

impl StorePath {
    /// The root of the document namespace.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse an absolute path. The string must start with `/` and may not
    /// contain empty segments; a single trailing `/` is tolerated.
    pub fn parse(s: &str) -> StoreResult<Self> {
        let rest = s.strip_prefix('/').ok_or_else(|| StoreError::InvalidPath {
            path: s.to_string(),
            reason: "path must start with '/'".into(),
        })?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in rest.split('/') {
            if segment.is_empty() {
                return Err(StoreError::InvalidPath {
                    path: s.to_string(),
                    reason: "empty path segment".into(),
                });
            }
            segments.push(segment.to_string());
        }
        Ok(Self(segments))
    }

    /// Parse a path, prefixing a `/` when the input lacks one.
    ///
    /// Directory entries frequently carry relative-looking paths such as
    /// `cfg/a`; they address the same location as `/cfg/a`.
    pub fn normalize(s: &str) -> StoreResult<Self> {
        if s.starts_with('/') {
            Self::parse(s)
        } else {
            Self::parse(&format!("/{s}"))
        }
    }

    /// Build a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The final segment, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The enclosing path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// The first `n` segments of this path.
    pub fn prefix(&self, n: usize) -> Self {
        Self(self.0[..n.min(self.0.len())].to_vec())
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn starts_with(&self, other: &StorePath) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for StorePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StorePath {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<StorePath> for String {
    fn from(path: StorePath) -> Self {
        path.to_string()
    }
}
