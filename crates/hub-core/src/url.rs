//! Status URL type representing a `scheme://seg1/seg2` address

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{StatusError, StatusResult};

/// Segment that matches every child at its depth in query and watch patterns
pub const WILDCARD: &str = "*";

const SCHEME_SEPARATOR: &str = "://";

/// A parsed status tree address (e.g., "status://lights/kitchen/on")
///
/// The root is addressed by the bare scheme (`status://`) and has no
/// segments. A single trailing slash is ignored; empty interior segments are
/// rejected. Segments equal to [`WILDCARD`] are kept as-is and only become
/// meaningful to the query engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StatusUrl {
    scheme: String,
    segments: Vec<String>,
}

impl StatusUrl {
    /// The root address of a scheme
    pub fn root(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            segments: Vec::new(),
        }
    }

    /// Build an address from already split segments
    pub fn from_segments<I, S>(scheme: impl Into<String>, segments: I) -> StatusResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let url = Self {
            scheme: scheme.into(),
            segments: segments.into_iter().map(Into::into).collect(),
        };
        if url.segments.iter().any(String::is_empty) {
            return Err(StatusError::EmptySegment {
                url: url.to_string(),
            });
        }
        Ok(url)
    }

    /// Get the scheme part of the address
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Get the ordered path segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check if this address is the root of its scheme
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Check if any segment is a wildcard
    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| s == WILDCARD)
    }

    /// Reject addresses containing a wildcard segment
    ///
    /// Used by every operation that addresses exactly one node.
    pub fn require_concrete(&self) -> StatusResult<&Self> {
        if self.has_wildcard() {
            return Err(StatusError::WildcardNotAllowed {
                url: self.to_string(),
            });
        }
        Ok(self)
    }

    /// Address of a direct child
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self {
            scheme: self.scheme.clone(),
            segments,
        }
    }

    /// Address of the parent, or None for the root
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            scheme: self.scheme.clone(),
            segments: rest.to_vec(),
        })
    }

    /// Last segment, or None for the root
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

impl FromStr for StatusUrl {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StatusError::InvalidUrl { url: s.to_string() };

        let (scheme, path) = s.split_once(SCHEME_SEPARATOR).ok_or_else(invalid)?;
        if scheme.is_empty() || scheme.contains('/') {
            return Err(invalid());
        }

        let path = path.strip_suffix('/').unwrap_or(path);
        if path.is_empty() {
            return Ok(Self::root(scheme));
        }

        let segments: Vec<String> = path.split('/').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(StatusError::EmptySegment { url: s.to_string() });
        }

        Ok(Self {
            scheme: scheme.to_string(),
            segments,
        })
    }
}

impl TryFrom<String> for StatusUrl {
    type Error = StatusError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<StatusUrl> for String {
    fn from(url: StatusUrl) -> String {
        url.to_string()
    }
}

impl fmt::Display for StatusUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scheme, SCHEME_SEPARATOR, self.segments.join("/"))
    }
}
