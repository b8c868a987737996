//! Revision contracts for writes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StatusError;

/// Expected revision passed to `set`/`remove`
///
/// Every write either bypasses the optimistic check, requires the target to
/// be absent, or requires the target's current revision to match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RevisionRepr", into = "RevisionRepr")]
pub enum Revision {
    /// Skip the optimistic check
    #[default]
    Unchecked,
    /// Succeed only if nothing exists at the target
    MustNotExist,
    /// Succeed only if the target's revision equals this value
    Exact(u64),
}

impl Revision {
    const UNCHECKED: &'static str = "unchecked";
    const MUST_NOT_EXIST: &'static str = "must_not_exist";
}

impl From<u64> for Revision {
    fn from(revision: u64) -> Self {
        Revision::Exact(revision)
    }
}

impl FromStr for Revision {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::UNCHECKED => Ok(Revision::Unchecked),
            Self::MUST_NOT_EXIST => Ok(Revision::MustNotExist),
            other => other
                .parse::<u64>()
                .map(Revision::Exact)
                .map_err(|_| StatusError::InvalidRevision {
                    value: other.to_string(),
                }),
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Unchecked => f.write_str(Self::UNCHECKED),
            Revision::MustNotExist => f.write_str(Self::MUST_NOT_EXIST),
            Revision::Exact(r) => write!(f, "{}", r),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RevisionRepr {
    Exact(u64),
    Named(String),
}

impl TryFrom<RevisionRepr> for Revision {
    type Error = StatusError;

    fn try_from(repr: RevisionRepr) -> Result<Self, Self::Error> {
        match repr {
            RevisionRepr::Exact(r) => Ok(Revision::Exact(r)),
            RevisionRepr::Named(name) => name.parse(),
        }
    }
}

impl From<Revision> for RevisionRepr {
    fn from(revision: Revision) -> Self {
        match revision {
            Revision::Exact(r) => RevisionRepr::Exact(r),
            other => RevisionRepr::Named(other.to_string()),
        }
    }
}
