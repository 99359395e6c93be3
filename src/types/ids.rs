//! Newtype wrappers for identifiers that travel with every tracked event.
//!
//! Keeping these distinct stops a PR number from being passed where a request
//! id is expected, and gives each a single `Display` format for log fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A pull request number within a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrNumber(pub u64);

impl fmt::Display for PrNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for PrNumber {
    fn from(n: u64) -> Self {
        PrNumber(n)
    }
}

/// A repository identifier (org/name format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub org: String,
    pub name: String,
}

impl RepoId {
    pub fn new(org: impl Into<String>, name: impl Into<String>) -> Self {
        RepoId {
            org: org.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.name)
    }
}

/// Correlates the log lines of one inbound webhook with the tracked unit it spawned.
///
/// Taken from the `X-Request-Id` header when the caller supplies one, otherwise
/// generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Uses `supplied` when it is non-blank, otherwise generates a fresh id.
    pub fn from_header(supplied: Option<&str>) -> Self {
        match supplied.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => RequestId(s.to_string()),
            None => Self::generate(),
        }
    }

    pub fn generate() -> Self {
        RequestId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn pr_number_displays_with_hash(n: u64) {
            prop_assert_eq!(format!("{}", PrNumber(n)), format!("#{}", n));
        }

        #[test]
        fn repo_id_displays_as_slash_pair(
            org in "[a-zA-Z][a-zA-Z0-9-]{0,38}",
            name in "[a-zA-Z][a-zA-Z0-9_-]{0,99}"
        ) {
            let id = RepoId::new(&org, &name);
            prop_assert_eq!(format!("{}", id), format!("{}/{}", org, name));
        }
    }

    #[test]
    fn request_id_prefers_supplied_header() {
        assert_eq!(RequestId::from_header(Some("abc-123")).as_str(), "abc-123");
    }

    #[test]
    fn request_id_generated_for_blank_header() {
        let a = RequestId::from_header(Some("   "));
        let b = RequestId::from_header(None);
        assert!(!a.as_str().trim().is_empty());
        assert_ne!(a, b);
    }
}
