//! Request matching logic.
//!
//! Looks up the mock registered for an endpoint template and verb.

use crate::method::HttpMethod;
use crate::mock::Mock;
use std::collections::HashMap;
use tracing::warn;

/// Result of matching a request against the registry.
#[derive(Debug)]
pub struct MatchResult<'a> {
    /// Position of the mock in registration order
    pub index: usize,
    /// The matched mock
    pub mock: &'a Mock,
}

/// A registration that can never match because an earlier one has the same
/// template and verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowedMock {
    pub index: usize,
    pub shadowed_by: usize,
    pub path: String,
    pub method: HttpMethod,
}

/// Ordered, read-only list of mocks.
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    mocks: Vec<Mock>,
}

impl MockRegistry {
    /// Build a registry. Duplicate `(template, verb)` pairs are kept but only
    /// the first one is reachable; each shadowed entry is logged.
    pub fn new(mocks: Vec<Mock>) -> Self {
        let registry = Self { mocks };
        for dup in registry.shadowed() {
            warn!(
                path = %dup.path,
                method = %dup.method,
                index = dup.index,
                shadowed_by = dup.shadowed_by,
                "Duplicate mock registration is unreachable"
            );
        }
        registry
    }

    /// Find the first mock registered for `path` and `method`.
    pub fn find(&self, path: &str, method: HttpMethod) -> Option<MatchResult<'_>> {
        self.mocks
            .iter()
            .enumerate()
            .find(|(_, mock)| mock.matches(path, method))
            .map(|(index, mock)| MatchResult { index, mock })
    }

    /// Registrations hidden behind an earlier one with the same key.
    pub fn shadowed(&self) -> Vec<ShadowedMock> {
        let mut first_seen: HashMap<(&str, HttpMethod), usize> = HashMap::new();
        let mut shadowed = Vec::new();

        for (index, mock) in self.mocks.iter().enumerate() {
            let key = (mock.path(), mock.method());
            match first_seen.get(&key) {
                Some(&winner) => shadowed.push(ShadowedMock {
                    index,
                    shadowed_by: winner,
                    path: mock.path().to_string(),
                    method: mock.method(),
                }),
                None => {
                    first_seen.insert(key, index);
                }
            }
        }

        shadowed
    }

    pub fn len(&self) -> usize {
        self.mocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mock> {
        self.mocks.iter()
    }
}

impl FromIterator<Mock> for MockRegistry {
    fn from_iter<I: IntoIterator<Item = Mock>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
