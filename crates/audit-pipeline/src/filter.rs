// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Selects the log objects that belong to monitored workloads.
///
/// An object key is accepted when it contains at least one configured workload-name fragment
/// as a case-sensitive substring. An empty fragment list accepts nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityFilter {
    fragments: Vec<String>,
}

impl IdentityFilter {
    /// Empty fragments are dropped since they would match every key.
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments
                .into_iter()
                .map(Into::into)
                .filter(|fragment: &String| !fragment.is_empty())
                .collect(),
        }
    }

    /// Parses the comma-separated form stored in the parameter store.
    pub fn from_csv(value: &str) -> Self {
        Self::new(value.split(',').map(str::trim))
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// First configured fragment found in `key`, if any.
    pub fn matching_fragment(&self, key: &str) -> Option<&str> {
        self.fragments
            .iter()
            .map(String::as_str)
            .find(|fragment| key.contains(fragment))
    }

    pub fn matches(&self, key: &str) -> bool {
        self.matching_fragment(key).is_some()
    }
}
