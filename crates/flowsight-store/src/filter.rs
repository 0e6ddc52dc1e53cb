// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structured filters for targeted reads.
//!
//! The import pipeline needs a handful of query shapes (exact field match,
//! tree-path prefix, exclusion, conjunction); this is deliberately not a
//! general query language.

use serde_json::Value;

/// A filter evaluated against a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// Field equals the given value.
    Term(String, Value),
    /// Field is a string starting with the given prefix.
    Prefix(String, String),
    /// Field differs from the given value (or is absent).
    Ne(String, Value),
    /// All sub-filters match.
    And(Vec<Filter>),
}

impl Filter {
    /// Exact field match.
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Term(field.into(), value.into())
    }

    /// String-prefix field match.
    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::Prefix(field.into(), prefix.into())
    }

    /// Field-differs match.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    /// Conjunction of filters.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::All => true,
            Self::Term(field, value) => document.get(field) == Some(value),
            Self::Prefix(field, prefix) => document
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(prefix)),
            Self::Ne(field, value) => document.get(field) != Some(value),
            Self::And(filters) => filters.iter().all(|f| f.matches(document)),
        }
    }
}
