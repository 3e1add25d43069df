//! Member paths, index names and index values.
//!
//! An index is addressed by the dot-joined member path of the field it
//! projects (`Birth.Day`). [`MemberPath::index_name`] is the only place that
//! name is derived, so index registration and predicate compilation always
//! agree on it.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

/// Root-to-leaf member names selecting one field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberPath(Vec<String>);

impl MemberPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Splits a dotted path; empty segments are ignored.
    pub fn parse(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Extends the path by one member.
    pub fn then(mut self, member: impl Into<String>) -> Self {
        self.0.push(member.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the path is exactly the single top-level member `name`.
    pub fn is_member(&self, name: &str) -> bool {
        matches!(self.0.as_slice(), [only] if only == name)
    }

    pub fn index_name(&self) -> IndexName {
        IndexName(self.0.join("."))
    }

    /// Walks the path through nested JSON objects.
    pub fn resolve<'a>(&self, doc: &'a Json) -> Option<&'a Json> {
        let mut current = doc;
        for part in &self.0 {
            current = current.get(part.as_str())?;
        }
        Some(current)
    }
}

impl From<&str> for MemberPath {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

impl From<String> for MemberPath {
    fn from(dotted: String) -> Self {
        Self::parse(&dotted)
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Name of one secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexName(String);

impl IndexName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IndexName {
    fn from(dotted: &str) -> Self {
        MemberPath::parse(dotted).index_name()
    }
}

impl From<&MemberPath> for IndexName {
    fn from(path: &MemberPath) -> Self {
        path.index_name()
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// String form of an indexed field's value; `None` when the member is null
/// or absent.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IndexValue(Option<String>);

impl IndexValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    pub const fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Strings render as their contents, numbers and booleans as their
    /// textual form, arrays and objects as compact JSON. Whole floats render
    /// as integers, so `10.0` and `10` land in the same entry.
    pub fn from_json(value: &Json) -> Self {
        match value {
            Json::Null => Self(None),
            Json::String(s) => Self(Some(s.clone())),
            Json::Bool(b) => Self(Some(b.to_string())),
            Json::Number(n) => Self(Some(number_text(n))),
            other => Self(Some(other.to_string())),
        }
    }

    /// Projects the member at `path` out of a serialized record.
    pub fn project(doc: &Json, path: &MemberPath) -> Self {
        path.resolve(doc).map(Self::from_json).unwrap_or_default()
    }
}

fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f)
            if n.is_f64()
                && f.fract() == 0.0
                && f >= i64::MIN as f64
                && f < i64::MAX as f64 =>
        {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Option<String>> for IndexValue {
    fn from(value: Option<String>) -> Self {
        Self(value)
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => f.write_str(value),
            None => f.write_str("null"),
        }
    }
}
