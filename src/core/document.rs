use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// A stored record: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Name of the primary key field carried by every stored document.
pub const ID_FIELD: &str = "_id";

/// Primary key of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier (32 lowercase hex digits).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Reads the `_id` of a document, if it is a non-empty string.
    pub fn of(document: &Document) -> Option<Self> {
        match document.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Some(Self(id.clone())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conjunction of exact-match conditions.
///
/// A condition on a field the document does not have matches `null`,
/// so `Filter::new().eq("contributor", Value::Null)` selects records
/// with an absent or null contributor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// The empty filter; matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            let actual = document.get(field).unwrap_or(&Value::Null);
            actual == expected
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return f.write_str("{}");
        }
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(field, value)| format!("{}: {}", field, value))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Result of a bulk field update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents selected by the filter.
    pub matched: u64,
    /// Documents whose value actually changed.
    pub modified: u64,
}
