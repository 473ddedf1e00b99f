use crate::core::{AdminError, Document, DocumentId, Filter, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_OWNER_ROLE: &str = "super_admin";
pub const DEFAULT_OWNER_COLLECTION: &str = "users";

/// Field names of an owner record
pub mod fields {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const PASSWORD: &str = "password";
    pub const ROLE: &str = "role";
    pub const STATUS: &str = "status";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Account lifecycle status
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OwnerStatus {
    #[default]
    Approved,
    Pending,
    Rejected,
    /// Any other value found in the store, kept verbatim
    Other(String),
}

impl OwnerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Approved => "approved",
            Self::Pending => "pending",
            Self::Rejected => "rejected",
            Self::Other(s) => s,
        }
    }
}

impl FromStr for OwnerStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "approved" => Self::Approved,
            "pending" => Self::Pending,
            "rejected" => Self::Rejected,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for OwnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The privileged account content is assigned to.
///
/// Built from a stored record; the credential hash is never copied out,
/// only whether one is present.
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub id: DocumentId,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: OwnerStatus,
    pub has_credential: bool,
    pub created_at: Option<DateTime<Utc>>,
}

fn required_str<'a>(document: &'a Document, field: &str) -> Result<&'a str> {
    match document.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(_) => Err(AdminError::InvalidOwner(format!("'{}' must be a non-empty string", field))),
        None => Err(AdminError::InvalidOwner(format!("'{}' is missing", field))),
    }
}

impl Owner {
    pub fn from_document(document: &Document) -> Result<Self> {
        let id = DocumentId::of(document)
            .ok_or_else(|| AdminError::InvalidOwner("record has no string _id".into()))?;
        let invalid = |e: AdminError| match e {
            AdminError::InvalidOwner(msg) => AdminError::InvalidOwner(format!("{} ({})", msg, id)),
            other => other,
        };

        let name = required_str(document, fields::NAME).map_err(invalid)?;
        let email = required_str(document, fields::EMAIL).map_err(invalid)?;
        let role = required_str(document, fields::ROLE).map_err(invalid)?;

        let status = match document.get(fields::STATUS) {
            Some(Value::String(s)) => s.parse().unwrap_or_default(),
            _ => OwnerStatus::Pending,
        };
        let has_credential = matches!(
            document.get(fields::PASSWORD),
            Some(Value::String(hash)) if !hash.is_empty()
        );
        let created_at = document
            .get(fields::CREATED_AT)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(Self {
            id: id.clone(),
            name: name.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            status,
            has_credential,
            created_at,
        })
    }
}

/// Exact-match predicate selecting owners by role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerQuery {
    role: String,
}

impl OwnerQuery {
    pub fn role(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }

    pub fn role_name(&self) -> &str {
        &self.role
    }

    pub fn filter(&self) -> Filter {
        Filter::new().eq(fields::ROLE, self.role.as_str())
    }
}

impl Default for OwnerQuery {
    fn default() -> Self {
        Self::role(DEFAULT_OWNER_ROLE)
    }
}
