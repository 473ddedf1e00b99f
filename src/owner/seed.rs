use super::credentials::{CredentialPolicy, Secret};
use super::model::{DEFAULT_OWNER_ROLE, Owner, OwnerQuery, OwnerStatus, fields};
use crate::connection::Connection;
use crate::core::{AdminError, Document, ID_FIELD, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::{error, info};

/// Everything needed to create a fresh owner
#[derive(Debug, Clone)]
pub struct OwnerSpec {
    pub name: String,
    pub email: String,
    pub password: Secret,
    pub role: String,
    pub status: OwnerStatus,
}

impl OwnerSpec {
    /// Seed for an approved owner with the default role
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: Secret) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password,
            role: DEFAULT_OWNER_ROLE.to_string(),
            status: OwnerStatus::Approved,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_status(mut self, status: OwnerStatus) -> Self {
        self.status = status;
        self
    }

    fn validate(&self, query: &OwnerQuery, policy: &CredentialPolicy) -> Result<()> {
        policy.validate_name(&self.name)?;
        policy.validate_email(&self.email)?;
        policy.validate_password(&self.password)?;
        if self.role != query.role_name() {
            return Err(AdminError::InvalidSpec(format!(
                "seed role '{}' does not match the reset predicate role '{}'",
                self.role,
                query.role_name()
            )));
        }
        Ok(())
    }

    fn to_document(&self, password_hash: String) -> Document {
        let now = Value::String(Utc::now().to_rfc3339());
        let mut document = Document::new();
        document.insert(fields::NAME.into(), Value::String(self.name.trim().to_string()));
        document.insert(fields::EMAIL.into(), Value::String(self.email.trim().to_lowercase()));
        document.insert(fields::PASSWORD.into(), Value::String(password_hash));
        document.insert(fields::ROLE.into(), Value::String(self.role.clone()));
        document.insert(fields::STATUS.into(), Value::String(self.status.to_string()));
        document.insert(fields::CREATED_AT.into(), now.clone());
        document.insert(fields::UPDATED_AT.into(), now);
        document
    }
}

/// Result of a successful reset
#[derive(Debug, Clone)]
pub struct ResetOutcome {
    /// Owners removed in the delete phase
    pub deleted: u64,
    pub owner: Owner,
}

/// Delete every owner matching `query`, then create exactly one from `spec`.
///
/// The seed is validated and the password hashed before anything is
/// deleted. The two phases are not atomic: if the insert fails, the
/// collection is left without any owner for the role and the returned
/// [`AdminError::Creation`] carries the number of records deleted.
pub async fn reset_owner(
    conn: &Connection,
    collection: &str,
    query: &OwnerQuery,
    spec: &OwnerSpec,
    policy: &CredentialPolicy,
) -> Result<ResetOutcome> {
    spec.validate(query, policy)?;
    let password_hash = policy.hash(&spec.password).await?;

    let deleted = conn
        .delete_many(collection, &query.filter())
        .await
        .map_err(|e| AdminError::operation(collection, e))?;
    info!(role = query.role_name(), deleted, "existing owners deleted");

    let mut document = spec.to_document(password_hash);
    let id = match conn.insert_one(collection, document.clone()).await {
        Ok(id) => id,
        Err(source) => {
            error!(
                role = query.role_name(),
                deleted,
                error = %source,
                "owner creation failed after delete; no owner with this role exists now"
            );
            return Err(AdminError::Creation { deleted, source });
        }
    };

    document.insert(ID_FIELD.into(), id.to_value());
    let owner = Owner::from_document(&document)?;
    info!(id = %owner.id, role = %owner.role, "owner created");

    Ok(ResetOutcome { deleted, owner })
}
