use super::model::{Owner, OwnerQuery};
use crate::connection::Connection;
use crate::core::{AdminError, DocumentId, Result};
use tracing::{info, warn};

/// Resolve the single owner matching `query` in `collection`.
///
/// Zero matches and several matches are distinct errors; in neither case
/// is a record returned.
pub async fn find_owner(conn: &Connection, collection: &str, query: &OwnerQuery) -> Result<Owner> {
    let matches = conn
        .find(collection, &query.filter())
        .await
        .map_err(|e| AdminError::operation(collection, e))?;

    match matches.as_slice() {
        [] => Err(AdminError::NotFound {
            role: query.role_name().to_string(),
        }),
        [document] => {
            let owner = Owner::from_document(document)?;
            info!(id = %owner.id, role = %owner.role, "owner located");
            Ok(owner)
        }
        many => {
            let ids: Vec<String> = many
                .iter()
                .map(|d| DocumentId::of(d).map_or_else(|| "<no id>".to_string(), |id| id.to_string()))
                .collect();
            warn!(role = query.role_name(), count = many.len(), "owner role is ambiguous");
            Err(AdminError::Ambiguous {
                role: query.role_name().to_string(),
                count: many.len(),
                ids,
            })
        }
    }
}
