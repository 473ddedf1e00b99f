//! The privileged owner account: model, lookup, and reset.

pub mod credentials;
pub mod locator;
pub mod model;
pub mod seed;

pub use credentials::{CredentialPolicy, Secret};
pub use locator::find_owner;
pub use model::{DEFAULT_OWNER_COLLECTION, DEFAULT_OWNER_ROLE, Owner, OwnerQuery, OwnerStatus};
pub use seed::{OwnerSpec, ResetOutcome, reset_owner};
