pub mod document;
pub mod error;

pub use document::{Document, DocumentId, Filter, ID_FIELD, UpdateOutcome};
pub use error::{AdminError, Result, StoreError, StoreResult};
