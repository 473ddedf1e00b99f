// ============================================================================
// content-admin Library
// ============================================================================
//
// Administrative maintenance for a content platform's document store:
// locate the single privileged owner, reassign content to it, or reset it.

pub mod config;
pub mod connection;
pub mod core;
pub mod migration;
pub mod owner;
pub mod report;
pub mod storage;
pub mod workflow;

// Re-export main types for convenience
pub use config::AppConfig;
pub use connection::{Connection, config::StoreConfig, connect};
pub use core::{AdminError, Document, DocumentId, Filter, Result, StoreError, StoreResult, UpdateOutcome};
pub use migration::{CollectionKind, MigrationPlan, ReassignOptions, ReassignReport, reassign};
pub use owner::{CredentialPolicy, Owner, OwnerQuery, OwnerSpec, Secret, find_owner, reset_owner};
pub use report::{OperationEvent, Reporter, render};
pub use storage::{DocumentStore, FileStore, MemoryStore};
pub use workflow::{
    Command, ExitStatus, RunOutcome, WorkflowState, rejected, run, run_with_connection,
};
