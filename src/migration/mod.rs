//! Bulk ownership reassignment over content collections.

pub mod plan;
pub mod reassign;

pub use plan::{CollectionKind, MigrationPlan, PlanStep};
pub use reassign::{ReassignOptions, ReassignReport, StepOutcome, StepStatus, reassign};
