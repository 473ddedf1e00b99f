use super::plan::{CollectionKind, MigrationPlan, PlanStep};
use crate::connection::Connection;
use crate::core::{AdminError, DocumentId, Filter, Result, StoreError, StoreResult, UpdateOutcome};
use crate::owner::Owner;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReassignOptions {
    /// Count what would change without writing
    pub dry_run: bool,
    /// Run the whole plan in one transaction when the store supports it
    pub transactional: bool,
}

impl Default for ReassignOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            transactional: true,
        }
    }
}

#[derive(Debug)]
pub enum StepStatus {
    Updated(UpdateOutcome),
    Previewed { matched: u64, would_modify: u64 },
    Failed(StoreError),
    /// Applied inside a transaction that was later aborted
    RolledBack(UpdateOutcome),
    /// Not attempted because the transaction had already failed
    Skipped,
}

#[derive(Debug)]
pub struct StepOutcome {
    pub step: PlanStep,
    pub status: StepStatus,
}

/// Per-step outcome of one reassignment run
#[derive(Debug)]
pub struct ReassignReport {
    pub owner_id: DocumentId,
    pub dry_run: bool,
    pub transactional: bool,
    pub outcomes: Vec<StepOutcome>,
    /// Set when the closing commit or rollback failed
    pub transaction_error: Option<StoreError>,
}

impl ReassignReport {
    pub fn failed_steps(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, StepStatus::Failed(_)))
            .count()
    }

    pub fn rolled_back(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o.status, StepStatus::RolledBack(_) | StepStatus::Skipped))
    }

    pub fn is_success(&self) -> bool {
        self.failed_steps() == 0 && !self.rolled_back() && self.transaction_error.is_none()
    }

    /// Modified count per kind, for steps whose writes were kept
    pub fn modified_counts(&self) -> BTreeMap<CollectionKind, u64> {
        self.outcomes
            .iter()
            .filter_map(|o| match o.status {
                StepStatus::Updated(outcome) => Some((o.step.kind, outcome.modified)),
                _ => None,
            })
            .collect()
    }

    pub fn total_modified(&self) -> u64 {
        self.modified_counts().values().sum()
    }

    /// Turn a failed transaction into [`AdminError::Operation`] and any
    /// failed step into [`AdminError::PartialFailure`]
    pub fn into_result(mut self) -> Result<Self> {
        if let Some(e) = self.transaction_error.take() {
            return Err(AdminError::operation("transaction", e));
        }
        let failed = self.failed_steps();
        if failed > 0 {
            return Err(AdminError::PartialFailure {
                failed,
                total: self.outcomes.len(),
            });
        }
        Ok(self)
    }
}

/// Point the ownership field of every record in every plan step at `owner`.
///
/// Steps run in plan order, one store call at a time. Without a
/// transaction a failing step is recorded and the remaining steps still
/// run; writes already made stay in place. Inside a transaction the first
/// failure skips the rest and rolls everything back.
///
/// A commit or rollback that fails does not discard the step outcomes: the
/// connection drops the staged writes, the applied steps are reported as
/// rolled back and the error is kept in `transaction_error`.
pub async fn reassign(
    conn: &mut Connection,
    plan: &MigrationPlan,
    owner: &Owner,
    options: ReassignOptions,
) -> Result<ReassignReport> {
    let target = owner.id.to_value();

    if options.dry_run {
        let mut outcomes = Vec::with_capacity(plan.len());
        for step in plan.steps() {
            let status = match preview_step(conn, step, &target).await {
                Ok((matched, would_modify)) => StepStatus::Previewed { matched, would_modify },
                Err(e) => StepStatus::Failed(e),
            };
            outcomes.push(StepOutcome { step: step.clone(), status });
        }
        return Ok(ReassignReport {
            owner_id: owner.id.clone(),
            dry_run: true,
            transactional: false,
            outcomes,
            transaction_error: None,
        });
    }

    let transactional = options.transactional && conn.supports_transactions();
    if transactional {
        conn.begin()
            .await
            .map_err(|e| AdminError::operation("transaction", e))?;
    }
    info!(owner = %owner.id, steps = plan.len(), transactional, "reassigning content");

    let mut outcomes = Vec::with_capacity(plan.len());
    let mut aborted = false;

    for step in plan.steps() {
        if aborted {
            outcomes.push(StepOutcome { step: step.clone(), status: StepStatus::Skipped });
            continue;
        }

        let status = match conn
            .set_field(step.collection(), &Filter::new(), &step.field, target.clone())
            .await
        {
            Ok(outcome) => {
                info!(
                    collection = step.collection(),
                    field = %step.field,
                    matched = outcome.matched,
                    modified = outcome.modified,
                    "collection reassigned"
                );
                StepStatus::Updated(outcome)
            }
            Err(e) => {
                warn!(collection = step.collection(), field = %step.field, error = %e, "collection update failed");
                aborted = transactional;
                StepStatus::Failed(e)
            }
        };
        outcomes.push(StepOutcome { step: step.clone(), status });
    }

    let mut transaction_error = None;
    if transactional {
        let closed = if aborted { conn.rollback().await } else { conn.commit().await };
        if let Err(e) = &closed {
            warn!(error = %e, aborted, "transaction did not complete");
        }
        if aborted || closed.is_err() {
            for outcome in &mut outcomes {
                if let StepStatus::Updated(applied) = outcome.status {
                    outcome.status = StepStatus::RolledBack(applied);
                }
            }
            warn!("reassignment rolled back");
        }
        transaction_error = closed.err();
    }

    Ok(ReassignReport {
        owner_id: owner.id.clone(),
        dry_run: false,
        transactional,
        outcomes,
        transaction_error,
    })
}

async fn preview_step(conn: &Connection, step: &PlanStep, target: &Value) -> StoreResult<(u64, u64)> {
    let matched = conn.count(step.collection(), &Filter::new()).await?;
    let converged = conn
        .count(step.collection(), &Filter::new().eq(step.field.as_str(), target.clone()))
        .await?;
    Ok((matched, matched.saturating_sub(converged)))
}
