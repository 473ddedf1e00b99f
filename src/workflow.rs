//! Drives one administrative run from connection to exit status.
//!
//! Every run walks the same states:
//!
//! ```text
//! INIT -> CONNECTED -> LOCATED -> REASSIGNING -> REPORTED -> TERMINATED
//!                              \-> RESETTING --/
//! ```
//!
//! A reset locates by counting: zero or several existing owners are fine,
//! they are all about to be replaced. Any failure jumps straight to
//! REPORTED. The exit status is decided once, when the run terminates.

use crate::config::AppConfig;
use crate::connection::{Connection, connect};
use crate::core::{AdminError, Result};
use crate::migration::{ReassignOptions, ReassignReport, StepStatus, reassign};
use crate::owner::{OwnerSpec, find_owner, reset_owner};
use crate::report::{OperationEvent, OwnerSummary};
use std::fmt;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Init,
    Connected,
    Located,
    Reassigning,
    Resetting,
    Reported,
    Terminated(ExitStatus),
}

impl WorkflowState {
    /// Whether `next` may follow `self`
    pub fn can_advance_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        match (self, next) {
            (Terminated(_), _) => false,
            (Reported, Terminated(_)) => true,
            (Reported, _) => false,
            (_, Reported) => true,
            (Init, Connected)
            | (Connected, Located)
            | (Located, Reassigning)
            | (Located, Resetting) => true,
            _ => false,
        }
    }
}

/// Describes what the run was doing while in the state
impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let activity = match self {
            Self::Init => "connecting to the store",
            Self::Connected => "locating the owner",
            Self::Located => "preparing the change",
            Self::Reassigning => "reassigning content",
            Self::Resetting => "resetting the owner",
            Self::Reported => "reporting",
            Self::Terminated(_) => "terminating",
        };
        f.write_str(activity)
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    /// Locate the owner and print it
    ShowOwner,
    /// Point every plan step at the owner
    Reassign(ReassignOptions),
    /// Replace every owner with one built from the seed
    ResetOwner(OwnerSpec),
}

/// What a run produced: the events to report and the exit status
#[derive(Debug)]
pub struct RunOutcome {
    pub events: Vec<OperationEvent>,
    pub status: ExitStatus,
    pub state: WorkflowState,
}

/// Connect using `config.store`, then run `command`.
pub async fn run(config: &AppConfig, command: Command) -> RunOutcome {
    let mut runner = Runner::new();
    match connect(&config.store).await {
        Ok(conn) => runner.drive(config, command, conn).await,
        Err(e) => runner.fail(AdminError::Connection(e)),
    }
    runner.finish()
}

/// Run `command` over an already open connection, which is closed before
/// returning.
pub async fn run_with_connection(config: &AppConfig, command: Command, conn: Connection) -> RunOutcome {
    let mut runner = Runner::new();
    runner.drive(config, command, conn).await;
    runner.finish()
}

/// Report a run that failed before it could connect, such as one whose
/// configuration did not load.
pub fn rejected(error: AdminError) -> RunOutcome {
    let mut runner = Runner::new();
    runner.fail(error);
    runner.finish()
}

struct Runner {
    state: WorkflowState,
    events: Vec<OperationEvent>,
    failed: bool,
    summary: Option<String>,
}

impl Runner {
    fn new() -> Self {
        Self {
            state: WorkflowState::Init,
            events: Vec::new(),
            failed: false,
            summary: None,
        }
    }

    fn advance(&mut self, next: WorkflowState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(AdminError::State(format!(
                "illegal transition {:?} -> {:?}",
                self.state, next
            )));
        }
        debug!(from = ?self.state, to = ?next, "workflow transition");
        self.state = next;
        Ok(())
    }

    async fn drive(&mut self, config: &AppConfig, command: Command, mut conn: Connection) {
        let result = self.execute(config, command, &mut conn).await;
        if let Err(e) = conn.close().await {
            warn!(error = %e, "failed to close connection");
        }
        if let Err(e) = result {
            self.fail(e);
        }
    }

    async fn execute(&mut self, config: &AppConfig, command: Command, conn: &mut Connection) -> Result<()> {
        self.advance(WorkflowState::Connected)?;
        self.events.push(OperationEvent::Connected {
            target: conn.target().to_string(),
            kind: conn.store_kind(),
        });

        let query = config.owner_query();
        let collection = config.owner_collection.as_str();

        match command {
            Command::ShowOwner => {
                let owner = find_owner(conn, collection, &query).await?;
                self.advance(WorkflowState::Located)?;
                self.events.push(OperationEvent::OwnerLocated(OwnerSummary::from(&owner)));
                self.summary = Some(format!("Owner {} located", owner.id));
            }
            Command::Reassign(options) => {
                let owner = find_owner(conn, collection, &query).await?;
                self.advance(WorkflowState::Located)?;
                self.events.push(OperationEvent::OwnerLocated(OwnerSummary::from(&owner)));

                self.advance(WorkflowState::Reassigning)?;
                self.events.push(OperationEvent::PlanStarted {
                    owner_id: owner.id.to_string(),
                    steps: config.plan.len(),
                    dry_run: options.dry_run,
                    transactional: !options.dry_run
                        && options.transactional
                        && conn.supports_transactions(),
                });

                let report = reassign(conn, &config.plan, &owner, options).await?;
                self.record_steps(&report);
                let report = report.into_result()?;
                self.summary = Some(if report.dry_run {
                    format!("Dry run over {} collection(s); nothing was written", report.outcomes.len())
                } else {
                    format!(
                        "Reassigned {} record(s) across {} collection(s) to {}",
                        report.total_modified(),
                        report.outcomes.len(),
                        report.owner_id
                    )
                });
            }
            Command::ResetOwner(spec) => {
                let existing = conn
                    .count(collection, &query.filter())
                    .await
                    .map_err(|e| AdminError::operation(collection, e))?;
                info!(role = query.role_name(), existing, "owners before reset");
                self.advance(WorkflowState::Located)?;

                self.advance(WorkflowState::Resetting)?;
                let role = query.role_name().to_string();

                let outcome = match reset_owner(conn, collection, &query, &spec, &config.credentials).await {
                    Ok(outcome) => outcome,
                    Err(AdminError::Creation { deleted, source }) => {
                        self.events.push(OperationEvent::OwnersDeleted { role: role.clone(), count: deleted });
                        self.events.push(OperationEvent::OwnerGap { role, deleted });
                        return Err(AdminError::Creation { deleted, source });
                    }
                    Err(e) => return Err(e),
                };
                self.events.push(OperationEvent::OwnersDeleted {
                    role,
                    count: outcome.deleted,
                });
                self.events.push(OperationEvent::OwnerCreated(OwnerSummary::from(&outcome.owner)));

                let located = find_owner(conn, collection, &query).await?;
                if located.id != outcome.owner.id {
                    return Err(AdminError::InvalidOwner(format!(
                        "owner lookup returned {} instead of the new record {}",
                        located.id, outcome.owner.id
                    )));
                }
                info!(id = %located.id, "new owner verified");
                self.summary = Some(format!("Owner reset; new owner is {}", located.id));
            }
        }
        Ok(())
    }

    fn record_steps(&mut self, report: &ReassignReport) {
        for outcome in &report.outcomes {
            let collection = outcome.step.collection().to_string();
            let field = outcome.step.field.clone();
            let event = match &outcome.status {
                StepStatus::Updated(applied) => OperationEvent::CollectionUpdated {
                    collection,
                    field,
                    matched: applied.matched,
                    modified: applied.modified,
                },
                StepStatus::Previewed { matched, would_modify } => OperationEvent::CollectionPreviewed {
                    collection,
                    field,
                    matched: *matched,
                    would_modify: *would_modify,
                },
                StepStatus::Failed(e) => OperationEvent::CollectionFailed {
                    collection,
                    field,
                    error: e.to_string(),
                },
                StepStatus::RolledBack(applied) => OperationEvent::CollectionRolledBack {
                    collection,
                    field,
                    modified: applied.modified,
                },
                StepStatus::Skipped => OperationEvent::CollectionSkipped { collection, field },
            };
            self.events.push(event);
        }
    }

    fn fail(&mut self, error: AdminError) {
        error!(stage = %self.state, error = %error, "run failed");
        self.events.push(OperationEvent::Failed {
            stage: self.state,
            error: error.to_string(),
        });
        self.failed = true;
    }

    fn finish(mut self) -> RunOutcome {
        if let Err(e) = self.advance(WorkflowState::Reported) {
            self.fail(e);
        }

        let status = if self.failed { ExitStatus::Failure } else { ExitStatus::Success };
        let summary = match (status, self.summary.take()) {
            (ExitStatus::Success, Some(summary)) => summary,
            (ExitStatus::Success, None) => "Completed successfully".to_string(),
            (ExitStatus::Failure, _) => "Finished with errors".to_string(),
        };
        self.events.push(OperationEvent::Finished { status, summary });

        // Reported -> Terminated is always legal
        self.state = WorkflowState::Terminated(status);
        info!(code = status.code(), "run finished");

        RunOutcome {
            events: self.events,
            status,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::core::DocumentId;
    use crate::owner::Secret;
    use serde_json::json;
    use std::collections::HashMap;

    fn config(uri: &str) -> AppConfig {
        let vars: HashMap<&str, String> = HashMap::from([
            ("STORE_URI", uri.to_string()),
            ("BCRYPT_COST", "4".to_string()),
            ("SUPER_ADMIN_PASSWORD", "long enough secret".to_string()),
        ]);
        AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    fn unique_uri(tag: &str) -> String {
        format!("memory://workflow-{}-{}", tag, DocumentId::generate())
    }

    #[test]
    fn test_transitions() {
        use WorkflowState::*;
        assert!(Init.can_advance_to(Connected));
        assert!(Init.can_advance_to(Reported));
        assert!(Located.can_advance_to(Resetting));
        assert!(Located.can_advance_to(Reassigning));
        assert!(Reported.can_advance_to(Terminated(ExitStatus::Success)));

        assert!(!Init.can_advance_to(Located));
        assert!(!Connected.can_advance_to(Reassigning));
        assert!(!Connected.can_advance_to(Resetting));
        assert!(!Resetting.can_advance_to(Reassigning));
        assert!(!Reported.can_advance_to(Connected));
        assert!(!Terminated(ExitStatus::Failure).can_advance_to(Reported));
        assert!(!Init.can_advance_to(Terminated(ExitStatus::Success)));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failure.code(), 1);
        assert!(!ExitStatus::Failure.is_success());
    }

    #[tokio::test]
    async fn test_missing_uri_fails_before_connecting() {
        let outcome = run(&config(""), Command::ShowOwner).await;
        assert_eq!(outcome.status, ExitStatus::Failure);
        assert_eq!(outcome.state, WorkflowState::Terminated(ExitStatus::Failure));
        assert!(matches!(
            outcome.events[0],
            OperationEvent::Failed { stage: WorkflowState::Init, .. }
        ));
    }

    #[test]
    fn test_rejected_run_is_reported_from_init() {
        let outcome = rejected(AdminError::Config("SUPER_ADMIN_PASSWORD is not set".into()));
        assert_eq!(outcome.status, ExitStatus::Failure);
        assert_eq!(outcome.events.len(), 2);
        assert!(matches!(
            &outcome.events[0],
            OperationEvent::Failed { stage: WorkflowState::Init, error } if error.contains("SUPER_ADMIN_PASSWORD")
        ));
        assert!(matches!(
            outcome.events[1],
            OperationEvent::Finished { status: ExitStatus::Failure, .. }
        ));
    }

    #[tokio::test]
    async fn test_reset_then_show() {
        let config = config(&unique_uri("reset"));
        let spec = config.seed_spec().unwrap();

        let reset = run(&config, Command::ResetOwner(spec)).await;
        assert_eq!(reset.status, ExitStatus::Success, "{:?}", reset.events);
        assert!(reset.events.iter().any(|e| matches!(e, OperationEvent::OwnersDeleted { count: 0, .. })));

        let shown = run(&config, Command::ShowOwner).await;
        assert_eq!(shown.status, ExitStatus::Success);
        assert!(matches!(
            &shown.events[1],
            OperationEvent::OwnerLocated(owner) if owner.email == "admin@example.com"
        ));
    }

    #[tokio::test]
    async fn test_reassign_without_owner_fails() {
        let uri = unique_uri("no-owner");
        let config = config(&uri);
        let outcome = run(&config, Command::Reassign(ReassignOptions::default())).await;

        assert_eq!(outcome.status, ExitStatus::Failure);
        assert!(outcome.events.iter().any(|e| matches!(
            e,
            OperationEvent::Failed { stage: WorkflowState::Connected, error } if error.contains("super_admin")
        )));
    }

    #[tokio::test]
    async fn test_weak_seed_password_is_rejected() {
        let config = config(&unique_uri("weak"));
        let spec = OwnerSpec::new("Admin", "admin@example.com", Secret::new("short"));
        let outcome = run(&config, Command::ResetOwner(spec)).await;

        assert_eq!(outcome.status, ExitStatus::Failure);
        let rendered = format!("{:?}", outcome.events);
        assert!(!rendered.contains("short\""));
    }

    #[tokio::test]
    async fn test_reassign_reports_every_step() {
        let config = config(&unique_uri("steps"));
        let spec = config.seed_spec().unwrap();
        assert!(run(&config, Command::ResetOwner(spec)).await.status.is_success());

        let conn = connect(&config.store).await.unwrap();
        conn.insert_one("jobs", json!({"contributor": "x"}).as_object().cloned().unwrap())
            .await
            .unwrap();

        let outcome = run_with_connection(&config, Command::Reassign(ReassignOptions::default()), conn).await;
        assert!(outcome.status.is_success(), "{:?}", outcome.events);
        let updated = outcome
            .events
            .iter()
            .filter(|e| matches!(e, OperationEvent::CollectionUpdated { .. }))
            .count();
        assert_eq!(updated, config.plan.len());
    }
}
