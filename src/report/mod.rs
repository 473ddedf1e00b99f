//! Human-readable run summary.
//!
//! The exact wording is not a stable interface; counts and identifiers are
//! always present.

use crate::owner::Owner;
use crate::workflow::{ExitStatus, WorkflowState};
use std::io::{self, Write};
use tracing::warn;

const BANNER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Owner fields safe to print. There is deliberately no hash here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub has_credential: bool,
}

impl From<&Owner> for OwnerSummary {
    fn from(owner: &Owner) -> Self {
        Self {
            id: owner.id.to_string(),
            name: owner.name.clone(),
            email: owner.email.clone(),
            role: owner.role.clone(),
            status: owner.status.to_string(),
            has_credential: owner.has_credential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEvent {
    Connected {
        target: String,
        kind: &'static str,
    },
    OwnerLocated(OwnerSummary),
    PlanStarted {
        owner_id: String,
        steps: usize,
        dry_run: bool,
        transactional: bool,
    },
    CollectionUpdated {
        collection: String,
        field: String,
        matched: u64,
        modified: u64,
    },
    CollectionPreviewed {
        collection: String,
        field: String,
        matched: u64,
        would_modify: u64,
    },
    CollectionFailed {
        collection: String,
        field: String,
        error: String,
    },
    CollectionRolledBack {
        collection: String,
        field: String,
        modified: u64,
    },
    CollectionSkipped {
        collection: String,
        field: String,
    },
    OwnersDeleted {
        role: String,
        count: u64,
    },
    OwnerCreated(OwnerSummary),
    /// Owners were deleted but the replacement was not created
    OwnerGap {
        role: String,
        deleted: u64,
    },
    Failed {
        stage: WorkflowState,
        error: String,
    },
    Finished {
        status: ExitStatus,
        summary: String,
    },
}

fn describe_owner(owner: &OwnerSummary) -> String {
    format!(
        "{} <{}> id={} role={} status={} credential={}",
        owner.name,
        owner.email,
        owner.id,
        owner.role,
        owner.status,
        if owner.has_credential { "stored (hashed)" } else { "missing" }
    )
}

/// Render one event as one line (the final banner spans three).
pub fn render(event: &OperationEvent) -> String {
    match event {
        OperationEvent::Connected { target, kind } => {
            format!("Connected to {} ({} store)", target, kind)
        }
        OperationEvent::OwnerLocated(owner) => format!("Owner: {}", describe_owner(owner)),
        OperationEvent::PlanStarted { owner_id, steps, dry_run, transactional } => format!(
            "Reassigning {} collection(s) to owner {}{}{}",
            steps,
            owner_id,
            if *dry_run { " [dry run]" } else { "" },
            if *transactional { " [single transaction]" } else { "" }
        ),
        OperationEvent::CollectionUpdated { collection, field, matched, modified } => {
            format!("  {}.{}: matched {}, modified {}", collection, field, matched, modified)
        }
        OperationEvent::CollectionPreviewed { collection, field, matched, would_modify } => format!(
            "  {}.{}: {} of {} would change",
            collection, field, would_modify, matched
        ),
        OperationEvent::CollectionFailed { collection, field, error } => {
            format!("  {}.{}: FAILED ({})", collection, field, error)
        }
        OperationEvent::CollectionRolledBack { collection, field, modified } => format!(
            "  {}.{}: rolled back ({} change(s) discarded)",
            collection, field, modified
        ),
        OperationEvent::CollectionSkipped { collection, field } => {
            format!("  {}.{}: skipped", collection, field)
        }
        OperationEvent::OwnersDeleted { role, count } => {
            format!("Deleted {} existing owner(s) with role '{}'", count, role)
        }
        OperationEvent::OwnerCreated(owner) => format!("Created owner: {}", describe_owner(owner)),
        OperationEvent::OwnerGap { role, deleted } => format!(
            "WARNING: {} owner(s) with role '{}' were deleted and no replacement was created; \
             the store has no owner for this role",
            deleted, role
        ),
        OperationEvent::Failed { stage, error } => format!("Error while {}: {}", stage, error),
        OperationEvent::Finished { status, summary } => format!(
            "{}\n{} (exit code {})\n{}",
            BANNER,
            summary,
            status.code(),
            BANNER
        ),
    }
}

/// Writes rendered events to an output stream.
///
/// Write errors are logged and otherwise ignored: a broken stdout must not
/// change the outcome of the run.
pub struct Reporter<W: Write> {
    out: W,
}

impl Reporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn report(&mut self, events: &[OperationEvent]) {
        for event in events {
            if let Err(e) = writeln!(self.out, "{}", render(event)) {
                warn!(error = %e, "could not write report");
                return;
            }
        }
        if let Err(e) = self.out.flush() {
            warn!(error = %e, "could not flush report");
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> OwnerSummary {
        OwnerSummary {
            id: "o1".into(),
            name: "Admin".into(),
            email: "admin@example.com".into(),
            role: "super_admin".into(),
            status: "approved".into(),
            has_credential: true,
        }
    }

    /// Writer that always fails.
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_render_owner_never_shows_hash() {
        let line = render(&OperationEvent::OwnerLocated(summary()));
        assert!(line.contains("o1"));
        assert!(line.contains("admin@example.com"));
        assert!(line.contains("stored (hashed)"));
        assert!(!line.contains("$2"));
    }

    #[test]
    fn test_render_counts() {
        let line = render(&OperationEvent::CollectionUpdated {
            collection: "jobs".into(),
            field: "contributor".into(),
            matched: 42,
            modified: 40,
        });
        assert_eq!(line, "  jobs.contributor: matched 42, modified 40");
    }

    #[test]
    fn test_report_is_ordered() {
        let mut reporter = Reporter::new(Vec::new());
        reporter.report(&[
            OperationEvent::Connected { target: "memory://x".into(), kind: "memory" },
            OperationEvent::OwnersDeleted { role: "super_admin".into(), count: 1 },
            OperationEvent::Finished { status: ExitStatus::Success, summary: "Done".into() },
        ]);
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Connected to memory://x (memory store)");
        assert_eq!(lines[1], "Deleted 1 existing owner(s) with role 'super_admin'");
        assert_eq!(lines[3], "Done (exit code 0)");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_broken_output_does_not_panic() {
        let mut reporter = Reporter::new(Broken);
        reporter.report(&[OperationEvent::Finished {
            status: ExitStatus::Failure,
            summary: "Failed".into(),
        }]);
    }
}
