use crate::core::{AdminError, ID_FIELD, Result};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Kinds of content that reference an owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKind {
    Job,
    Blog,
    Resource,
    Course,
    MockTest,
    DigitalProduct,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 6] = [
        Self::Job,
        Self::Blog,
        Self::Resource,
        Self::Course,
        Self::MockTest,
        Self::DigitalProduct,
    ];

    /// Collection the records are stored in
    pub fn collection(self) -> &'static str {
        match self {
            Self::Job => "jobs",
            Self::Blog => "blogs",
            Self::Resource => "resources",
            Self::Course => "courses",
            Self::MockTest => "mocktests",
            Self::DigitalProduct => "digitalproducts",
        }
    }

    /// Field holding the owner reference
    pub fn owner_field(self) -> &'static str {
        match self {
            Self::Job | Self::Resource => "contributor",
            Self::Blog => "author",
            Self::Course => "instructor",
            Self::MockTest => "creator",
            Self::DigitalProduct => "seller",
        }
    }

    /// Plural human name, for reports
    pub fn label(self) -> &'static str {
        match self {
            Self::Job => "jobs",
            Self::Blog => "blogs",
            Self::Resource => "resources",
            Self::Course => "courses",
            Self::MockTest => "mock tests",
            Self::DigitalProduct => "digital products",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for CollectionKind {
    type Err = AdminError;

    /// Accepts collection names and singular kind names, ignoring case,
    /// `_` and `-` (`jobs`, `Job`, `mock_test`, `digital-products`).
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "job" | "jobs" => Ok(Self::Job),
            "blog" | "blogs" => Ok(Self::Blog),
            "resource" | "resources" => Ok(Self::Resource),
            "course" | "courses" => Ok(Self::Course),
            "mocktest" | "mocktests" => Ok(Self::MockTest),
            "digitalproduct" | "digitalproducts" => Ok(Self::DigitalProduct),
            _ => Err(AdminError::InvalidPlan(format!("unknown collection kind '{}'", s.trim()))),
        }
    }
}

/// One (kind, ownership field) pair of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub kind: CollectionKind,
    pub field: String,
}

impl PlanStep {
    pub fn new(kind: CollectionKind, field: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
        }
    }

    /// Step using the kind's usual ownership field
    pub fn standard(kind: CollectionKind) -> Self {
        Self::new(kind, kind.owner_field())
    }

    pub fn collection(&self) -> &'static str {
        self.kind.collection()
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind.collection(), self.field)
    }
}

/// Ordered list of steps for the reassignment engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    steps: Vec<PlanStep>,
}

impl MigrationPlan {
    pub fn new(steps: Vec<PlanStep>) -> Result<Self> {
        if steps.is_empty() {
            return Err(AdminError::InvalidPlan("plan has no steps".into()));
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.kind) {
                return Err(AdminError::InvalidPlan(format!(
                    "'{}' appears more than once",
                    step.kind
                )));
            }
            validate_field(&step.field)?;
        }

        Ok(Self { steps })
    }

    /// Every content kind with its usual field, in declaration order
    pub fn standard() -> Self {
        Self {
            steps: CollectionKind::ALL.into_iter().map(PlanStep::standard).collect(),
        }
    }

    /// Parse `kind[:field],kind[:field],...`
    ///
    /// A kind without a field uses its usual ownership field.
    pub fn parse(input: &str) -> Result<Self> {
        let mut steps = Vec::new();

        for part in input.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let step = match trimmed.split_once(':') {
                Some((kind, field)) => PlanStep::new(kind.parse()?, field.trim()),
                None => PlanStep::standard(trimmed.parse()?),
            };
            steps.push(step);
        }

        Self::new(steps)
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for MigrationPlan {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Display for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.steps.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(", "))
    }
}

fn validate_field(field: &str) -> Result<()> {
    if field.is_empty() {
        return Err(AdminError::InvalidPlan("ownership field cannot be empty".into()));
    }
    if field == ID_FIELD {
        return Err(AdminError::InvalidPlan(format!("'{}' cannot be reassigned", ID_FIELD)));
    }
    if field.starts_with('$') || field.contains('.') || field.chars().any(char::is_whitespace) {
        return Err(AdminError::InvalidPlan(format!("'{}' is not a plain field name", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_plan_order_and_fields() {
        let plan = MigrationPlan::standard();
        let rendered: Vec<String> = plan.steps().iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "jobs.contributor",
                "blogs.author",
                "resources.contributor",
                "courses.instructor",
                "mocktests.creator",
                "digitalproducts.seller",
            ]
        );
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("jobs".parse::<CollectionKind>().unwrap(), CollectionKind::Job);
        assert_eq!("Mock_Test".parse::<CollectionKind>().unwrap(), CollectionKind::MockTest);
        assert_eq!(
            "digital-products".parse::<CollectionKind>().unwrap(),
            CollectionKind::DigitalProduct
        );
        assert!("videos".parse::<CollectionKind>().is_err());
    }

    #[test]
    fn test_parse_plan() {
        let plan = MigrationPlan::parse("blogs:editor, jobs ,courses:instructor").unwrap();
        assert_eq!(
            plan.steps(),
            &[
                PlanStep::new(CollectionKind::Blog, "editor"),
                PlanStep::standard(CollectionKind::Job),
                PlanStep::new(CollectionKind::Course, "instructor"),
            ]
        );
        assert_eq!(plan.to_string(), "blogs.editor, jobs.contributor, courses.instructor");
    }

    #[test]
    fn test_invalid_plans() {
        assert!(MigrationPlan::parse("").is_err());
        assert!(MigrationPlan::parse(" , ").is_err());
        assert!(MigrationPlan::parse("jobs,jobs:owner").is_err());
        assert!(MigrationPlan::parse("jobs:").is_err());
        assert!(MigrationPlan::parse("jobs:_id").is_err());
        assert!(MigrationPlan::parse("jobs:$set").is_err());
        assert!(MigrationPlan::parse("jobs:meta.owner").is_err());
        assert!(MigrationPlan::parse("podcasts:host").is_err());
    }
}
