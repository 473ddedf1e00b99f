use crate::connection::config::StoreConfig;
use crate::core::{AdminError, Result};
use crate::migration::MigrationPlan;
use crate::owner::{
    CredentialPolicy, DEFAULT_OWNER_COLLECTION, DEFAULT_OWNER_ROLE, OwnerQuery, OwnerSpec, Secret,
};
use std::time::Duration;

pub const DEFAULT_SEED_NAME: &str = "Super Admin";
pub const DEFAULT_SEED_EMAIL: &str = "admin@example.com";
const DEFAULT_BCRYPT_COST: u32 = 12;

/// Everything a run needs, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub owner_role: String,
    pub owner_collection: String,
    pub seed_name: String,
    pub seed_email: String,
    /// Never printed; `Secret` redacts itself
    pub seed_password: Option<Secret>,
    pub credentials: CredentialPolicy,
    pub plan: MigrationPlan,
    pub transactional: bool,
}

impl AppConfig {
    /// Load from the process environment, after applying any `.env` file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for every variable.
    ///
    /// An unset `STORE_URI` is not an error here; connecting reports it,
    /// and commands that never connect do not need it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let string = |key: &str, default: &str| value(key).unwrap_or_else(|| default.to_string());

        let connect_secs = parse_number(value("STORE_CONNECT_TIMEOUT_SECS"), "STORE_CONNECT_TIMEOUT_SECS", 10)?;
        if connect_secs == 0 {
            return Err(AdminError::Config("STORE_CONNECT_TIMEOUT_SECS must be > 0".into()));
        }
        let op_secs = parse_number(value("STORE_OP_TIMEOUT_SECS"), "STORE_OP_TIMEOUT_SECS", 30)?;

        let mut store = StoreConfig::new(&string("STORE_URI", ""))
            .connect_timeout(Duration::from_secs(connect_secs));
        store = if op_secs == 0 {
            store.without_operation_timeout()
        } else {
            store.operation_timeout(Duration::from_secs(op_secs))
        };

        let cost = parse_number(value("BCRYPT_COST"), "BCRYPT_COST", u64::from(DEFAULT_BCRYPT_COST))?;
        let cost = u32::try_from(cost)
            .map_err(|_| AdminError::Config(format!("BCRYPT_COST out of range: {}", cost)))?;
        let credentials = CredentialPolicy::with_cost(cost)?;

        let plan = match value("MIGRATION_PLAN") {
            Some(raw) => MigrationPlan::parse(&raw)?,
            None => MigrationPlan::standard(),
        };

        let transactional = match value("MIGRATION_TRANSACTIONAL") {
            Some(raw) => parse_bool(&raw, "MIGRATION_TRANSACTIONAL")?,
            None => true,
        };

        Ok(Self {
            store,
            owner_role: string("OWNER_ROLE", DEFAULT_OWNER_ROLE),
            owner_collection: string("OWNER_COLLECTION", DEFAULT_OWNER_COLLECTION),
            seed_name: string("SUPER_ADMIN_NAME", DEFAULT_SEED_NAME),
            seed_email: string("SUPER_ADMIN_EMAIL", DEFAULT_SEED_EMAIL),
            seed_password: lookup("SUPER_ADMIN_PASSWORD").filter(|p| !p.is_empty()).map(Secret::new),
            credentials,
            plan,
            transactional,
        })
    }

    pub fn owner_query(&self) -> OwnerQuery {
        OwnerQuery::role(self.owner_role.as_str())
    }

    /// Build the seed for a reset from the configured defaults.
    ///
    /// Fails when no password is configured; there is no built-in one.
    pub fn seed_spec(&self) -> Result<OwnerSpec> {
        let password = self.seed_password.clone().ok_or_else(|| {
            AdminError::Config("SUPER_ADMIN_PASSWORD must be set to reset the owner".into())
        })?;
        Ok(OwnerSpec::new(self.seed_name.as_str(), self.seed_email.as_str(), password)
            .with_role(self.owner_role.as_str()))
    }
}

fn parse_number(raw: Option<String>, key: &str, default: u64) -> Result<u64> {
    match raw {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| AdminError::Config(format!("{} must be a non-negative integer, got '{}'", key, raw))),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str, key: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AdminError::Config(format!("{} must be a boolean, got '{}'", key, raw))),
    }
}
