use crate::core::{AdminError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref EMAIL_SHAPE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("email pattern is valid");
}

/// A plaintext secret that never prints itself
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the plaintext; only the hashing code should need this
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Password rules and bcrypt hashing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPolicy {
    cost: u32,
}

impl CredentialPolicy {
    pub const MIN_PASSWORD_LEN: usize = 8;
    const MAX_NAME_LEN: usize = 100;

    /// Policy with an explicit bcrypt cost (4..=31)
    pub fn with_cost(cost: u32) -> Result<Self> {
        if !(4..=31).contains(&cost) {
            return Err(AdminError::Config(format!(
                "bcrypt cost must be between 4 and 31, got {}",
                cost
            )));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Validates password complexity
    ///
    /// Enforces the following rules:
    /// - Cannot be empty
    /// - Minimum 8 characters
    pub fn validate_password(&self, password: &Secret) -> Result<()> {
        if password.is_empty() {
            return Err(AdminError::Credential("Password cannot be empty".into()));
        }

        if password.expose().chars().count() < Self::MIN_PASSWORD_LEN {
            return Err(AdminError::Credential(format!(
                "Password must be at least {} characters long",
                Self::MIN_PASSWORD_LEN
            )));
        }

        Ok(())
    }

    pub fn validate_name(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AdminError::InvalidSpec("Name cannot be empty".into()));
        }

        if name.chars().count() > Self::MAX_NAME_LEN {
            return Err(AdminError::InvalidSpec(format!(
                "Name too long (max {} characters)",
                Self::MAX_NAME_LEN
            )));
        }

        Ok(())
    }

    pub fn validate_email(&self, email: &str) -> Result<()> {
        if !EMAIL_SHAPE.is_match(email.trim()) {
            return Err(AdminError::InvalidSpec(format!(
                "'{}' is not a valid email address",
                email
            )));
        }
        Ok(())
    }

    /// Hashes a password using bcrypt
    ///
    /// Runs on the blocking pool; each hash includes a random salt, so the
    /// same password produces different hashes.
    pub async fn hash(&self, password: &Secret) -> Result<String> {
        self.validate_password(password)?;
        let cost = self.cost;
        let plaintext = password.clone();

        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext.expose(), cost))
            .await
            .map_err(|e| AdminError::Credential(format!("hashing task failed: {}", e)))?
            .map_err(|e| AdminError::Credential(format!("hashing failed: {}", e)))
    }

    /// Verifies password against bcrypt hash
    pub fn verify(password: &Secret, hash: &str) -> bool {
        bcrypt::verify(password.expose(), hash).unwrap_or(false)
    }
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self { cost: bcrypt::DEFAULT_COST }
    }
}
