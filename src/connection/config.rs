use crate::core::{StoreError, StoreResult};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Store connection configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store URI (`memory://<name>` or `file:///<path>`)
    pub uri: String,

    /// Bound on opening and pinging the store
    pub connect_timeout: Duration,

    /// Bound on every individual store call; `None` waits forever
    pub operation_timeout: Option<Duration>,
}

impl StoreConfig {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a new configuration with default timeouts
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.trim().to_string(),
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: Some(Self::DEFAULT_OPERATION_TIMEOUT),
        }
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set per-operation timeout
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Disable the per-operation timeout
    pub fn without_operation_timeout(mut self) -> Self {
        self.operation_timeout = None;
        self
    }

    /// Parse the URI into a store location
    pub fn location(&self) -> StoreResult<StoreUri> {
        StoreUri::parse(&self.uri)
    }

    /// The URI with any password replaced by `***`
    pub fn redacted_uri(&self) -> String {
        redact_uri(&self.uri)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.uri.is_empty() {
            return Err("store URI is not set".to_string());
        }

        if self.connect_timeout.is_zero() {
            return Err("connect timeout must be > 0".to_string());
        }

        if self.operation_timeout.is_some_and(|t| t.is_zero()) {
            return Err("operation timeout must be > 0 when set".to_string());
        }

        Ok(())
    }
}

/// Where a store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    /// Named store shared within the process
    Memory { name: String },
    /// Snapshot file on disk
    File { path: PathBuf },
}

impl StoreUri {
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StoreError::Connection("store URI is not set".into()));
        }

        let url = Url::parse(raw)
            .map_err(|e| StoreError::Connection(format!("invalid store URI: {}", e)))?;

        match url.scheme() {
            "memory" => {
                let host = url.host_str().unwrap_or("");
                let name = format!("{}{}", host, url.path());
                let name = name.trim_matches('/');
                if name.is_empty() {
                    return Err(StoreError::Connection(
                        "memory URI needs a store name (memory://<name>)".into(),
                    ));
                }
                Ok(Self::Memory { name: name.to_string() })
            }
            "file" => {
                let path = url.to_file_path().map_err(|_| {
                    StoreError::Connection("file URI must hold an absolute local path".into())
                })?;
                Ok(Self::File { path })
            }
            other => Err(StoreError::UnsupportedScheme(other.to_string())),
        }
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory { name } => write!(f, "memory://{}", name),
            Self::File { path } => write!(f, "file://{}", path.display()),
        }
    }
}

/// Replace the password component of a URI with `***`.
///
/// Strings that do not parse as URLs are returned unchanged; they cannot
/// carry a userinfo section the parser would recognise either.
pub fn redact_uri(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        _ => raw.trim().to_string(),
    }
}
