//! Connection and adapter configuration.

use std::fmt;
use std::time::Duration;

/// Default number of pooled sessions.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Default streaming chunk size (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default per-remote-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to reach one remote store and shape the adapter.
///
/// Plain values throughout; construct with struct-update syntax over
/// [`Default`]:
///
/// ```rust
/// use datagrid_fs::{Credential, GridConfig};
///
/// let config = GridConfig {
///     host: "grid.example.org".into(),
///     zone: "tempZone".into(),
///     username: "alice".into(),
///     credential: Credential::Password("secret".into()),
///     root: "/tempZone/home/alice".into(),
///     ..GridConfig::default()
/// };
/// assert_eq!(config.port, 1247);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridConfig {
    /// Store hostname.
    pub host: String,
    /// Store port.
    pub port: u16,
    /// Authentication zone of the store.
    pub zone: String,
    /// User to authenticate as.
    pub username: String,
    /// Credential presented at connect time.
    pub credential: Credential,
    /// Base collection the virtual root `/` maps to.
    pub root: String,
    /// Maximum number of concurrently open sessions.
    pub pool_size: usize,
    /// Streaming transfer chunk size in bytes.
    pub chunk_size: usize,
    /// Timeout applied to each individual remote call.
    pub timeout: Duration,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1247,
            zone: String::new(),
            username: String::new(),
            credential: Credential::Password(String::new()),
            root: "/".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Secret presented when opening a session.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Credential {
    /// Native password authentication.
    Password(String),
    /// Pre-issued token (e.g. PAM or ticket based).
    Token(String),
}

// Secrets stay out of debug output and logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Credential::Password(***)"),
            Credential::Token(_) => f.write_str("Credential::Token(***)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GridConfig::default();
        assert_eq!(config.port, 1247);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.root, "/");
    }

    #[test]
    fn credential_debug_is_redacted() {
        let text = format!("{:?}", Credential::Password("hunter2".into()));
        assert!(!text.contains("hunter2"));
        let text = format!("{:?}", Credential::Token("tok-123".into()));
        assert!(!text.contains("tok-123"));
    }
}
