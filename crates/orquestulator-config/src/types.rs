//! Configuration types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Passphrase shipped as the out-of-the-box default.
pub const DEFAULT_PASSPHRASE: &str = "Ch@ngeMe";

/// Default location of the StackStorm connections file.
pub const DEFAULT_CONNECTIONS_FILE: &str = "./config/stackstorm-connections.json";

const MASK: &str = "********";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrquestulatorConfig {
    pub server: Option<ServerSection>,
    pub auth: Option<AuthSection>,
    pub session: Option<SessionSection>,
    pub stackstorm: Option<StackStormSection>,
}

impl OrquestulatorConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: OrquestulatorConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.auth.is_some() {
            self.auth = other.auth;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.stackstorm.is_some() {
            self.stackstorm = other.stackstorm;
        }
    }

    pub fn server(&self) -> ServerSection {
        self.server.clone().unwrap_or_default()
    }

    pub fn auth(&self) -> AuthSection {
        self.auth.clone().unwrap_or_default()
    }

    pub fn session(&self) -> SessionSection {
        self.session.clone().unwrap_or_default()
    }

    pub fn stackstorm(&self) -> StackStormSection {
        self.stackstorm.clone().unwrap_or_default()
    }

    /// A fully populated copy with the passphrase masked, for display.
    pub fn masked(&self) -> Self {
        let mut auth = self.auth();
        auth.passphrase = MASK.to_string();
        Self {
            server: Some(self.server()),
            auth: Some(auth),
            session: Some(self.session()),
            stackstorm: Some(self.stackstorm()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: u16,
    pub bind: String,
    /// Log every request with method, path, status and latency.
    pub request_logging: bool,
    /// Allowed CORS origins. Credentials are allowed for these origins.
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: 8000,
            bind: "127.0.0.1".to_string(),
            request_logging: true,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost".to_string(),
                "http://localhost:80".to_string(),
            ],
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

/// `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// When false, any authentication request succeeds.
    pub passphrase_required: bool,
    pub passphrase: String,
    /// Limit on authentication attempts, e.g. `"5/minute"`.
    pub rate_limit: RateLimit,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            passphrase_required: true,
            passphrase: DEFAULT_PASSPHRASE.to_string(),
            rate_limit: RateLimit::default(),
        }
    }
}

impl AuthSection {
    pub fn uses_default_passphrase(&self) -> bool {
        self.passphrase_required && self.passphrase == DEFAULT_PASSPHRASE
    }
}

/// Unit of a [`RateLimit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatePeriod {
    Second,
    Minute,
    Hour,
    Day,
}

impl RatePeriod {
    pub fn duration(self) -> Duration {
        match self {
            Self::Second => Duration::from_secs(1),
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(3600),
            Self::Day => Duration::from_secs(86_400),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

/// A request budget such as `5/minute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RateLimit {
    pub count: u32,
    pub period: RatePeriod,
}

impl RateLimit {
    pub fn new(count: u32, period: RatePeriod) -> Self {
        Self { count, period }
    }

    /// Time between replenished requests.
    pub fn replenish_interval(&self) -> Duration {
        self.period.duration() / self.count.max(1)
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(5, RatePeriod::Minute)
    }
}

impl FromStr for RateLimit {
    type Err = ConfigError;

    /// Accepts `N/unit` or `N per unit`, with singular or plural units.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| ConfigError::Invalid {
            field: "rate limit".to_string(),
            reason: format!("'{}': {}", s, reason),
        };
        let normalized = s.trim().to_ascii_lowercase();
        let (count, unit) = normalized
            .split_once('/')
            .or_else(|| normalized.split_once(" per "))
            .ok_or_else(|| invalid("expected '<count>/<unit>'"))?;

        let count: u32 = count
            .trim()
            .parse()
            .map_err(|_| invalid("count must be a positive integer"))?;
        if count == 0 {
            return Err(invalid("count must be greater than zero"));
        }

        let period = match unit.trim().trim_end_matches('s') {
            "second" | "sec" => RatePeriod::Second,
            "minute" | "min" => RatePeriod::Minute,
            "hour" => RatePeriod::Hour,
            "day" => RatePeriod::Day,
            _ => return Err(invalid("unit must be second, minute, hour or day")),
        };
        Ok(Self { count, period })
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.count, self.period.as_str())
    }
}

impl TryFrom<String> for RateLimit {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RateLimit> for String {
    fn from(value: RateLimit) -> Self {
        value.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Cookie `SameSite` policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    #[default]
    Lax,
    Strict,
    None,
}

impl FromStr for SameSitePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            "none" => Ok(Self::None),
            other => Err(ConfigError::Invalid {
                field: "cookie same_site".to_string(),
                reason: format!("'{}' is not one of lax, strict, none", other),
            }),
        }
    }
}

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Sliding inactivity window.
    pub timeout_hours: u64,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSitePolicy,
    /// Drop expired sessions on every store operation.
    pub proactive_cleanup: bool,
    pub max_sessions: usize,
    /// Background sweep interval. `0` disables the sweep task.
    pub cleanup_interval_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_hours: 4,
            cookie_name: "session_id".to_string(),
            cookie_secure: false,
            cookie_same_site: SameSitePolicy::Lax,
            proactive_cleanup: true,
            max_sessions: 10_000,
            cleanup_interval_secs: 60,
        }
    }
}

impl SessionSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_hours * 3600)
    }

    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StackStorm
// ─────────────────────────────────────────────────────────────────────────────

/// `[stackstorm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackStormSection {
    /// JSON or YAML file listing named connections.
    pub connections_file: PathBuf,
    /// Timeout for connection tests.
    pub test_timeout_secs: u64,
    /// Timeout for execution fetches.
    pub request_timeout_secs: u64,
    /// StackStorm installs commonly use self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl Default for StackStormSection {
    fn default() -> Self {
        Self {
            connections_file: PathBuf::from(DEFAULT_CONNECTIONS_FILE),
            test_timeout_secs: 10,
            request_timeout_secs: 30,
            accept_invalid_certs: true,
        }
    }
}

impl StackStormSection {
    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = OrquestulatorConfig::from_toml("").unwrap();
        assert!(config.server.is_none());

        let auth = config.auth();
        assert!(auth.passphrase_required);
        assert_eq!(auth.passphrase, DEFAULT_PASSPHRASE);
        assert_eq!(auth.rate_limit, RateLimit::new(5, RatePeriod::Minute));

        let session = config.session();
        assert_eq!(session.timeout(), Duration::from_secs(4 * 3600));
        assert_eq!(session.cookie_name, "session_id");
        assert_eq!(session.cookie_same_site, SameSitePolicy::Lax);
    }

    #[test]
    fn test_parse_sections() {
        let config = OrquestulatorConfig::from_toml(
            r#"
[server]
port = 9000

[auth]
passphrase = "hunter2"
rate_limit = "10/hour"

[session]
cookie_same_site = "strict"
cleanup_interval_secs = 0
"#,
        )
        .unwrap();

        assert_eq!(config.server().port, 9000);
        assert_eq!(config.server().bind, "127.0.0.1");
        assert_eq!(config.auth().passphrase, "hunter2");
        assert_eq!(config.auth().rate_limit.period, RatePeriod::Hour);
        assert_eq!(config.session().cookie_same_site, SameSitePolicy::Strict);
        assert_eq!(config.session().cleanup_interval(), None);
    }

    #[test]
    fn test_invalid_rate_limit_rejected() {
        let err = OrquestulatorConfig::from_toml("[auth]\nrate_limit = \"lots\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_rate_limit_parsing() {
        assert_eq!(
            "5/minute".parse::<RateLimit>().unwrap(),
            RateLimit::new(5, RatePeriod::Minute)
        );
        assert_eq!(
            "100 per hours".parse::<RateLimit>().unwrap(),
            RateLimit::new(100, RatePeriod::Hour)
        );
        assert_eq!(
            "2/Second".parse::<RateLimit>().unwrap().to_string(),
            "2/second"
        );
        assert!("0/minute".parse::<RateLimit>().is_err());
        assert!("5/fortnight".parse::<RateLimit>().is_err());
        assert!("five/minute".parse::<RateLimit>().is_err());
    }

    #[test]
    fn test_replenish_interval() {
        let limit = RateLimit::new(5, RatePeriod::Minute);
        assert_eq!(limit.replenish_interval(), Duration::from_secs(12));
    }

    #[test]
    fn test_merge_section_override() {
        let mut base = OrquestulatorConfig::from_toml("[server]\nport = 1\n[auth]\npassphrase = \"a\"\n").unwrap();
        let top = OrquestulatorConfig::from_toml("[server]\nport = 2\n").unwrap();
        base.merge(top);

        assert_eq!(base.server().port, 2);
        assert_eq!(base.auth().passphrase, "a");
    }

    #[test]
    fn test_masked_hides_passphrase() {
        let config = OrquestulatorConfig::from_toml("[auth]\npassphrase = \"secret\"\n").unwrap();
        let masked = config.masked();
        let rendered = masked.to_toml().unwrap();

        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("********"));
        assert!(rendered.contains("[stackstorm]"));
    }
}
