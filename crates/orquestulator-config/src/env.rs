//! Environment variable overrides.
//!
//! Variable names match the container deployment of the service so existing
//! `.env` files keep working:
//!
//! | Variable | Field |
//! |---|---|
//! | `PASSPHRASE_AUTH` | `auth.passphrase_required` |
//! | `PASSPHRASE` | `auth.passphrase` |
//! | `AUTH_RATE_LIMIT` | `auth.rate_limit` |
//! | `SESSION_TIMEOUT_HOURS` | `session.timeout_hours` |
//! | `SESSION_COOKIE_NAME` | `session.cookie_name` |
//! | `SESSION_COOKIE_SECURE` | `session.cookie_secure` |
//! | `SESSION_COOKIE_SAMESITE` | `session.cookie_same_site` |
//! | `PROACTIVE_SESSION_CLEANUP` | `session.proactive_cleanup` |
//! | `STACKSTORM_CONNECTIONS_CONFIG` | `stackstorm.connections_file` |

use std::path::PathBuf;

use crate::{ConfigError, OrquestulatorConfig, Result};

/// Apply overrides read through `lookup` (normally `std::env::var`).
///
/// Unset and empty variables are ignored.
pub fn apply_env_overrides<F>(config: &mut OrquestulatorConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("PASSPHRASE_AUTH") {
        auth(config).passphrase_required = parse_bool("PASSPHRASE_AUTH", &v)?;
    }
    if let Some(v) = get("PASSPHRASE") {
        auth(config).passphrase = v;
    }
    if let Some(v) = get("AUTH_RATE_LIMIT") {
        auth(config).rate_limit = v.parse().map_err(|e| invalid("AUTH_RATE_LIMIT", &v, e))?;
    }
    if let Some(v) = get("SESSION_TIMEOUT_HOURS") {
        session(config).timeout_hours = v
            .trim()
            .parse()
            .map_err(|e| invalid("SESSION_TIMEOUT_HOURS", &v, e))?;
    }
    if let Some(v) = get("SESSION_COOKIE_NAME") {
        session(config).cookie_name = v;
    }
    if let Some(v) = get("SESSION_COOKIE_SECURE") {
        session(config).cookie_secure = parse_bool("SESSION_COOKIE_SECURE", &v)?;
    }
    if let Some(v) = get("SESSION_COOKIE_SAMESITE") {
        session(config).cookie_same_site = v
            .parse()
            .map_err(|e| invalid("SESSION_COOKIE_SAMESITE", &v, e))?;
    }
    if let Some(v) = get("PROACTIVE_SESSION_CLEANUP") {
        session(config).proactive_cleanup = parse_bool("PROACTIVE_SESSION_CLEANUP", &v)?;
    }
    if let Some(v) = get("STACKSTORM_CONNECTIONS_CONFIG") {
        config
            .stackstorm
            .get_or_insert_with(Default::default)
            .connections_file = PathBuf::from(v);
    }
    Ok(())
}

fn auth(config: &mut OrquestulatorConfig) -> &mut crate::AuthSection {
    config.auth.get_or_insert_with(Default::default)
}

fn session(config: &mut OrquestulatorConfig) -> &mut crate::SessionSection {
    config.session.get_or_insert_with(Default::default)
}

fn parse_bool(var: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, value, "expected true or false")),
    }
}

fn invalid(var: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::{RatePeriod, SameSitePolicy};

    fn apply(vars: &[(&str, &str)]) -> Result<OrquestulatorConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = OrquestulatorConfig::new();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned())?;
        Ok(config)
    }

    #[test]
    fn test_no_vars_leaves_sections_unset() {
        let config = apply(&[]).unwrap();
        assert!(config.auth.is_none());
        assert!(config.session.is_none());
        assert!(config.stackstorm.is_none());
    }

    #[test]
    fn test_all_overrides() {
        let config = apply(&[
            ("PASSPHRASE_AUTH", "False"),
            ("PASSPHRASE", "open sesame"),
            ("AUTH_RATE_LIMIT", "3/second"),
            ("SESSION_TIMEOUT_HOURS", "8"),
            ("SESSION_COOKIE_NAME", "orq"),
            ("SESSION_COOKIE_SECURE", "true"),
            ("SESSION_COOKIE_SAMESITE", "none"),
            ("PROACTIVE_SESSION_CLEANUP", "0"),
            ("STACKSTORM_CONNECTIONS_CONFIG", "/etc/orq/st2.yaml"),
        ])
        .unwrap();

        let auth = config.auth();
        assert!(!auth.passphrase_required);
        assert_eq!(auth.passphrase, "open sesame");
        assert_eq!(auth.rate_limit.period, RatePeriod::Second);

        let session = config.session();
        assert_eq!(session.timeout(), Duration::from_secs(8 * 3600));
        assert_eq!(session.cookie_name, "orq");
        assert!(session.cookie_secure);
        assert_eq!(session.cookie_same_site, SameSitePolicy::None);
        assert!(!session.proactive_cleanup);

        assert_eq!(
            config.stackstorm().connections_file,
            PathBuf::from("/etc/orq/st2.yaml")
        );
    }

    #[test]
    fn test_empty_value_ignored() {
        let config = apply(&[("PASSPHRASE", "  ")]).unwrap();
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let err = apply(&[("SESSION_TIMEOUT_HOURS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref var, .. } if var == "SESSION_TIMEOUT_HOURS"));

        let err = apply(&[("PASSPHRASE_AUTH", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("PASSPHRASE_AUTH"));

        assert!(apply(&[("AUTH_RATE_LIMIT", "5/eon")]).is_err());
        assert!(apply(&[("SESSION_COOKIE_SAMESITE", "sideways")]).is_err());
    }
}
