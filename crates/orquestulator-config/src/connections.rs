//! StackStorm connection definitions.
//!
//! Connections are kept out of the main TOML so operators can mount them as
//! a secret. Both JSON and YAML are accepted; the format is chosen by file
//! extension (`.yaml`/`.yml` for YAML, anything else is JSON).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{ConfigError, Result};

/// A named StackStorm endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackStormConnection {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl StackStormConnection {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            alias: None,
            url: url.into(),
            api_key: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Human-readable name: the alias, or the id when no alias is set.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.id)
    }
}

/// Contents of the connections file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionsFile {
    /// Id of the connection used when a session has not chosen one.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub connections: Vec<StackStormConnection>,
}

impl ConnectionsFile {
    pub fn from_json(s: &str) -> Result<Self> {
        let file: Self = serde_json::from_str(s)?;
        file.validate()?;
        Ok(file)
    }

    pub fn from_yaml(s: &str) -> Result<Self> {
        let file: Self =
            serde_yaml::from_str(s).map_err(|e| ConfigError::ParseYaml(e.to_string()))?;
        file.validate()?;
        Ok(file)
    }

    /// Look up a connection by id.
    pub fn get(&self, id: &str) -> Option<&StackStormConnection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// The configured default connection, if it exists.
    pub fn default_connection(&self) -> Option<&StackStormConnection> {
        self.default.as_deref().and_then(|id| self.get(id))
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Ids of connections that carry an API key in plain text.
    pub fn plaintext_key_ids(&self) -> Vec<&str> {
        self.connections
            .iter()
            .filter(|c| c.api_key.as_deref().is_some_and(|k| !k.is_empty()))
            .map(|c| c.id.as_str())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for conn in &self.connections {
            if conn.id.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "connection id".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            if conn.id == "custom" {
                return Err(ConfigError::Invalid {
                    field: "connection id".to_string(),
                    reason: "'custom' is reserved for ad-hoc connections".to_string(),
                });
            }
            if conn.url.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: format!("url of connection '{}'", conn.id),
                    reason: "must not be empty".to_string(),
                });
            }
            if !seen.insert(conn.id.as_str()) {
                return Err(ConfigError::Invalid {
                    field: "connection id".to_string(),
                    reason: format!("'{}' is defined more than once", conn.id),
                });
            }
        }
        if let Some(default) = &self.default
            && self.get(default).is_none()
        {
            return Err(ConfigError::ConnectionNotFound(default.clone()));
        }
        Ok(())
    }
}

/// Load a connections file, choosing the parser by extension.
pub fn load_connections(path: &Path) -> Result<ConnectionsFile> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    if is_yaml {
        ConnectionsFile::from_yaml(&contents)
    } else {
        ConnectionsFile::from_json(&contents)
    }
}

/// Load a connections file, falling back to an empty set.
///
/// A missing or unreadable file is not fatal: the server still serves
/// evaluation, and users can enter a custom connection. Problems are pushed
/// onto `warnings`.
pub fn load_connections_or_empty(path: &Path, warnings: &mut Vec<String>) -> ConnectionsFile {
    if !path.is_file() {
        warnings.push(format!(
            "StackStorm connections config not found at {}",
            path.display()
        ));
        return ConnectionsFile::default();
    }

    match load_connections(path) {
        Ok(file) => {
            debug!(
                path = %path.display(),
                count = file.connections.len(),
                "Loaded StackStorm connections"
            );
            let plaintext = file.plaintext_key_ids();
            if !plaintext.is_empty() {
                warn!(
                    connections = ?plaintext,
                    "StackStorm API keys are stored in plain text; restrict access to the file"
                );
            }
            file
        }
        Err(e) => {
            warnings.push(format!(
                "Error loading StackStorm connections config {}: {}",
                path.display(),
                e
            ));
            ConnectionsFile::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const JSON: &str = r#"{
        "default": "prod",
        "connections": [
            {"id": "prod", "alias": "Production", "url": "https://st2.prod", "api_key": "k1"},
            {"id": "dev", "url": "https://st2.dev"}
        ]
    }"#;

    #[test]
    fn test_parse_json() {
        let file = ConnectionsFile::from_json(JSON).unwrap();
        assert_eq!(file.connections.len(), 2);
        assert_eq!(file.default_connection().unwrap().display_name(), "Production");
        assert_eq!(file.get("dev").unwrap().display_name(), "dev");
        assert_eq!(file.plaintext_key_ids(), vec!["prod"]);
    }

    #[test]
    fn test_parse_yaml() {
        let file = ConnectionsFile::from_yaml(
            "default: null\nconnections:\n  - id: lab\n    url: http://lab:9101\n",
        )
        .unwrap();
        assert_eq!(file.default, None);
        assert_eq!(file.get("lab").unwrap().url, "http://lab:9101");
    }

    #[test]
    fn test_unknown_default_rejected() {
        let err = ConnectionsFile::from_json(
            r#"{"default": "gone", "connections": [{"id": "a", "url": "http://a"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ConnectionNotFound(id) if id == "gone"));
    }

    #[test]
    fn test_duplicate_and_reserved_ids_rejected() {
        assert!(
            ConnectionsFile::from_json(
                r#"{"connections": [{"id": "a", "url": "http://a"}, {"id": "a", "url": "http://b"}]}"#
            )
            .is_err()
        );
        assert!(
            ConnectionsFile::from_json(r#"{"connections": [{"id": "custom", "url": "http://a"}]}"#)
                .is_err()
        );
        assert!(
            ConnectionsFile::from_json(r#"{"connections": [{"id": "a", "url": " "}]}"#).is_err()
        );
    }

    #[test]
    fn test_load_by_extension() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("st2.json");
        fs::write(&json_path, JSON).unwrap();
        assert_eq!(load_connections(&json_path).unwrap().connections.len(), 2);

        let yaml_path = dir.path().join("st2.YML");
        fs::write(&yaml_path, "connections: []\n").unwrap();
        assert!(load_connections(&yaml_path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_empty_with_warning() {
        let mut warnings = Vec::new();
        let file = load_connections_or_empty(Path::new("/nonexistent/st2.json"), &mut warnings);
        assert!(file.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("not found"));
    }

    #[test]
    fn test_malformed_file_is_empty_with_warning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("st2.json");
        fs::write(&path, "{ not json").unwrap();

        let mut warnings = Vec::new();
        let file = load_connections_or_empty(&path, &mut warnings);
        assert!(file.is_empty());
        assert!(warnings[0].starts_with("Error loading"));
    }
}
