//! Whitegate configuration
//!
//! JSON config file with request defaults, extra named-port mappings and
//! named credential profiles. Discovery order:
//!
//! 1. Explicit path (`--config`)
//! 2. `WHITEGATE_CONFIG` environment variable
//! 3. `./whitegate.json`
//! 4. `~/.config/whitegate/config.json`
//!
//! A missing file is not an error; defaults apply. Environment overrides
//! (`WHITEGATE_PROTOCOL`, `AWS_DEFAULT_REGION`) are applied after the file
//! is loaded.

pub mod error;

pub use error::{ConfigError, Result};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use whitegate_core::Protocol;

/// Default parameters applied when a request omits the matching field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultParameters {
    pub protocol: Protocol,
    pub region: String,
    /// Template for generated rule descriptions; `{date}` and `{service}`
    /// placeholders are substituted at request time.
    pub description_template: String,
}

impl Default for DefaultParameters {
    fn default() -> Self {
        Self {
            protocol: Protocol::Tcp,
            region: "us-east-1".to_string(),
            description_template: "Added by whitegate on {date}".to_string(),
        }
    }
}

/// Extra named-port mapping consulted before the builtin alias table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortMapping {
    pub name: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Named credential profile usable when a request carries no explicit
/// credentials and the environment has none either
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialProfile {
    pub name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub defaults: DefaultParameters,
    pub port_mappings: Vec<PortMapping>,
    pub credential_profiles: Vec<CredentialProfile>,
}

impl Config {
    /// Port aliases from the config, in lookup form
    pub fn port_aliases(&self) -> Vec<(String, u16)> {
        self.port_mappings
            .iter()
            .map(|m| (m.name.clone(), m.port))
            .collect()
    }

    pub fn profile(&self, name: &str) -> Option<&CredentialProfile> {
        self.credential_profiles.iter().find(|p| p.name == name)
    }

    /// First profile in file order, used when no profile name is requested
    pub fn default_profile(&self) -> Option<&CredentialProfile> {
        self.credential_profiles.first()
    }
}

/// Locate the config file without requiring one to exist
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("WHITEGATE_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let local = PathBuf::from("whitegate.json");
    if local.exists() {
        return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("whitegate").join("config.json");
        if global.exists() {
            return Some(global);
        }
    }

    None
}

/// Load configuration, apply env overrides, and return it.
///
/// An explicit path must exist; a discovered path is best-effort and a
/// missing file falls back to defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            read_config(path)?
        }
        None => match find_config_file() {
            Some(path) => read_config(&path)?,
            None => Config::default(),
        },
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(protocol) = std::env::var("WHITEGATE_PROTOCOL") {
        match Protocol::parse(&protocol) {
            Ok(p) => config.defaults.protocol = p,
            Err(_) => tracing::warn!("ignoring invalid WHITEGATE_PROTOCOL: {protocol}"),
        }
    }

    if let Ok(region) = std::env::var("AWS_DEFAULT_REGION") {
        if !region.is_empty() {
            config.defaults.region = region;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const ENV_KEYS: &[&str] = &["WHITEGATE_CONFIG", "WHITEGATE_PROTOCOL", "AWS_DEFAULT_REGION"];

    fn without_env<R>(f: impl FnOnce() -> R) -> R {
        temp_env::with_vars(
            ENV_KEYS.iter().map(|k| (*k, None::<&str>)).collect::<Vec<_>>(),
            f,
        )
    }

    #[test]
    #[serial]
    fn defaults_without_file() {
        without_env(|| {
            let config = load_config(None).unwrap();
            assert_eq!(config.defaults.protocol, Protocol::Tcp);
            assert_eq!(config.defaults.region, "us-east-1");
            assert!(config.credential_profiles.is_empty());
        });
    }

    #[test]
    #[serial]
    fn loads_explicit_file() {
        without_env(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("whitegate.json");
            fs::write(
                &path,
                r#"{
                    "defaults": {"protocol": "udp"},
                    "port_mappings": [{"name": "grafana", "port": 3000}],
                    "credential_profiles": [{
                        "name": "ops",
                        "access_key_id": "AKIAEXAMPLE",
                        "secret_access_key": "secret"
                    }]
                }"#,
            )
            .unwrap();

            let config = load_config(Some(&path)).unwrap();
            assert_eq!(config.defaults.protocol, Protocol::Udp);
            assert_eq!(config.port_aliases(), vec![("grafana".to_string(), 3000)]);
            assert_eq!(config.profile("ops").unwrap().access_key_id, "AKIAEXAMPLE");
            assert!(config.profile("missing").is_none());
        });
    }

    #[test]
    #[serial]
    fn explicit_path_must_exist() {
        without_env(|| {
            let err = load_config(Some(Path::new("/nonexistent/whitegate.json"))).unwrap_err();
            assert!(matches!(err, ConfigError::FileNotFound(_)));
        });
    }

    #[test]
    #[serial]
    fn env_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whitegate.json");
        fs::write(&path, r#"{"defaults": {"region": "eu-west-1"}}"#).unwrap();

        temp_env::with_vars(
            [
                ("WHITEGATE_PROTOCOL", Some("udp")),
                ("AWS_DEFAULT_REGION", Some("ap-northeast-1")),
            ],
            || {
                let config = load_config(Some(&path)).unwrap();
                assert_eq!(config.defaults.protocol, Protocol::Udp);
                assert_eq!(config.defaults.region, "ap-northeast-1");
            },
        );
    }

    #[test]
    #[serial]
    fn invalid_env_values_are_ignored() {
        temp_env::with_vars([("WHITEGATE_PROTOCOL", Some("carrier-pigeon"))], || {
            let config = load_config(None).unwrap();
            assert_eq!(config.defaults.protocol, Protocol::Tcp);
        });
    }
}
