//! Agent configuration
//!
//! Handles parsing of the optional `ec2prep.yaml` file in the install root.
//! Every field has a default, so an absent or partial file is fine.

pub mod loader;

pub use loader::load_config;

use serde::{Deserialize, Serialize};

use crate::identity::imds::{IMDS_BASE_URL, TOKEN_TTL_SECONDS};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// Where the instance identity comes from
    pub identity: IdentityConfig,

    /// How scripts are discovered and launched
    pub scripts: ScriptsConfig,
}

/// Identity source selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    /// Query the EC2 instance metadata service
    #[default]
    Imds,
    /// Use `instance_id` verbatim
    Fixed,
}

/// Identity resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub source: IdentitySource,

    /// Literal identity used when `source` is `fixed`
    pub instance_id: Option<String>,

    /// Metadata service base URL
    pub imds_url: String,

    /// Whole-request timeout in seconds
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// IMDSv2 session token TTL in seconds
    pub token_ttl_secs: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            source: IdentitySource::Imds,
            instance_id: None,
            imds_url: IMDS_BASE_URL.to_string(),
            timeout_secs: 5,
            connect_timeout_secs: 2,
            token_ttl_secs: TOKEN_TTL_SECONDS,
        }
    }
}

/// What to do when the scripts directory cannot be listed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryFailurePolicy {
    /// Log a warning and run zero scripts
    #[default]
    Ignore,
    /// Abort the run
    Fatal,
}

/// Script execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Program and leading arguments; the script path is appended
    pub interpreter: Vec<String>,

    pub on_discovery_failure: DiscoveryFailurePolicy,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            on_discovery_failure: DiscoveryFailurePolicy::Ignore,
        }
    }
}

/// Platform default interpreter for provisioning scripts
pub fn default_interpreter() -> Vec<String> {
    let argv: &[&str] = if cfg!(windows) {
        &[
            "powershell.exe",
            "-NonInteractive",
            "-ExecutionPolicy",
            "RemoteSigned",
            "-File",
        ]
    } else {
        &["/bin/sh"]
    };
    argv.iter().map(|s| s.to_string()).collect()
}

impl PrepConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PrepConfig::default();
        assert_eq!(config.identity.source, IdentitySource::Imds);
        assert_eq!(config.identity.imds_url, "http://169.254.169.254");
        assert_eq!(config.identity.token_ttl_secs, 300);
        assert_eq!(
            config.scripts.on_discovery_failure,
            DiscoveryFailurePolicy::Ignore
        );
        assert!(!config.scripts.interpreter.is_empty());
    }

    #[test]
    fn test_parse_partial_config() {
        let yaml = r#"
identity:
  source: fixed
  instance_id: i-local
scripts:
  on_discovery_failure: fatal
"#;
        let config = PrepConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.identity.source, IdentitySource::Fixed);
        assert_eq!(config.identity.instance_id.as_deref(), Some("i-local"));
        assert_eq!(config.identity.timeout_secs, 5);
        assert_eq!(
            config.scripts.on_discovery_failure,
            DiscoveryFailurePolicy::Fatal
        );
        assert_eq!(config.scripts.interpreter, default_interpreter());
    }

    #[test]
    fn test_parse_custom_interpreter() {
        let yaml = "scripts:\n  interpreter: [bash, -eu]\n";
        let config = PrepConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.scripts.interpreter, vec!["bash", "-eu"]);
    }

    #[test]
    fn test_parse_empty_file() {
        let config = PrepConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.identity.source, IdentitySource::Imds);
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        assert!(PrepConfig::from_yaml("identity:\n  source: gce\n").is_err());
    }
}
