//! Test configuration types and loading

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::CONFIG_FILE_NAME;

/// Builds a [`ConfigLoader`] whose default directory is the `tests/`
/// directory of the crate invoking the macro
#[macro_export]
macro_rules! config_loader {
    () => {
        $crate::config::ConfigLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests"))
    };
}

/// Where a configuration path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicit path (VCD_CONFIG or --config)
    Override,
    /// `vcd_test_config.json` next to the test sources
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Override => write!(f, "override"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Errors that stop the suite before any test runs
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file {} not found ({source_kind} location)", path.display())]
    NotFound { path: PathBuf, source_kind: ConfigSource },

    #[error("Could not read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Path of the configuration source involved in the failure
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path, .. } | Self::Read { path, .. } | Self::Parse { path, .. } => path,
        }
    }
}

/// Suite configuration, as read from `vcd_test_config.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Connection and credentials for the provider under test
    pub provider: ProviderConfig,

    /// Organization and VDC the tests operate in
    pub vcd: VcdConfig,

    /// Networking resources used by edge gateway and VPN tests
    pub networking: NetworkingConfig,
}

impl TestConfig {
    /// Parse a configuration from JSON text
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub user: String,

    pub password: String,

    /// API endpoint, e.g. `https://vcd.example.com/api`
    pub url: String,

    /// Organization the user logs into (usually `System`)
    #[serde(rename = "sysOrg")]
    pub sys_org: String,

    /// Skip TLS certificate verification
    #[serde(rename = "allowInsecure")]
    pub allow_insecure: bool,

    /// Export TF_ACC so acceptance tests actually run
    #[serde(rename = "tfAcceptanceTests")]
    pub tf_acceptance_tests: bool,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("url", &self.url)
            .field("sys_org", &self.sys_org)
            .field("allow_insecure", &self.allow_insecure)
            .field("tf_acceptance_tests", &self.tf_acceptance_tests)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcdConfig {
    pub org: String,

    pub vdc: String,

    pub catalog: CatalogConfig,
}

/// Catalog holding the vApp templates used by VM tests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "catalogItem", skip_serializing_if = "Option::is_none")]
    pub catalog_item: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkingConfig {
    #[serde(rename = "externalIp", skip_serializing_if = "Option::is_none")]
    pub external_ip: Option<String>,

    #[serde(rename = "internalIp", skip_serializing_if = "Option::is_none")]
    pub internal_ip: Option<String>,

    #[serde(rename = "edgeGateway", skip_serializing_if = "Option::is_none")]
    pub edge_gateway: Option<String>,

    /// Pre-shared key for VPN tests
    #[serde(rename = "sharedSecret")]
    pub shared_secret: String,

    pub local: LocalEndpoint,

    pub peer: PeerEndpoint,
}

/// Local side of a VPN tunnel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEndpoint {
    #[serde(rename = "localIp")]
    pub local_ip: String,

    #[serde(rename = "localSubnetGw")]
    pub local_subnet_gw: String,
}

/// Remote side of a VPN tunnel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerEndpoint {
    #[serde(rename = "peerIp")]
    pub peer_ip: String,

    #[serde(rename = "peerSubnetGw")]
    pub peer_subnet_gw: String,
}

/// Locates and parses the suite configuration
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    default_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a loader that falls back to `<default_dir>/vcd_test_config.json`
    pub fn new(default_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
        }
    }

    pub fn default_path(&self) -> PathBuf {
        self.default_dir.join(CONFIG_FILE_NAME)
    }

    /// Pick the configuration path: the override when given, the default otherwise
    pub fn resolve_path(&self, override_path: Option<&Path>) -> (PathBuf, ConfigSource) {
        match override_path {
            Some(path) => (path.to_path_buf(), ConfigSource::Override),
            None => (self.default_path(), ConfigSource::Default),
        }
    }

    /// Load the configuration and export TF_ACC when it enables acceptance tests
    ///
    /// Any error here means no test can run meaningfully; callers are expected
    /// to stop the process (see [`crate::suite::halt`]).
    pub fn load(&self, override_path: Option<&Path>) -> Result<TestConfig, ConfigError> {
        let (path, source_kind) = self.resolve_path(override_path);
        debug!(path = %path.display(), %source_kind, "ConfigLoader::load: called");

        if !path.exists() {
            return Err(ConfigError::NotFound { path, source_kind });
        }

        let config = Self::load_from_file(&path)?;
        crate::propagate::propagate_acceptance_flag(&config);
        Ok(config)
    }

    /// Read and parse a configuration file without touching the environment
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<TestConfig, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = TestConfig::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded test config from: {}", path.display());
        Ok(config)
    }
}
