//! Cloud configuration file.
//!
//! The file is the JSON cloud config handed to the controller on startup.
//! Keys keep the provider's spelling (`ClusterId`, `VpcId`, ...).

use std::path::Path;
use std::time::Duration;

use bce_client::HttpClientConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::poller::PollPolicy;

/// Prefix of the `User-Agent` header, followed by the cluster ID.
pub const USER_AGENT_PREFIX: &str = "cce-k8s:";

/// Path appended to the configured endpoint.
pub const INTERNAL_API_PATH: &str = "/internal-api";

/// Timeout of a single API request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cloud config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cloud config must have a {0}")]
    Missing(&'static str),

    #[error("invalid cloud config: {0}")]
    Invalid(String),
}

/// Settings of the BCE cloud provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    #[serde(rename = "ClusterId", alias = "ClusterID")]
    pub cluster_id: String,
    #[serde(rename = "ClusterName")]
    pub cluster_name: String,
    #[serde(rename = "AccessKeyID", alias = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "VpcId", alias = "VpcID")]
    pub vpc_id: String,
    #[serde(rename = "SubnetId", alias = "SubnetID")]
    pub subnet_id: String,
    #[serde(rename = "MasterId", alias = "MasterID")]
    pub master_id: String,
    #[serde(rename = "Endpoint")]
    pub endpoint: String,
    #[serde(rename = "NodeIP")]
    pub node_ip: String,
    #[serde(rename = "Debug")]
    pub debug: bool,
    /// Fetches per wait point.
    #[serde(rename = "PollAttempts")]
    pub poll_attempts: Option<u32>,
    /// Seconds between two fetches of a wait point.
    #[serde(rename = "PollIntervalSecs")]
    pub poll_interval_secs: Option<u64>,
    /// Upper bound in seconds on a single wait point, whatever the attempts left.
    #[serde(rename = "PollDeadlineSecs")]
    pub poll_deadline_secs: Option<u64>,
}

impl CloudConfig {
    /// Parse and validate a config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CloudConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the config at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.master_id.is_empty() {
            return Err(ConfigError::Missing("MasterId"));
        }
        if self.cluster_id.is_empty() {
            return Err(ConfigError::Missing("ClusterId"));
        }
        if self.endpoint.is_empty() {
            return Err(ConfigError::Missing("Endpoint"));
        }
        if self.poll_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "PollAttempts must be at least 1".to_string(),
            ));
        }
        if self.poll_deadline_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "PollDeadlineSecs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn api_endpoint(&self) -> String {
        format!(
            "{}{}",
            self.endpoint.trim_end_matches('/'),
            INTERNAL_API_PATH
        )
    }

    pub fn user_agent(&self) -> String {
        format!("{}{}", USER_AGENT_PREFIX, self.cluster_id)
    }

    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            endpoint: self.api_endpoint(),
            user_agent: self.user_agent(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        let default = PollPolicy::default();
        let policy = PollPolicy::new(
            self.poll_attempts.unwrap_or(default.max_attempts),
            self.poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(default.interval),
        );
        match self.poll_deadline_secs {
            Some(secs) => policy.with_deadline(Duration::from_secs(secs)),
            None => policy,
        }
    }

    /// VPC from the config, empty meaning "ask the inventory".
    pub fn vpc_id(&self) -> Option<&str> {
        Some(self.vpc_id.as_str()).filter(|id| !id.is_empty())
    }

    pub fn subnet_id(&self) -> Option<&str> {
        Some(self.subnet_id.as_str()).filter(|id| !id.is_empty())
    }
}
