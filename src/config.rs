/// Configuration of a check resource
///
/// The `source` block of the check request is the configuration file of this
/// resource. Values are layered with priority:
/// CLI args / environment variables > `source` > defaults
use crate::error::{ConfigError, Result};
use crate::git::GitCredentials;
use crate::paths::PlatformPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Branch followed when `source.branch` is not set
pub const DEFAULT_BRANCH: &str = "master";

/// The `source` block of a check request
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Source {
    /// Git remote URI of the repository
    #[serde(default)]
    pub uri: String,

    /// Name of the SQS queue receiving repository notifications
    #[serde(default)]
    pub queue: String,

    /// AWS region of the queue
    #[serde(default)]
    pub aws_region: String,

    /// Static queue credentials; the default AWS credential chain is used when absent
    #[serde(default)]
    pub aws_access_key_id: Option<String>,

    #[serde(default)]
    pub aws_secret_access_key: Option<String>,

    #[serde(default)]
    pub aws_session_token: Option<String>,

    /// Branch to follow. When set, notifications for other references are ignored.
    #[serde(default)]
    pub branch: Option<String>,

    /// Only report commits touching one of these repository-relative prefixes
    #[serde(default)]
    pub paths: Vec<String>,

    /// Never report commits touching only these prefixes
    #[serde(default)]
    pub ignored_paths: Vec<String>,

    /// Only accept notification records carrying this `customData`
    #[serde(default)]
    pub custom_data: Option<String>,

    /// Only accept notification records from this repository ARN
    #[serde(default)]
    pub repository_arn: Option<String>,

    /// Remove consumed notifications from the queue
    #[serde(default = "default_delete_message")]
    pub delete_message: bool,

    /// Verbose logging, including raw queue payloads
    #[serde(default)]
    pub debug: bool,

    /// Git fetch credentials (HTTPS user/password or an SSH private key)
    #[serde(default)]
    pub git_username: Option<String>,

    #[serde(default)]
    pub git_password: Option<String>,

    #[serde(default)]
    pub git_private_key: Option<String>,

    #[serde(default)]
    pub git_passphrase: Option<String>,

    /// Command (program followed by arguments) of the external checker used
    /// when there is neither a notification nor a previous version
    #[serde(default)]
    pub legacy_check: Vec<String>,

    /// Explicit mirror location; defaults to a per-URI cache directory
    #[serde(default)]
    pub mirror_dir: Option<PathBuf>,
}

fn default_delete_message() -> bool {
    true
}

fn require(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingRequired(key.to_string()).into());
    }
    Ok(())
}

/// Values that override `source` from the command line or the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mirror_dir: Option<PathBuf>,
    pub debug: bool,
}

impl Source {
    /// Validate required keys and value combinations
    ///
    /// The queue keys are checked separately by [`Source::validate_queue`],
    /// since a replayed check never contacts SQS.
    pub fn validate(&self) -> Result<()> {
        require("source.uri", &self.uri)?;

        if self.aws_access_key_id.is_some() != self.aws_secret_access_key.is_some() {
            return Err(ConfigError::InvalidValue {
                key: "source.aws_access_key_id".to_string(),
                reason: "aws_access_key_id and aws_secret_access_key must be set together"
                    .to_string(),
            }
            .into());
        }

        if let Some(branch) = &self.branch
            && branch.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                key: "source.branch".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        if self.git_password.is_some() && self.git_private_key.is_some() {
            return Err(ConfigError::InvalidValue {
                key: "source.git_private_key".to_string(),
                reason: "use either git_password or git_private_key, not both".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Validate the keys needed to reach the SQS queue
    pub fn validate_queue(&self) -> Result<()> {
        require("source.queue", &self.queue)?;
        require("source.aws_region", &self.aws_region)
    }

    /// Apply command-line / environment overrides
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(dir) = &overrides.mirror_dir {
            self.mirror_dir = Some(dir.clone());
        }
        self.debug |= overrides.debug;
    }

    /// Branch to resolve when no notification names one
    pub fn branch_name(&self) -> &str {
        self.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }

    /// Where the mirror of `uri` lives
    pub fn mirror_path(&self) -> PathBuf {
        self.mirror_dir
            .clone()
            .unwrap_or_else(|| PlatformPaths::default_mirror_path(&self.uri))
    }

    /// Credentials handed to the git fetch
    pub fn git_credentials(&self) -> GitCredentials {
        GitCredentials {
            username: self.git_username.clone(),
            password: self.git_password.clone(),
            private_key: self.git_private_key.clone(),
            passphrase: self.git_passphrase.clone(),
        }
    }
}
