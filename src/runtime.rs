use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::client::{Client, OcmApi};
use crate::cloud::{AwsProvider, CloudProvider};
use crate::config::Config;
use crate::error::{Result, RosaError};
use crate::models::Cluster;
use crate::reporter::Reporter;

/// Everything an operation talks to. Built once per invocation and passed
/// explicitly; dropping it releases the client handles.
pub struct RuntimeContext {
    pub ocm: Box<dyn OcmApi>,
    pub cloud: Box<dyn CloudProvider>,
    pub reporter: Reporter,
}

impl RuntimeContext {
    pub fn new(ocm: Box<dyn OcmApi>, cloud: Box<dyn CloudProvider>, reporter: Reporter) -> Self {
        Self {
            ocm,
            cloud,
            reporter,
        }
    }

    /// Authenticates against OCM and resolves the AWS environment
    pub async fn connect(config: &Config, region: Option<String>) -> Result<Self> {
        if !config.is_logged_in() {
            return Err(RosaError::NotLoggedIn);
        }
        let ocm = Client::connect(config).await?;
        let cloud = AwsProvider::load(region).await;
        Ok(Self::new(Box::new(ocm), Box::new(cloud), Reporter::stdio()))
    }

    /// Resolves a cluster by id, name or external id
    pub async fn fetch_cluster(&self, key: &str) -> Result<Cluster> {
        debug!("Loading cluster '{}'", key);
        self.ocm
            .get_cluster(key)
            .await
            .map_err(|e| RosaError::api(format!("Failed to get cluster '{}'", key), e))?
            .ok_or_else(|| RosaError::ClusterNotFound(key.to_string()))
    }

    /// Asks before a change unless `yes` was given. Without a terminal there
    /// is nobody to ask, so `-y` is required.
    pub fn confirm(&self, prompt: &str, yes: bool) -> Result<()> {
        if yes {
            return Ok(());
        }
        if !self.reporter.is_terminal() {
            return Err(RosaError::validation(format!(
                "{} Confirmation is required, use -y to run non-interactively",
                prompt
            )));
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| RosaError::Io(std::io::Error::other(e.to_string())))?;
        if confirmed {
            Ok(())
        } else {
            Err(RosaError::Cancelled)
        }
    }
}

/// Letters, digits, dashes and underscores only, safe inside URL paths and
/// search expressions.
pub fn is_identifier(value: &str) -> bool {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER
        .get_or_init(|| Regex::new(r"^[\w-]+$").expect("valid regex"))
        .is_match(value)
}

/// Cluster keys are ids, names or external ids.
pub fn validate_cluster_key(key: &str) -> Result<()> {
    if is_identifier(key) {
        Ok(())
    } else {
        Err(RosaError::InvalidClusterKey(key.to_string()))
    }
}
