use std::fmt::{self, Display};

use serde::Deserialize;
use thiserror::Error;

pub type Result<T, E = RosaError> = std::result::Result<T, E>;

/// Every way a command can fail. Nothing in the library exits the process;
/// `main` maps any of these to exit status 1.
#[derive(Debug, Error)]
pub enum RosaError {
    /// A flag or flag combination was rejected before anything remote was contacted.
    #[error("{0}")]
    Validation(String),

    #[error("Invalid mode. Allowed values are [auto manual]")]
    InvalidMode,

    #[error(
        "Cluster name, identifier or external identifier '{0}' isn't valid: it must contain only letters, digits, dashes and underscores"
    )]
    InvalidClusterKey(String),

    #[error("There is no cluster with identifier or name '{0}'")]
    ClusterNotFound(String),

    #[error("Cluster '{0}' is not yet ready")]
    ClusterNotReady(String),

    #[error("OIDC config with ID '{0}' not found")]
    OidcConfigNotFound(String),

    #[error("There are {count} clusters using OIDC config '{id}', can't delete the configuration")]
    OidcConfigInUse { id: String, count: usize },

    #[error("Not logged in, run 'rosa login' or set ROSA_TOKEN")]
    NotLoggedIn,

    #[error("Operation cancelled by user")]
    Cancelled,

    #[error("failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    /// A remote call failed; `operation` names what was being attempted.
    #[error("{operation}: {source}")]
    Api {
        operation: String,
        #[source]
        source: RemoteError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RosaError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn api(operation: impl Into<String>, source: impl Into<RemoteError>) -> Self {
        Self::Api {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

/// Failure reported by a remote service or the transport in front of it.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Ocm(#[from] OcmApiError),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Cloud(#[from] anyhow::Error),
}

/// Error document returned by the OCM API alongside a non-2xx status.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct OcmApiError {
    #[serde(skip)]
    pub status: u16,

    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub operation_id: String,
}

impl OcmApiError {
    /// Builds the error from a response body, falling back to the raw text
    /// when the body isn't an OCM error document (SSO errors, proxies).
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<OcmApiError>(body) {
            Ok(mut e) if !e.code.is_empty() || !e.reason.is_empty() => {
                e.status = status;
                e
            }
            _ => Self {
                status,
                reason: body.trim().to_string(),
                ..Default::default()
            },
        }
    }
}

impl Display for OcmApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status is {}", self.status)?;
        if !self.code.is_empty() {
            write!(f, ", code is '{}'", self.code)?;
        }
        if !self.operation_id.is_empty() {
            write!(f, " and operation identifier is '{}'", self.operation_id)?;
        }
        if !self.reason.is_empty() {
            write!(f, ": {}", self.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for OcmApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocm_error_body() {
        let body = r#"{"kind":"Error","id":"404","href":"/api/clusters_mgmt/v1/errors/404","code":"CLUSTERS-MGMT-404","reason":"OIDC config with id 'abc' not found","operation_id":"op-1"}"#;
        let err = OcmApiError::from_body(404, body);
        assert_eq!(err.status, 404);
        assert_eq!(err.code, "CLUSTERS-MGMT-404");
        assert_eq!(
            err.to_string(),
            "status is 404, code is 'CLUSTERS-MGMT-404' and operation identifier is 'op-1': OIDC config with id 'abc' not found"
        );
    }

    #[test]
    fn non_json_error_body() {
        let err = OcmApiError::from_body(502, "bad gateway\n");
        assert_eq!(err.to_string(), "status is 502: bad gateway");
    }

    #[test]
    fn api_error_prefixes_operation() {
        let err = RosaError::api(
            "Failed to get identity providers for cluster 'c1'",
            OcmApiError::from_body(500, "boom"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to get identity providers for cluster 'c1': status is 500: boom"
        );
    }
}
