use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Host segment of the console route, swapped for the OAuth route when
/// deriving callback URLs.
const CONSOLE_HOST_SEGMENT: &str = "console-openshift-console";
const OAUTH_HOST_SEGMENT: &str = "oauth-openshift";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Cluster {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_id: String,

    #[serde(default)]
    pub state: ClusterState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<Console>,
}

impl Cluster {
    pub fn console_url(&self) -> &str {
        self.console.as_ref().map(|c| c.url.as_str()).unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Console {
    #[serde(default)]
    pub url: String,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    Error,
    Hibernating,
    Installing,
    Pending,
    PoweringDown,
    Ready,
    Resuming,
    Uninstalling,
    Validating,
    Waiting,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Identity provider as returned by the API. Provider specific blocks
/// (`github`, `htpasswd`, ...) are kept untouched in `details` so that
/// structured output reproduces the record verbatim.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct IdentityProvider {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    pub name: String,

    #[serde(rename = "type")]
    pub idp_type: IdpType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_method: Option<String>,

    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl IdentityProvider {
    /// OAuth callback URL users register with the external provider. Empty
    /// for providers that authenticate in-cluster.
    pub fn auth_url(&self, console_url: &str) -> String {
        auth_url(console_url, &self.name, self.idp_type)
    }
}

pub fn auth_url(console_url: &str, idp_name: &str, idp_type: IdpType) -> String {
    if !idp_type.has_oauth_callback() {
        return String::new();
    }
    let oauth_url = console_url.replacen(CONSOLE_HOST_SEGMENT, OAUTH_HOST_SEGMENT, 1);
    format!("{}/oauth2callback/{}", oauth_url, idp_name)
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum IdpType {
    #[serde(rename = "GithubIdentityProvider")]
    GitHub,
    #[serde(rename = "GitlabIdentityProvider")]
    GitLab,
    #[serde(rename = "GoogleIdentityProvider")]
    Google,
    #[serde(rename = "HTPasswdIdentityProvider")]
    HtPasswd,
    #[serde(rename = "LDAPIdentityProvider")]
    Ldap,
    #[serde(rename = "OpenIDIdentityProvider")]
    OpenId,
}

impl IdpType {
    pub const ALL: [IdpType; 6] = [
        IdpType::GitHub,
        IdpType::GitLab,
        IdpType::Google,
        IdpType::HtPasswd,
        IdpType::Ldap,
        IdpType::OpenId,
    ];

    /// Whether users are redirected back through the cluster's OAuth server.
    /// Password based providers are checked in-cluster and have no callback.
    pub fn has_oauth_callback(self) -> bool {
        match self {
            IdpType::HtPasswd => false,
            IdpType::GitHub
            | IdpType::GitLab
            | IdpType::Google
            | IdpType::Ldap
            | IdpType::OpenId => true,
        }
    }
}

impl Display for IdpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IdpType::GitHub => "GitHub",
            IdpType::GitLab => "GitLab",
            IdpType::Google => "Google",
            IdpType::HtPasswd => "HTPasswd",
            IdpType::Ldap => "LDAP",
            IdpType::OpenId => "OpenID",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct OidcConfig {
    pub id: String,

    #[serde(default)]
    pub managed: bool,

    #[serde(default)]
    pub issuer_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_role_arn: Option<String>,

    #[serde(default)]
    pub reusable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
}

impl OidcConfig {
    /// Issuer URL without the scheme, the form IAM uses in provider ARNs
    pub fn issuer_host_path(&self) -> &str {
        strip_scheme(&self.issuer_url)
    }
}

pub fn strip_scheme(url: &str) -> &str {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

/// Body posted to create or register an OIDC config
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct OidcConfigSpec {
    pub managed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_arn: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer_role_arn: Option<String>,
}

impl OidcConfigSpec {
    pub fn managed() -> Self {
        Self {
            managed: true,
            ..Default::default()
        }
    }

    pub fn unmanaged(issuer_url: String, secret_arn: String, installer_role_arn: String) -> Self {
        Self {
            managed: false,
            issuer_url: Some(issuer_url),
            secret_arn: Some(secret_arn),
            installer_role_arn: Some(installer_role_arn),
        }
    }
}

/// One page of a collection endpoint
#[derive(Clone, Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub page: u32,

    #[serde(default)]
    pub size: u32,

    #[serde(default)]
    pub total: u32,

    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_url_swaps_console_host() {
        assert_eq!(
            auth_url("https://console-openshift-console.foo", "bar", IdpType::GitHub),
            "https://oauth-openshift.foo/oauth2callback/bar"
        );
    }

    #[test]
    fn auth_url_empty_for_password_type() {
        assert_eq!(
            auth_url("https://console-openshift-console.foo", "bar", IdpType::HtPasswd),
            ""
        );
    }

    #[test]
    fn auth_url_replaces_first_occurrence_only() {
        assert_eq!(
            auth_url(
                "https://console-openshift-console.apps.console-openshift-console.io",
                "gl",
                IdpType::GitLab
            ),
            "https://oauth-openshift.apps.console-openshift-console.io/oauth2callback/gl"
        );
    }

    #[test]
    fn only_htpasswd_lacks_callback() {
        let callbackless: Vec<_> = IdpType::ALL
            .into_iter()
            .filter(|t| !t.has_oauth_callback())
            .collect();
        assert_eq!(callbackless, vec![IdpType::HtPasswd]);
    }

    #[test]
    fn identity_provider_keeps_details() {
        let raw = serde_json::json!({
            "kind": "IdentityProvider",
            "id": "1a2b",
            "name": "github-1",
            "type": "GithubIdentityProvider",
            "mapping_method": "claim",
            "github": { "client_id": "abc", "organizations": ["org"] }
        });
        let idp: IdentityProvider = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(idp.idp_type, IdpType::GitHub);
        assert_eq!(idp.idp_type.to_string(), "GitHub");
        assert_eq!(serde_json::to_value(&idp).unwrap(), raw);
    }

    #[test]
    fn cluster_state_unknown_fallback() {
        let cluster: Cluster =
            serde_json::from_str(r#"{"id":"c1","name":"mycluster","state":"something_new"}"#)
                .unwrap();
        assert_eq!(cluster.state, ClusterState::Unknown);
        assert_eq!(cluster.console_url(), "");
    }

    #[test]
    fn issuer_host_path_strips_scheme() {
        let config = OidcConfig {
            issuer_url: "https://oidc.os1.devshift.org/abc123/".into(),
            ..Default::default()
        };
        assert_eq!(config.issuer_host_path(), "oidc.os1.devshift.org/abc123");
    }
}
