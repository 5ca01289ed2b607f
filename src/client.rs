use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{OcmApiError, RemoteError, Result, RosaError};
use crate::models::{Cluster, IdentityProvider, OidcConfig, OidcConfigSpec, Page};

const CLUSTERS_MGMT: &str = "/api/clusters_mgmt/v1";
const PAGE_SIZE: u32 = 100;

/// Calls made against the cluster-management service. Each method is a
/// single request/response exchange (or a walk over every page of one).
#[async_trait]
pub trait OcmApi: Send + Sync {
    /// Looks a cluster up by id, name or external id.
    async fn get_cluster(&self, key: &str) -> Result<Option<Cluster>, RemoteError>;
    async fn get_identity_providers(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<IdentityProvider>, RemoteError>;
    async fn list_oidc_configs(&self) -> Result<Vec<OidcConfig>, RemoteError>;
    async fn get_oidc_config(&self, id: &str) -> Result<Option<OidcConfig>, RemoteError>;
    async fn create_oidc_config(&self, spec: &OidcConfigSpec) -> Result<OidcConfig, RemoteError>;
    async fn delete_oidc_config(&self, id: &str) -> Result<(), RemoteError>;
    async fn clusters_using_oidc_config(&self, id: &str) -> Result<Vec<Cluster>, RemoteError>;
}

pub struct Client {
    base_url: String,
    access_token: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl Client {
    /// Authenticates with the credentials in `config`. A stored access token
    /// is used as-is, otherwise the refresh token is exchanged once.
    pub async fn connect(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("rosa/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RosaError::api("Failed to create OCM client", e))?;

        let access_token = match (&config.access_token, &config.refresh_token) {
            (Some(token), _) => token.clone(),
            (None, Some(refresh)) => {
                exchange_refresh_token(&http, config, refresh)
                    .await
                    .map_err(|e| RosaError::api("Failed to authenticate with OCM", e))?
            }
            (None, None) => return Err(RosaError::NotLoggedIn),
        };

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            access_token,
            http,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}{}", self.base_url, CLUSTERS_MGMT, path);
        debug!("{} {}", method, url);
        self.http
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        search: Option<&str>,
    ) -> Result<Vec<T>, RemoteError> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let mut req = self
                .request(Method::GET, path)
                .query(&[("page", page), ("size", PAGE_SIZE)]);
            if let Some(search) = search {
                req = req.query(&[("search", search)]);
            }
            let resp: Page<T> = decode(req.send().await?).await?;
            let count = resp.items.len();
            items.extend(resp.items);
            if count < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }
        Ok(items)
    }
}

#[async_trait]
impl OcmApi for Client {
    async fn get_cluster(&self, key: &str) -> Result<Option<Cluster>, RemoteError> {
        let search = format!(
            "product.id = 'rosa' and (id = '{key}' or name = '{key}' or external_id = '{key}')"
        );
        let req = self
            .request(Method::GET, "/clusters")
            .query(&[("search", search.as_str()), ("size", "1")]);
        let page: Page<Cluster> = decode(req.send().await?).await?;
        Ok(page.items.into_iter().next())
    }

    async fn get_identity_providers(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<IdentityProvider>, RemoteError> {
        self.list_all(&format!("/clusters/{}/identity_providers", cluster_id), None)
            .await
    }

    async fn list_oidc_configs(&self) -> Result<Vec<OidcConfig>, RemoteError> {
        self.list_all("/oidc_configs", None).await
    }

    async fn get_oidc_config(&self, id: &str) -> Result<Option<OidcConfig>, RemoteError> {
        let resp = self
            .request(Method::GET, &format!("/oidc_configs/{}", id))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(decode(resp).await?))
    }

    async fn create_oidc_config(&self, spec: &OidcConfigSpec) -> Result<OidcConfig, RemoteError> {
        let resp = self
            .request(Method::POST, "/oidc_configs")
            .json(spec)
            .send()
            .await?;
        decode(resp).await
    }

    async fn delete_oidc_config(&self, id: &str) -> Result<(), RemoteError> {
        let resp = self
            .request(Method::DELETE, &format!("/oidc_configs/{}", id))
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }

    async fn clusters_using_oidc_config(&self, id: &str) -> Result<Vec<Cluster>, RemoteError> {
        let search = format!("aws.sts.oidc_config.id = '{}'", id);
        self.list_all("/clusters", Some(&search)).await
    }
}

async fn exchange_refresh_token(
    http: &reqwest::Client,
    config: &Config,
    refresh_token: &str,
) -> Result<String, RemoteError> {
    debug!("exchanging refresh token at {}", config.token_url);
    let resp = http
        .post(&config.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await?;
    let token: TokenResponse = decode(resp).await?;
    Ok(token.access_token)
}

async fn check(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await?;
    Err(OcmApiError::from_body(status.as_u16(), &body).into())
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, RemoteError> {
    Ok(check(resp).await?.json().await?)
}
