#![allow(dead_code)]

pub mod parser;

use anyhow::anyhow;
use async_trait::async_trait;
use clap::Parser;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rosa::client::OcmApi;
use rosa::cloud::CloudProvider;
use rosa::commands::Cli;
use rosa::error::{OcmApiError, RemoteError};
use rosa::keys::IssuerDocuments;
use rosa::models::{
    strip_scheme, Cluster, ClusterState, Console, IdentityProvider, IdpType, OidcConfig,
    OidcConfigSpec,
};
use rosa::reporter::{Captured, Reporter};
use rosa::runtime::RuntimeContext;
use rosa::Result;

pub const ACCOUNT_ID: &str = "123456789012";
pub const REGION: &str = "us-east-2";
pub const MANAGED_ISSUER_HOST: &str = "oidc.os1.devshift.org";

#[derive(Default)]
pub struct OcmState {
    pub clusters: Vec<Cluster>,
    pub idps: HashMap<String, Vec<IdentityProvider>>,
    pub oidc_configs: Vec<OidcConfig>,
    /// OIDC config id to the clusters installed with it
    pub oidc_config_users: HashMap<String, Vec<Cluster>>,
    pub fail_idps: bool,
    pub idp_fetches: usize,
    pub requests: usize,
    next_id: u32,
}

/// In-memory stand-in for the cluster-management service
#[derive(Clone, Default)]
pub struct FakeOcm(Arc<Mutex<OcmState>>);

impl FakeOcm {
    pub fn state(&self) -> MutexGuard<'_, OcmState> {
        self.0.lock().unwrap()
    }

    pub fn add_cluster(&self, name: &str, state: ClusterState, idps: Vec<IdentityProvider>) {
        let mut s = self.state();
        let id = format!("id-{}", name);
        s.clusters.push(Cluster {
            id: id.clone(),
            name: name.into(),
            external_id: String::new(),
            state,
            console: Some(Console {
                url: format!("https://console-openshift-console.apps.{}.example.com", name),
            }),
        });
        s.idps.insert(id, idps);
    }

    /// Registers a ready cluster installed with the given OIDC config
    pub fn add_cluster_using(&self, name: &str, oidc_config_id: &str) {
        self.add_cluster(name, ClusterState::Ready, Vec::new());
        let mut s = self.state();
        let cluster = s.clusters.last().cloned().unwrap();
        s.oidc_config_users
            .entry(oidc_config_id.to_string())
            .or_default()
            .push(cluster);
    }
}

fn not_found(what: &str) -> RemoteError {
    OcmApiError::from_body(404, &format!("{} not found", what)).into()
}

#[async_trait]
impl OcmApi for FakeOcm {
    async fn get_cluster(&self, key: &str) -> Result<Option<Cluster>, RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        Ok(s
            .clusters
            .iter()
            .find(|c| c.id == key || c.name == key || c.external_id == key)
            .cloned())
    }

    async fn get_identity_providers(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<IdentityProvider>, RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        s.idp_fetches += 1;
        if s.fail_idps {
            return Err(OcmApiError::from_body(500, "internal error").into());
        }
        Ok(s.idps.get(cluster_id).cloned().unwrap_or_default())
    }

    async fn list_oidc_configs(&self) -> Result<Vec<OidcConfig>, RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        Ok(s.oidc_configs.clone())
    }

    async fn get_oidc_config(&self, id: &str) -> Result<Option<OidcConfig>, RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        Ok(s.oidc_configs.iter().find(|c| c.id == id).cloned())
    }

    async fn create_oidc_config(&self, spec: &OidcConfigSpec) -> Result<OidcConfig, RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        s.next_id += 1;
        let id = format!("2f{:030x}", s.next_id);
        let config = if spec.managed {
            OidcConfig {
                issuer_url: format!("https://{}/{}", MANAGED_ISSUER_HOST, id),
                id,
                managed: true,
                reusable: true,
                ..Default::default()
            }
        } else {
            OidcConfig {
                id,
                managed: false,
                issuer_url: spec.issuer_url.clone().unwrap_or_default(),
                secret_arn: spec.secret_arn.clone(),
                installer_role_arn: spec.installer_role_arn.clone(),
                reusable: true,
                creation_timestamp: None,
            }
        };
        s.oidc_configs.push(config.clone());
        Ok(config)
    }

    async fn delete_oidc_config(&self, id: &str) -> Result<(), RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        let before = s.oidc_configs.len();
        s.oidc_configs.retain(|c| c.id != id);
        if s.oidc_configs.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn clusters_using_oidc_config(&self, id: &str) -> Result<Vec<Cluster>, RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        Ok(s.oidc_config_users.get(id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct CloudState {
    pub providers: Vec<String>,
    pub buckets: HashMap<String, IssuerDocuments>,
    pub secrets: Vec<String>,
    pub requests: usize,
}

/// In-memory stand-in for IAM, S3 and Secrets Manager
#[derive(Clone, Default)]
pub struct FakeCloud(Arc<Mutex<CloudState>>);

impl FakeCloud {
    pub fn state(&self) -> MutexGuard<'_, CloudState> {
        self.0.lock().unwrap()
    }
}

#[async_trait]
impl CloudProvider for FakeCloud {
    fn region(&self) -> Option<&str> {
        Some(REGION)
    }

    async fn create_oidc_provider(&self, issuer_url: &str) -> Result<String, RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        let arn = format!(
            "arn:aws:iam::{}:oidc-provider/{}",
            ACCOUNT_ID,
            strip_scheme(issuer_url)
        );
        s.providers.push(arn.clone());
        Ok(arn)
    }

    async fn find_oidc_provider(&self, issuer_url: &str) -> Result<Option<String>, RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        let suffix = format!("oidc-provider/{}", strip_scheme(issuer_url));
        Ok(s.providers.iter().find(|a| a.ends_with(&suffix)).cloned())
    }

    async fn delete_oidc_provider(&self, arn: &str) -> Result<(), RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        s.providers.retain(|a| a != arn);
        Ok(())
    }

    async fn publish_issuer(
        &self,
        bucket: &str,
        documents: &IssuerDocuments,
    ) -> Result<(), RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        s.buckets.insert(bucket.to_string(), documents.clone());
        Ok(())
    }

    async fn delete_issuer(&self, bucket: &str) -> Result<(), RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        match s.buckets.remove(bucket) {
            Some(_) => Ok(()),
            None => Err(anyhow!("NoSuchBucket: The specified bucket '{}' does not exist", bucket).into()),
        }
    }

    async fn create_secret(&self, name: &str, _value: &str) -> Result<String, RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        let arn = format!(
            "arn:aws:secretsmanager:{}:{}:secret:{}-AbCdEf",
            REGION, ACCOUNT_ID, name
        );
        s.secrets.push(arn.clone());
        Ok(arn)
    }

    async fn delete_secret(&self, arn: &str) -> Result<(), RemoteError> {
        let mut s = self.state();
        s.requests += 1;
        s.secrets.retain(|a| a != arn);
        Ok(())
    }
}

pub struct Harness {
    pub ocm: FakeOcm,
    pub cloud: FakeCloud,
    pub ctx: RuntimeContext,
    pub output: Captured,
}

impl Harness {
    pub fn new() -> Self {
        let ocm = FakeOcm::default();
        let cloud = FakeCloud::default();
        let (reporter, output) = Reporter::buffered();
        let ctx = RuntimeContext::new(Box::new(ocm.clone()), Box::new(cloud.clone()), reporter);
        Self {
            ocm,
            cloud,
            ctx,
            output,
        }
    }

    /// Runs a command line the way the binary would, minus the process.
    /// Returns everything reported, with a failure appended as an `E:` line.
    pub async fn run(&self, args: &[&str]) -> (Result<()>, String) {
        self.output.clear();
        let argv = std::iter::once("rosa").chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv).unwrap();
        let result = match cli.action.prepare() {
            Ok(operation) => operation.execute(&self.ctx).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.ctx.reporter.error(e.to_string());
        }
        (result, self.output.contents())
    }

    pub fn remote_requests(&self) -> usize {
        self.ocm.state().requests + self.cloud.state().requests
    }
}

pub fn idp(name: &str, idp_type: IdpType) -> IdentityProvider {
    IdentityProvider {
        id: format!("idp-{}", name),
        name: name.into(),
        idp_type,
        mapping_method: Some("claim".into()),
        details: Default::default(),
    }
}
