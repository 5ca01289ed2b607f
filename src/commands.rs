use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::client::Client;
use crate::config::{resolve_config_path, Config};
use crate::error::{Result, RosaError};
use crate::idp::{self, ListIdps, ListIdpsArgs};
use crate::oidc::{self, CreateOidcConfig, DeleteOidcConfig, RegisterOidcConfig};
use crate::output::OutputFormat;
use crate::reporter::Reporter;
use crate::runtime::RuntimeContext;

#[derive(Debug, Parser)]
#[clap(name = "rosa", version, about = "Command line tool for Red Hat OpenShift Service on AWS", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub action: Action,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to the rosa config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// AWS region, overrides the AWS environment and profile
    #[arg(long, global = true)]
    pub region: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// List resources
    #[command(subcommand)]
    List(ListResource),

    /// Create resources
    #[command(subcommand)]
    Create(CreateResource),

    /// Register existing resources
    #[command(subcommand)]
    Register(RegisterResource),

    /// Delete resources
    #[command(subcommand)]
    Delete(DeleteResource),

    /// Log in to the cluster-management API with an offline token
    Login(LoginArgs),

    /// Remove stored credentials
    Logout,
}

#[derive(Debug, Subcommand)]
pub enum ListResource {
    /// List identity providers of a cluster
    #[command(name = "idps", alias = "idp")]
    Idps(ListIdpsArgs),

    /// List OIDC configs
    #[command(name = "oidc-config", alias = "oidc-configs")]
    OidcConfig(oidc::ListArgs),
}

#[derive(Debug, Subcommand)]
pub enum CreateResource {
    /// Create an OIDC config
    #[command(name = "oidc-config")]
    OidcConfig(oidc::CreateArgs),
}

#[derive(Debug, Subcommand)]
pub enum RegisterResource {
    /// Register an unmanaged OIDC config whose issuer is already hosted
    #[command(name = "oidc-config")]
    OidcConfig(oidc::RegisterArgs),
}

#[derive(Debug, Subcommand)]
pub enum DeleteResource {
    /// Delete an OIDC config
    #[command(name = "oidc-config")]
    OidcConfig(oidc::DeleteArgs),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Offline access token
    #[arg(short, long)]
    pub token: Option<String>,

    /// Base URL of the cluster-management API
    #[arg(long)]
    pub url: Option<String>,

    /// SSO endpoint used to exchange the token
    #[arg(long)]
    pub token_url: Option<String>,
}

/// A command whose flags have been checked. Executing it is the only step
/// that talks to remote services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    ListIdps(ListIdps),
    ListOidcConfigs(Option<OutputFormat>),
    CreateOidcConfig(CreateOidcConfig),
    RegisterOidcConfig(RegisterOidcConfig),
    DeleteOidcConfig(DeleteOidcConfig),
    Login {
        token: String,
        url: Option<String>,
        token_url: Option<String>,
    },
    Logout,
}

impl Action {
    pub fn prepare(self) -> Result<Operation> {
        Ok(match self {
            Action::List(ListResource::Idps(args)) => Operation::ListIdps(args.prepare()?),
            Action::List(ListResource::OidcConfig(args)) => Operation::ListOidcConfigs(args.output),
            Action::Create(CreateResource::OidcConfig(args)) => {
                Operation::CreateOidcConfig(args.prepare()?)
            }
            Action::Register(RegisterResource::OidcConfig(args)) => {
                Operation::RegisterOidcConfig(args.prepare()?)
            }
            Action::Delete(DeleteResource::OidcConfig(args)) => {
                Operation::DeleteOidcConfig(args.prepare()?)
            }
            Action::Login(args) => {
                let token = args
                    .token
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| RosaError::validation("token is required, use --token"))?;
                Operation::Login {
                    token,
                    url: args.url,
                    token_url: args.token_url,
                }
            }
            Action::Logout => Operation::Logout,
        })
    }
}

impl Operation {
    pub async fn execute(&self, ctx: &RuntimeContext) -> Result<()> {
        match self {
            Operation::ListIdps(req) => idp::list_idps(ctx, req).await,
            Operation::ListOidcConfigs(output) => oidc::list(ctx, *output).await,
            Operation::CreateOidcConfig(req) => oidc::create(ctx, req).await,
            Operation::RegisterOidcConfig(req) => oidc::register(ctx, req).await,
            Operation::DeleteOidcConfig(req) => oidc::delete(ctx, req).await,
            Operation::Login { .. } | Operation::Logout => Err(RosaError::validation(
                "login and logout run without a runtime context",
            )),
        }
    }
}

impl Cli {
    /// Validates flags, then builds the runtime context and runs the command
    pub async fn run(self) -> Result<()> {
        let operation = self.action.prepare()?;
        let reporter = Reporter::stdio();
        match operation {
            Operation::Login {
                token,
                url,
                token_url,
            } => login(self.config, token, url, token_url, &reporter).await,
            Operation::Logout => logout(self.config, &reporter),
            operation => {
                let config =
                    Config::load_config(self.config.as_ref()).map_err(RosaError::Config)?;
                let ctx = RuntimeContext::connect(&config, self.region).await?;
                operation.execute(&ctx).await
            }
        }
    }
}

async fn login(
    config_path: Option<PathBuf>,
    token: String,
    url: Option<String>,
    token_url: Option<String>,
    reporter: &Reporter,
) -> Result<()> {
    let path = resolve_config_path(config_path.as_ref()).map_err(RosaError::Config)?;
    let mut config = if path.exists() {
        Config::load_config(Some(&path)).map_err(RosaError::Config)?
    } else {
        Config::default()
    };
    config.refresh_token = Some(token);
    config.access_token = None;
    if let Some(url) = url {
        config.url = url;
    }
    if let Some(token_url) = token_url {
        config.token_url = token_url;
    }

    // fails early on a revoked or mistyped token
    Client::connect(&config).await?;

    config.save(&path).map_err(RosaError::Config)?;
    reporter.info(format!(
        "Logged in to '{}', credentials saved to '{}'",
        config.url,
        path.display()
    ));
    Ok(())
}

fn logout(config_path: Option<PathBuf>, reporter: &Reporter) -> Result<()> {
    let path = resolve_config_path(config_path.as_ref()).map_err(RosaError::Config)?;
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    reporter.info("Logged out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oidc::Mode;

    fn prepare(args: &[&str]) -> Result<Operation> {
        Cli::try_parse_from(args).unwrap().action.prepare()
    }

    #[test]
    fn list_idps_flags() {
        let op = prepare(&["rosa", "list", "idps", "--cluster=mycluster", "-o", "json"]).unwrap();
        assert_eq!(
            op,
            Operation::ListIdps(ListIdps {
                cluster_key: "mycluster".into(),
                output: Some(OutputFormat::Json),
            })
        );
    }

    #[test]
    fn idp_alias() {
        assert!(prepare(&["rosa", "list", "idp", "-c", "mycluster"]).is_ok());
    }

    #[test]
    fn managed_flag_forms() {
        let op = prepare(&[
            "rosa",
            "create",
            "oidc-config",
            "--mode",
            "manual",
            "--managed=false",
        ])
        .unwrap();
        assert!(matches!(
            op,
            Operation::CreateOidcConfig(CreateOidcConfig::Unmanaged {
                mode: Mode::Manual,
                ..
            })
        ));

        let op = prepare(&["rosa", "create", "oidc-config", "--mode", "auto", "--managed", "-y"])
            .unwrap();
        assert_eq!(
            op,
            Operation::CreateOidcConfig(CreateOidcConfig::Managed {
                mode: Mode::Auto,
                yes: true
            })
        );
    }

    #[test]
    fn delete_flags() {
        let op = prepare(&[
            "rosa",
            "delete",
            "oidc-config",
            "--oidc-config-id",
            "abc",
            "--mode",
            "auto",
            "-y",
        ])
        .unwrap();
        assert_eq!(
            op,
            Operation::DeleteOidcConfig(DeleteOidcConfig {
                id: "abc".into(),
                mode: Mode::Auto,
                yes: true
            })
        );
    }

    #[test]
    fn login_requires_token() {
        assert!(prepare(&["rosa", "login"]).is_err());
        let op = prepare(&["rosa", "login", "--token", "abc"]).unwrap();
        assert!(matches!(op, Operation::Login { token, url: None, token_url: None } if token == "abc"));
    }
}
