use clap::{ArgAction, Args};
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

use crate::cloud::{public_read_policy, OIDC_CLIENT_IDS};
use crate::error::{Result, RosaError};
use crate::keys::{IssuerDocuments, KeyPair, DISCOVERY_DOCUMENT_KEY, JWKS_KEY, KEY_BITS};
use crate::models::{OidcConfig, OidcConfigSpec};
use crate::output::{self, OutputFormat};
use crate::runtime::{is_identifier, RuntimeContext};

pub const MAX_PREFIX_LEN: usize = 15;
const BUCKET_SUFFIX_LEN: usize = 4;

/// Whether rosa performs the cloud side itself or prints what to run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Auto,
    Manual,
}

impl FromStr for Mode {
    type Err = RosaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Mode::Auto),
            "manual" => Ok(Mode::Manual),
            _ => Err(RosaError::InvalidMode),
        }
    }
}

fn parse_mode(mode: Option<&str>) -> Result<Mode> {
    mode.ok_or(RosaError::InvalidMode)?.parse()
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// How to perform the operation: auto or manual
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Prefix for the issuer bucket and secret of an unmanaged config
    #[arg(long)]
    pub prefix: Option<String>,

    /// Installer role ARN used to register an unmanaged config
    #[arg(long)]
    pub installer_role_arn: Option<String>,

    /// Let the service host the issuer and its keys
    #[arg(long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub managed: bool,

    /// Only generate the issuer files locally
    #[arg(long)]
    pub raw_files: bool,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Validated `create oidc-config` request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateOidcConfig {
    Managed {
        mode: Mode,
        yes: bool,
    },
    Unmanaged {
        mode: Mode,
        prefix: Option<String>,
        installer_role_arn: Option<String>,
        yes: bool,
    },
    RawFiles {
        prefix: Option<String>,
    },
}

impl CreateArgs {
    /// Checks flag combinations. Nothing remote is touched, so every
    /// rejection here is cheap and deterministic.
    pub fn prepare(self) -> Result<CreateOidcConfig> {
        if self.raw_files && self.mode.is_some() {
            return Err(RosaError::validation(
                "--raw-files param is not supported alongside --mode param",
            ));
        }
        let mode = if self.raw_files {
            None
        } else {
            Some(parse_mode(self.mode.as_deref())?)
        };

        if self.managed {
            if self.prefix.is_some() {
                return Err(RosaError::validation(
                    "prefix param is not supported for managed OIDC config",
                ));
            }
            if self.installer_role_arn.is_some() {
                return Err(RosaError::validation(
                    "role-arn param is not supported for managed OIDC config",
                ));
            }
            if self.raw_files {
                return Err(RosaError::validation(
                    "--raw-files param is not supported for managed OIDC config",
                ));
            }
        }

        if let Some(prefix) = &self.prefix {
            validate_prefix(prefix)?;
        }
        if let Some(arn) = &self.installer_role_arn {
            validate_role_arn(arn)?;
        }

        Ok(match mode {
            None => CreateOidcConfig::RawFiles {
                prefix: self.prefix,
            },
            Some(mode) if self.managed => CreateOidcConfig::Managed {
                mode,
                yes: self.yes,
            },
            Some(mode) => {
                if mode == Mode::Auto && self.installer_role_arn.is_none() {
                    return Err(RosaError::validation(
                        "installer-role-arn is required to create an unmanaged OIDC config in auto mode",
                    ));
                }
                CreateOidcConfig::Unmanaged {
                    mode,
                    prefix: self.prefix,
                    installer_role_arn: self.installer_role_arn,
                    yes: self.yes,
                }
            }
        })
    }
}

pub fn validate_prefix(prefix: &str) -> Result<()> {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(RosaError::validation(format!(
            "length of prefix is limited to {} characters",
            MAX_PREFIX_LEN
        )));
    }
    let re = PREFIX.get_or_init(|| Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));
    if !re.is_match(prefix) {
        return Err(RosaError::validation(format!(
            "prefix '{}' is invalid: it must start with a lowercase letter and contain only lowercase letters, digits and dashes",
            prefix
        )));
    }
    Ok(())
}

pub fn validate_role_arn(arn: &str) -> Result<()> {
    static ROLE_ARN: OnceLock<Regex> = OnceLock::new();
    let re = ROLE_ARN.get_or_init(|| {
        Regex::new(r"^arn:aws[\w-]*:iam::\d{12}:role/[\w+=,.@/-]+$").expect("valid regex")
    });
    if re.is_match(arn) {
        Ok(())
    } else {
        Err(RosaError::validation(format!(
            "'{}' is not a valid IAM role ARN",
            arn
        )))
    }
}

/// Name shared by the issuer bucket and the private key secret
pub fn issuer_bucket_name(prefix: Option<&str>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BUCKET_SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    match prefix {
        Some(prefix) => format!("{}-oidc-{}", prefix, suffix),
        None => format!("oidc-{}", suffix),
    }
}

pub fn issuer_url(bucket: &str, region: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com", bucket, region)
}

/// Bucket an unmanaged issuer URL is served from. Issuers hosted anywhere
/// but an S3 virtual-hosted endpoint have no bucket rosa knows about.
pub fn bucket_from_issuer_url(issuer_url: &str) -> Option<String> {
    static S3_HOST: OnceLock<Regex> = OnceLock::new();
    let re = S3_HOST.get_or_init(|| {
        Regex::new(r"^([a-z0-9][a-z0-9.-]*?)\.s3(?:[.-][a-z0-9-]+)?\.amazonaws\.com$")
            .expect("valid regex")
    });
    let url = url::Url::parse(issuer_url).ok()?;
    let host = url.host_str()?;
    re.captures(host).map(|c| c[1].to_string())
}

fn require_region(ctx: &RuntimeContext) -> Result<String> {
    ctx.cloud.region().map(str::to_string).ok_or_else(|| {
        RosaError::validation("AWS region is not set, use --region or set AWS_REGION")
    })
}

fn oidc_provider_command(issuer_url: &str) -> String {
    format!(
        "aws iam create-open-id-connect-provider \\\n\t--url {} \\\n\t--client-id-list {}",
        issuer_url,
        OIDC_CLIENT_IDS.join(" ")
    )
}

pub async fn create(ctx: &RuntimeContext, req: &CreateOidcConfig) -> Result<()> {
    match req {
        CreateOidcConfig::Managed { mode, yes } => create_managed(ctx, *mode, *yes).await,
        CreateOidcConfig::Unmanaged {
            mode: Mode::Auto,
            prefix,
            installer_role_arn,
            yes,
        } => {
            let role_arn = installer_role_arn.as_deref().ok_or_else(|| {
                RosaError::validation("installer-role-arn is required in auto mode")
            })?;
            create_unmanaged_auto(ctx, prefix.as_deref(), role_arn, *yes).await
        }
        CreateOidcConfig::Unmanaged {
            mode: Mode::Manual,
            prefix,
            installer_role_arn,
            ..
        } => create_unmanaged_manual(ctx, prefix.as_deref(), installer_role_arn.as_deref()),
        CreateOidcConfig::RawFiles { prefix } => {
            let bucket = issuer_bucket_name(prefix.as_deref());
            let region = require_region(ctx)?;
            let files = write_raw_files(Path::new("."), &bucket, &issuer_url(&bucket, &region))?;
            ctx.reporter.info(format!(
                "Generated OIDC issuer files: {}",
                files
                    .iter()
                    .map(|f| f.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            ctx.reporter.info(
                "Host the discovery document and keys under the issuer URL, store the private key in a secret, then run 'rosa register oidc-config'",
            );
            Ok(())
        }
    }
}

async fn register_with_ocm(ctx: &RuntimeContext, spec: &OidcConfigSpec) -> Result<OidcConfig> {
    let config = ctx
        .ocm
        .create_oidc_config(spec)
        .await
        .map_err(|e| RosaError::api("Failed to create OIDC config", e))?;
    ctx.reporter.info(format!(
        "Created OIDC config with ID '{}' and issuer URL '{}'",
        config.id, config.issuer_url
    ));
    Ok(config)
}

async fn create_oidc_provider(ctx: &RuntimeContext, issuer_url: &str) -> Result<String> {
    let arn = ctx
        .cloud
        .create_oidc_provider(issuer_url)
        .await
        .map_err(|e| RosaError::api("Failed to create OIDC provider", e))?;
    ctx.reporter
        .info(format!("Created OIDC provider with ARN '{}'", arn));
    Ok(arn)
}

async fn create_managed(ctx: &RuntimeContext, mode: Mode, yes: bool) -> Result<()> {
    if mode == Mode::Auto {
        ctx.confirm("Create the managed OIDC config?", yes)?;
    }
    let config = register_with_ocm(ctx, &OidcConfigSpec::managed()).await?;
    match mode {
        Mode::Auto => {
            create_oidc_provider(ctx, &config.issuer_url).await?;
        }
        Mode::Manual => {
            ctx.reporter
                .info("Run the following command to create the OIDC provider:");
            ctx.reporter.print(oidc_provider_command(&config.issuer_url));
        }
    }
    Ok(())
}

async fn create_unmanaged_auto(
    ctx: &RuntimeContext,
    prefix: Option<&str>,
    installer_role_arn: &str,
    yes: bool,
) -> Result<()> {
    let region = require_region(ctx)?;
    ctx.confirm("Create the unmanaged OIDC config and its AWS resources?", yes)?;

    let bucket = issuer_bucket_name(prefix);
    let issuer_url = issuer_url(&bucket, &region);
    debug!("generating signing key for {}", issuer_url);
    let keys = KeyPair::generate(KEY_BITS)?;
    let documents = IssuerDocuments::new(&issuer_url, &keys);

    ctx.cloud
        .publish_issuer(&bucket, &documents)
        .await
        .map_err(|e| RosaError::api(format!("Failed to publish issuer to bucket '{}'", bucket), e))?;
    ctx.reporter
        .info(format!("Created S3 bucket '{}' serving the issuer documents", bucket));

    let secret_arn = ctx
        .cloud
        .create_secret(&bucket, &keys.private_key_pem)
        .await
        .map_err(|e| RosaError::api("Failed to store the private key", e))?;
    ctx.reporter
        .info(format!("Created secret '{}' holding the private key", secret_arn));

    let spec = OidcConfigSpec::unmanaged(issuer_url, secret_arn, installer_role_arn.to_string());
    let config = register_with_ocm(ctx, &spec).await?;
    create_oidc_provider(ctx, &config.issuer_url).await?;
    Ok(())
}

fn create_unmanaged_manual(
    ctx: &RuntimeContext,
    prefix: Option<&str>,
    installer_role_arn: Option<&str>,
) -> Result<()> {
    let region = require_region(ctx)?;
    let bucket = issuer_bucket_name(prefix);
    let issuer_url = issuer_url(&bucket, &region);
    let files = write_raw_files(Path::new("."), &bucket, &issuer_url)?;
    let [private_key, discovery, jwks] = files.as_slice() else {
        return Err(RosaError::validation("unexpected set of issuer files"));
    };

    ctx.reporter
        .info("Run the following commands to create the unmanaged OIDC config:");
    ctx.reporter.print(
        manual_commands(
            &bucket,
            &region,
            &issuer_url,
            IssuerFiles {
                private_key,
                discovery,
                jwks,
            },
            installer_role_arn,
        )
        .join("\n"),
    );
    Ok(())
}

/// Local copies of the issuer material, as written by `write_raw_files`
struct IssuerFiles<'a> {
    private_key: &'a Path,
    discovery: &'a Path,
    jwks: &'a Path,
}

/// Shell commands standing in for `create_unmanaged_auto`. The IAM provider is
/// created by the `aws` line only, so registration runs in manual mode.
fn manual_commands(
    bucket: &str,
    region: &str,
    issuer_url: &str,
    files: IssuerFiles<'_>,
    installer_role_arn: Option<&str>,
) -> Vec<String> {
    let mut create_bucket = format!("aws s3api create-bucket --bucket {} --region {}", bucket, region);
    if region != "us-east-1" {
        create_bucket.push_str(&format!(
            " --create-bucket-configuration LocationConstraint={}",
            region
        ));
    }
    vec![
        create_bucket,
        format!(
            "aws s3api put-public-access-block --bucket {} --public-access-block-configuration \
             BlockPublicAcls=true,IgnorePublicAcls=true,BlockPublicPolicy=false,RestrictPublicBuckets=false",
            bucket
        ),
        format!(
            "aws s3api put-bucket-policy --bucket {} --policy '{}'",
            bucket,
            public_read_policy(bucket)
        ),
        format!(
            "aws s3api put-object --bucket {} --key {} --body {} --content-type application/json",
            bucket,
            DISCOVERY_DOCUMENT_KEY,
            files.discovery.display()
        ),
        format!(
            "aws s3api put-object --bucket {} --key {} --body {} --content-type application/json",
            bucket,
            JWKS_KEY,
            files.jwks.display()
        ),
        format!(
            "aws secretsmanager create-secret --name {} --secret-string file://{}",
            bucket,
            files.private_key.display()
        ),
        oidc_provider_command(issuer_url).replace(" \\\n\t", " "),
        format!(
            "rosa register oidc-config --issuer-url {} --secret-arn <secret-arn> --role-arn {} --mode manual",
            issuer_url,
            installer_role_arn.unwrap_or("<installer-role-arn>")
        ),
    ]
}

/// Writes the private key, discovery document and JWKS for `bucket` into `dir`
pub fn write_raw_files(dir: &Path, bucket: &str, issuer_url: &str) -> Result<Vec<PathBuf>> {
    let keys = KeyPair::generate(KEY_BITS)?;
    let documents = IssuerDocuments::new(issuer_url, &keys);

    let private_key = dir.join(format!("{}-private-key.pem", bucket));
    let discovery = dir.join(format!("{}-discovery.json", bucket));
    let jwks = dir.join(format!("{}-jwks.json", bucket));
    std::fs::write(&private_key, &keys.private_key_pem)?;
    std::fs::write(&discovery, serde_json::to_string_pretty(&documents.discovery).map_err(anyhow::Error::from)?)?;
    std::fs::write(&jwks, serde_json::to_string_pretty(&documents.jwks).map_err(anyhow::Error::from)?)?;
    Ok(vec![private_key, discovery, jwks])
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Issuer URL of the already hosted OIDC issuer
    #[arg(long)]
    pub issuer_url: String,

    /// ARN of the secret holding the issuer's private key
    #[arg(long)]
    pub secret_arn: String,

    /// Installer role ARN
    #[arg(long)]
    pub role_arn: String,

    /// How to create the OIDC provider: auto or manual
    #[arg(short, long, default_value = "auto")]
    pub mode: String,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Validated `register oidc-config` request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterOidcConfig {
    pub mode: Mode,
    pub spec: OidcConfigSpec,
    pub yes: bool,
}

impl RegisterArgs {
    pub fn prepare(self) -> Result<RegisterOidcConfig> {
        let mode = parse_mode(Some(&self.mode))?;
        let issuer = url::Url::parse(&self.issuer_url)
            .map_err(|e| RosaError::validation(format!("invalid issuer URL '{}': {}", self.issuer_url, e)))?;
        if issuer.scheme() != "https" {
            return Err(RosaError::validation("issuer URL must use https"));
        }
        if !self.secret_arn.starts_with("arn:aws") || !self.secret_arn.contains(":secretsmanager:") {
            return Err(RosaError::validation(format!(
                "'{}' is not a valid secret ARN",
                self.secret_arn
            )));
        }
        validate_role_arn(&self.role_arn)?;
        Ok(RegisterOidcConfig {
            mode,
            spec: OidcConfigSpec::unmanaged(self.issuer_url, self.secret_arn, self.role_arn),
            yes: self.yes,
        })
    }
}

pub async fn register(ctx: &RuntimeContext, req: &RegisterOidcConfig) -> Result<()> {
    if req.mode == Mode::Auto {
        ctx.confirm("Register the OIDC config?", req.yes)?;
    }
    let config = register_with_ocm(ctx, &req.spec).await?;
    match req.mode {
        Mode::Auto => {
            create_oidc_provider(ctx, &config.issuer_url).await?;
        }
        Mode::Manual => {
            ctx.reporter
                .info("Create the OIDC provider, unless it already exists, with:");
            ctx.reporter.print(oidc_provider_command(&config.issuer_url));
        }
    }
    Ok(())
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Output format, tables are printed when unset
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

pub async fn list(ctx: &RuntimeContext, output: Option<OutputFormat>) -> Result<()> {
    let configs = ctx
        .ocm
        .list_oidc_configs()
        .await
        .map_err(|e| RosaError::api("Failed to list OIDC configs", e))?;

    if let Some(format) = output {
        ctx.reporter.print(output::structured(&configs, format)?);
    } else if configs.is_empty() {
        ctx.reporter.info("There are no OIDC configs");
    } else {
        ctx.reporter.print(output::oidc_config_table(&configs));
    }
    Ok(())
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// ID of the OIDC config to delete
    #[arg(long)]
    pub oidc_config_id: Option<String>,

    /// How to perform the operation: auto or manual
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Validated `delete oidc-config` request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteOidcConfig {
    pub id: String,
    pub mode: Mode,
    pub yes: bool,
}

impl DeleteArgs {
    pub fn prepare(self) -> Result<DeleteOidcConfig> {
        let id = self
            .oidc_config_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| RosaError::validation("oidc-config-id is required"))?;
        if !is_identifier(&id) {
            return Err(RosaError::validation(format!(
                "OIDC config ID '{}' isn't valid: it must contain only letters, digits, dashes and underscores",
                id
            )));
        }
        let mode = parse_mode(self.mode.as_deref())?;
        Ok(DeleteOidcConfig {
            id,
            mode,
            yes: self.yes,
        })
    }
}

pub async fn delete(ctx: &RuntimeContext, req: &DeleteOidcConfig) -> Result<()> {
    let id = &req.id;
    let config = ctx
        .ocm
        .get_oidc_config(id)
        .await
        .map_err(|e| RosaError::api(format!("Failed to get OIDC config with ID '{}'", id), e))?
        .ok_or_else(|| RosaError::OidcConfigNotFound(id.clone()))?;

    let clusters = ctx
        .ocm
        .clusters_using_oidc_config(id)
        .await
        .map_err(|e| RosaError::api("Failed to list clusters using the OIDC config", e))?;
    if !clusters.is_empty() {
        return Err(RosaError::OidcConfigInUse {
            id: id.clone(),
            count: clusters.len(),
        });
    }

    match req.mode {
        Mode::Auto => delete_auto(ctx, &config, req.yes).await,
        Mode::Manual => delete_manual(ctx, &config).await,
    }
}

async fn delete_auto(ctx: &RuntimeContext, config: &OidcConfig, yes: bool) -> Result<()> {
    ctx.confirm(&format!("Delete the OIDC config '{}'?", config.id), yes)?;

    let provider = ctx
        .cloud
        .find_oidc_provider(&config.issuer_url)
        .await
        .map_err(|e| RosaError::api("Failed to look up the OIDC provider", e))?;
    match &provider {
        Some(arn) => {
            ctx.cloud
                .delete_oidc_provider(arn)
                .await
                .map_err(|e| RosaError::api(format!("Failed to delete OIDC provider '{}'", arn), e))?;
        }
        None => ctx.reporter.warn(format!(
            "No OIDC provider found for issuer URL '{}'",
            config.issuer_url
        )),
    }

    if !config.managed {
        match bucket_from_issuer_url(&config.issuer_url) {
            Some(bucket) => {
                ctx.cloud
                    .delete_issuer(&bucket)
                    .await
                    .map_err(|e| RosaError::api(format!("Failed to delete issuer bucket '{}'", bucket), e))?;
            }
            None => ctx.reporter.warn(format!(
                "Issuer URL '{}' is not served from an S3 bucket, leaving the issuer documents in place",
                config.issuer_url
            )),
        }
        if let Some(secret_arn) = &config.secret_arn {
            ctx.cloud
                .delete_secret(secret_arn)
                .await
                .map_err(|e| RosaError::api(format!("Failed to delete secret '{}'", secret_arn), e))?;
        }
    }

    delete_from_ocm(ctx, &config.id).await?;
    if let Some(arn) = provider {
        ctx.reporter
            .info(format!("Successfully deleted the OIDC provider {}", arn));
    }
    Ok(())
}

async fn delete_manual(ctx: &RuntimeContext, config: &OidcConfig) -> Result<()> {
    let mut commands = vec![format!(
        "aws iam delete-open-id-connect-provider --open-id-connect-provider-arn <arn of oidc-provider/{}>",
        config.issuer_host_path()
    )];
    if !config.managed {
        if let Some(bucket) = bucket_from_issuer_url(&config.issuer_url) {
            commands.push(format!("aws s3 rb s3://{} --force", bucket));
        }
        if let Some(secret_arn) = &config.secret_arn {
            commands.push(format!(
                "aws secretsmanager delete-secret --secret-id {} --force-delete-without-recovery",
                secret_arn
            ));
        }
    }

    delete_from_ocm(ctx, &config.id).await?;
    ctx.reporter
        .info("Run the following commands to delete the AWS resources of the OIDC config:");
    ctx.reporter.print(commands.join("\n"));
    Ok(())
}

async fn delete_from_ocm(ctx: &RuntimeContext, id: &str) -> Result<()> {
    ctx.ocm
        .delete_oidc_config(id)
        .await
        .map_err(|e| RosaError::api(format!("Failed to delete OIDC config '{}'", id), e))?;
    ctx.reporter
        .info(format!("Successfully deleted the OIDC config '{}'", id));
    Ok(())
}
