use clap::ValueEnum;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::models::{IdentityProvider, OidcConfig};

/// Machine readable formats accepted by `--output`
#[derive(Clone, Copy, PartialEq, Eq, Debug, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Serializes `value` as-is in the requested format
pub fn structured<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    let out = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    Ok(out.trim_end().to_string())
}

/// Column set for the identity provider table
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IdpColumns {
    NameType,
    NameTypeAuthUrl,
}

impl IdpColumns {
    /// A lone provider without an OAuth callback has nothing to show in the
    /// auth URL column, so it is dropped.
    pub fn for_providers(idps: &[IdentityProvider]) -> Self {
        match idps {
            [only] if !only.idp_type.has_oauth_callback() => IdpColumns::NameType,
            _ => IdpColumns::NameTypeAuthUrl,
        }
    }

    fn header(self) -> Vec<&'static str> {
        match self {
            IdpColumns::NameType => vec!["NAME", "TYPE"],
            IdpColumns::NameTypeAuthUrl => vec!["NAME", "TYPE", "AUTH URL"],
        }
    }
}

pub fn idp_table(console_url: &str, idps: &[IdentityProvider]) -> String {
    let columns = IdpColumns::for_providers(idps);
    let mut builder = Builder::default();
    builder.push_record(columns.header());
    for idp in idps {
        let mut record = vec![idp.name.clone(), idp.idp_type.to_string()];
        if columns == IdpColumns::NameTypeAuthUrl {
            record.push(idp.auth_url(console_url));
        }
        builder.push_record(record);
    }
    let mut table = builder.build();
    table.with(Style::blank());
    table.to_string()
}

#[derive(Tabled, Clone, Debug)]
pub struct OidcConfigRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "MANAGED")]
    pub managed: bool,
    #[tabled(rename = "ISSUER URL")]
    pub issuer_url: String,
    #[tabled(rename = "SECRET ARN")]
    pub secret_arn: String,
}

impl From<&OidcConfig> for OidcConfigRow {
    fn from(c: &OidcConfig) -> Self {
        Self {
            id: c.id.clone(),
            managed: c.managed,
            issuer_url: c.issuer_url.clone(),
            secret_arn: c.secret_arn.clone().unwrap_or_default(),
        }
    }
}

pub fn oidc_config_table(configs: &[OidcConfig]) -> String {
    let rows: Vec<OidcConfigRow> = configs.iter().map(Into::into).collect();
    let mut table = Table::new(&rows);
    table.with(Style::blank());
    table.to_string()
}
