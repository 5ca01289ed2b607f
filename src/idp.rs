use clap::Args;
use tracing::debug;

use crate::error::{Result, RosaError};
use crate::models::ClusterState;
use crate::output::{self, OutputFormat};
use crate::runtime::{validate_cluster_key, RuntimeContext};

#[derive(Debug, Args)]
pub struct ListIdpsArgs {
    /// Name or ID of the cluster
    #[arg(short, long)]
    pub cluster: String,

    /// Output format, tables are printed when unset
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

/// Validated `list idps` request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListIdps {
    pub cluster_key: String,
    pub output: Option<OutputFormat>,
}

impl ListIdpsArgs {
    pub fn prepare(self) -> Result<ListIdps> {
        validate_cluster_key(&self.cluster)?;
        Ok(ListIdps {
            cluster_key: self.cluster,
            output: self.output,
        })
    }
}

pub async fn list_idps(ctx: &RuntimeContext, req: &ListIdps) -> Result<()> {
    let key = &req.cluster_key;
    let cluster = ctx.fetch_cluster(key).await?;
    if cluster.state != ClusterState::Ready {
        return Err(RosaError::ClusterNotReady(key.clone()));
    }

    debug!("Loading identity providers for cluster '{}'", key);
    let idps = ctx.ocm.get_identity_providers(&cluster.id).await.map_err(|e| {
        RosaError::api(
            format!("Failed to get identity providers for cluster '{}'", key),
            e,
        )
    })?;

    if let Some(format) = req.output {
        ctx.reporter.print(output::structured(&idps, format)?);
        return Ok(());
    }

    if idps.is_empty() {
        ctx.reporter.info(format!(
            "There are no identity providers configured for cluster '{}'",
            key
        ));
        return Ok(());
    }

    ctx.reporter.print(output::idp_table(cluster.console_url(), &idps));
    Ok(())
}
