use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use smartnode_core::aggregator::load_minipools;
use smartnode_core::api::ApiClient;
use smartnode_core::config::Config;
use smartnode_core::{Address, LedgerGateway, MinipoolStatus};
use std::path::Path;
use std::sync::Arc;

#[derive(Subcommand)]
pub enum MinipoolSubcommand {
    /// List the node's minipools and their lifecycle status
    Status {
        /// Only show minipools in this status (e.g. prelaunch)
        #[arg(long)]
        status: Option<MinipoolStatus>,
    },
}

pub fn run(dir: &Path, subcmd: MinipoolSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(dir).context("failed to load config")?;
    match subcmd {
        MinipoolSubcommand::Status { status } => status_cmd(&config, status, json),
    }
}

fn status_cmd(config: &Config, filter: Option<MinipoolStatus>, json: bool) -> anyhow::Result<()> {
    let client = Arc::new(ApiClient::from_config(&config.api)?);

    let rt = tokio::runtime::Runtime::new()?;
    let minipools = rt.block_on(async {
        let owner = resolve_owner(config, &client).await?;
        let gateway: Arc<dyn LedgerGateway> = client.clone();
        load_minipools(gateway, owner)
            .await
            .context("could not load minipools")
    })?;

    let minipools: Vec<_> = minipools
        .into_iter()
        .filter(|mp| filter.map_or(true, |s| mp.status == s))
        .collect();

    if json {
        return print_json(&minipools);
    }
    if minipools.is_empty() {
        println!("No minipools.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = minipools
        .iter()
        .map(|mp| vec![mp.address.to_string(), mp.status.to_string()])
        .collect();
    print_table(&["ADDRESS", "STATUS"], &rows);
    Ok(())
}

/// The configured node account, or the one the API reports.
async fn resolve_owner(config: &Config, client: &ApiClient) -> anyhow::Result<Address> {
    match config.node.account {
        Some(account) => Ok(account),
        None => client
            .node_account()
            .await
            .context("could not resolve node account"),
    }
}
