//! quorum deploys the Votes, Auction and Questions contracts in dependency order.

mod cli;

use anyhow::Result;
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cli::{Cli, Command, DeployArgs};
use quorum_deploy::{AddressRegistry, Network, OrchestratorBuilder, QuorumConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::Deploy(args) => deploy(args).await,
        Command::Addresses { network } => {
            println!("{}", addresses_table(network));
            Ok(())
        }
    }
}

async fn deploy(args: DeployArgs) -> Result<()> {
    let config = QuorumConfig::load(args.config.as_deref())?;

    let mut builder = OrchestratorBuilder::new(config)
        .only(&args.only)
        .verification_enabled(!args.no_verify);

    if let Some(network) = args.network {
        builder = builder.network(network);
    }
    if let Some(rpc_url) = args.rpc_url {
        builder = builder.rpc_url(rpc_url);
    }
    if let Some(artifacts) = args.artifacts {
        builder = builder.artifacts(artifacts);
    }
    if let Some(votes) = args.votes {
        builder = builder.votes_override(votes);
    }

    if let Some(path) = &args.save_config {
        builder.config().save_to_file(path)?;
    }

    let orchestrator = builder.build()?;

    match orchestrator.run().await {
        Ok(report) => {
            println!("{report}");
            Ok(())
        }
        Err(error) => {
            // Whatever is live on-chain is reported before the failure.
            println!("{}", error.report);
            if error.is_partial() {
                tracing::error!("Deployment partially succeeded, the contracts above are live");
            }
            Err(error.into())
        }
    }
}

fn addresses_table(network: Network) -> Table {
    let registry = AddressRegistry::new(network);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec![format!("{network} ({})", network.chain_id()), "Address".to_string()]);
    for (symbol, address) in registry.entries() {
        table.add_row(vec![
            symbol.to_string(),
            address.map_or_else(|| "not deployed".to_string(), |a| a.to_string()),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_table_marks_absent_entries() {
        let rendered = addresses_table(Network::Optimism).to_string();
        assert!(rendered.contains("0x4200000000000000000000000000000000000006"));
        assert!(rendered.contains("not deployed"));
        assert!(rendered.contains("WETH"));
        assert!(rendered.contains("Votes"));
    }
}
