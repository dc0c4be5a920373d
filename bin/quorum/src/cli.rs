use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Parser, Subcommand};
use quorum_deploy::{ContractRole, Network};
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "quorum")]
#[command(
    author,
    version,
    about = "Deploy the Votes, Auction and Questions contracts in order"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(
        short,
        long,
        global = true,
        env = "QUORUM_VERBOSITY",
        default_value_t = LevelFilter::INFO
    )]
    pub verbosity: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy the contracts and print the deployment report.
    Deploy(DeployArgs),

    /// Print the known contract addresses for a network.
    Addresses {
        /// The network to list addresses for.
        #[arg(short, long, default_value_t = Network::Goerli)]
        network: Network,
    },
}

#[derive(Debug, Clone, Parser)]
pub struct DeployArgs {
    /// Path to a Quorum.toml configuration file, or a directory containing one.
    ///
    /// Without it, ./Quorum.toml is used when present.
    #[arg(long, alias = "conf")]
    pub config: Option<PathBuf>,

    /// The target network (goerli, sepolia, optimism).
    #[arg(short, long)]
    pub network: Option<String>,

    /// The JSON-RPC endpoint used to send transactions.
    #[arg(long, alias = "rpc")]
    pub rpc_url: Option<Url>,

    /// Path to the Hardhat artifacts directory.
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// Build Auction and Questions against an existing Votes contract.
    #[arg(long)]
    pub votes: Option<Address>,

    /// Deploy only these contracts (comma separated).
    ///
    /// When Votes is left out, the override or the registry address is used downstream.
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<ContractRole>,

    /// Skip source verification.
    #[arg(long)]
    pub no_verify: bool,

    /// Write the resolved configuration to this file before deploying.
    #[arg(long)]
    pub save_config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_deploy() {
        let cli = Cli::try_parse_from([
            "quorum",
            "-v",
            "debug",
            "deploy",
            "--network",
            "sepolia",
            "--only",
            "auction,questions",
            "--votes",
            "0x083b23dC187502D4f4DAc683F023D7d25E087728",
            "--no-verify",
        ])
        .unwrap();

        assert_eq!(cli.verbosity, LevelFilter::DEBUG);
        let Command::Deploy(args) = cli.command else {
            panic!("expected the deploy command");
        };
        assert_eq!(args.network.as_deref(), Some("sepolia"));
        assert_eq!(args.only, vec![ContractRole::Auction, ContractRole::Questions]);
        assert!(args.votes.is_some());
        assert!(args.no_verify);
    }

    #[test]
    fn test_parse_addresses() {
        let cli = Cli::try_parse_from(["quorum", "addresses", "--network", "optimism"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Addresses {
                network: Network::Optimism
            }
        ));
    }

    #[test]
    fn test_unknown_network_is_rejected() {
        assert!(Cli::try_parse_from(["quorum", "addresses", "--network", "mainnet"]).is_err());
    }
}
