//! Run configuration.
//!
//! Layers, lowest precedence first: built-in defaults, `Quorum.toml`, then
//! `QUORUM_*` environment variables (`__` separates nested keys, e.g.
//! `QUORUM_CHAIN__RPC_URL`). Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    AddressRegistry, AuctionParams, ContractSymbol, DeployError, EtherscanConfig, Network,
    RpcChainConfig, StageSelection,
};

/// The default name for the quorum configuration file.
pub const QUORUM_CONFIG_FILENAME: &str = "Quorum.toml";

/// Prefix of the environment variables read into the configuration.
pub const QUORUM_ENV_PREFIX: &str = "QUORUM_";

/// Per-run replacements for registry entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressOverlay {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weth: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<Address>,
}

/// Source verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub etherscan: EtherscanConfig,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            etherscan: EtherscanConfig::default(),
        }
    }
}

/// Everything a deployment run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumConfig {
    /// Network name, validated when the registry is built.
    pub network: String,
    /// Hardhat `artifacts/` directory.
    pub artifacts: PathBuf,
    /// Build Auction and Questions against this Votes instead of the one deployed by the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes_override: Option<Address>,
    /// Retries of a failed transaction submission.
    pub submission_retries: usize,

    pub chain: RpcChainConfig,
    pub auction: AuctionParams,
    pub addresses: AddressOverlay,
    pub stages: StageSelection,
    pub verification: VerificationConfig,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            network: Network::Goerli.to_string(),
            artifacts: PathBuf::from("artifacts"),
            votes_override: None,
            submission_retries: 0,
            chain: RpcChainConfig::default(),
            auction: AuctionParams::default(),
            addresses: AddressOverlay::default(),
            stages: StageSelection::default(),
            verification: VerificationConfig::default(),
        }
    }
}

impl QuorumConfig {
    /// Layered provider for `file`. A missing file contributes nothing.
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(QUORUM_ENV_PREFIX).split("__"))
    }

    /// Load the configuration.
    ///
    /// An explicit `path` must exist; it may be the file itself or a directory
    /// holding `Quorum.toml`. Without one, `Quorum.toml` in the working directory
    /// is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) if !path.exists() => {
                return Err(anyhow::anyhow!(
                    "Configuration file or directory not found: {}",
                    path.display()
                ));
            }
            Some(path) if path.is_dir() => path.join(QUORUM_CONFIG_FILENAME),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(QUORUM_CONFIG_FILENAME),
        };

        let config: Self = Self::figment(&file)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", file.display()))?;
        tracing::debug!(path = %file.display(), network = %config.network, "Configuration loaded");
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize quorum config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    pub fn network(&self) -> Result<Network, DeployError> {
        Network::parse(&self.network)
    }

    /// Registry for the configured network, with the address overlay applied.
    pub fn registry(&self) -> Result<AddressRegistry, DeployError> {
        let mut registry = AddressRegistry::new(self.network()?);
        if let Some(weth) = self.addresses.weth {
            registry = registry.with_overlay(ContractSymbol::Weth, weth);
        }
        if let Some(votes) = self.addresses.votes {
            registry = registry.with_overlay(ContractSymbol::Votes, votes);
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::address;
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = QuorumConfig::default();
        assert_eq!(config.network().unwrap(), Network::Goerli);
        assert_eq!(config.submission_retries, 0);
        assert!(config.verification.enabled);
        assert_eq!(config.stages, StageSelection::default());
        assert_eq!(config.chain.confirmations, 1);
        assert_eq!(config.chain.confirmation_timeout_secs, None);
    }

    #[test]
    fn test_load_file_over_defaults() {
        let dir = TempDir::new("quorum-config").unwrap();
        let path = dir.path().join(QUORUM_CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
network = "sepolia"
votes_override = "0x00000000000000000000000000000000000000a2"

[auction]
duration = 600

[stages]
votes = false

[addresses]
weth = "0x00000000000000000000000000000000000000e1"
"#,
        )
        .unwrap();

        // A directory resolves to the file inside it.
        let config = QuorumConfig::load(Some(dir.path())).unwrap();
        assert_eq!(config.network().unwrap(), Network::Sepolia);
        assert_eq!(
            config.votes_override,
            Some(address!("00000000000000000000000000000000000000a2"))
        );
        assert_eq!(config.auction.duration, 600);
        assert_eq!(config.auction.reserve_price, AuctionParams::default().reserve_price);
        assert!(!config.stages.votes);
        assert!(config.stages.auction);

        let registry = config.registry().unwrap();
        assert_eq!(
            registry.resolve(ContractSymbol::Weth),
            Some(address!("00000000000000000000000000000000000000e1"))
        );
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = TempDir::new("quorum-config").unwrap();
        let err = QuorumConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_unsupported_network() {
        let config = QuorumConfig {
            network: "mainnet".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.registry().unwrap_err(),
            DeployError::UnsupportedNetwork("mainnet".to_string())
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new("quorum-config").unwrap();
        let path = dir.path().join(QUORUM_CONFIG_FILENAME);
        let config = QuorumConfig {
            network: "optimism".to_string(),
            submission_retries: 2,
            ..Default::default()
        };

        config.save_to_file(&path).unwrap();
        assert_eq!(QuorumConfig::load(Some(&path)).unwrap(), config);
    }
}
