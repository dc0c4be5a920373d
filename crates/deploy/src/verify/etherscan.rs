//! Etherscan source verification (API v2, one endpoint for every chain).

use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{VerificationRequest, Verifier};
use crate::{ContractFactory, HardhatArtifacts, VerificationError};

/// Default Etherscan v2 endpoint.
pub const DEFAULT_ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Explorer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtherscanConfig {
    pub api_url: Url,
    /// Without a key verification is skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Delay between two `checkverifystatus` requests.
    pub poll_interval_secs: u64,
    /// Number of status checks before giving up.
    pub max_status_checks: usize,
}

impl Default for EtherscanConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_ETHERSCAN_API_URL).expect("default Etherscan URL is valid"),
            api_key: None,
            poll_interval_secs: 5,
            max_status_checks: 12,
        }
    }
}

/// Envelope shared by every Etherscan API answer.
#[derive(Debug, Clone, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

impl EtherscanResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }
}

/// Outcome of a single status check.
#[derive(Debug)]
enum PollError {
    Pending,
    Failed(VerificationError),
}

/// Map a `verifysourcecode` answer to the submission GUID.
fn classify_submission(response: EtherscanResponse) -> Result<String, VerificationError> {
    if response.is_ok() {
        return Ok(response.result);
    }
    if response.result.to_lowercase().contains("already verified") {
        return Err(VerificationError::AlreadyVerified);
    }
    Err(VerificationError::Rejected(format!(
        "{}: {}",
        response.message, response.result
    )))
}

/// Map a `checkverifystatus` answer.
fn classify_status(response: EtherscanResponse) -> Result<(), PollError> {
    if response.is_ok() {
        return Ok(());
    }
    let result = response.result.to_lowercase();
    if result.contains("pending") {
        Err(PollError::Pending)
    } else if result.contains("already verified") {
        Err(PollError::Failed(VerificationError::AlreadyVerified))
    } else {
        Err(PollError::Failed(VerificationError::Rejected(response.result)))
    }
}

/// Verifies Hardhat-compiled contracts through the Etherscan API.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    config: EtherscanConfig,
    api_key: String,
    chain_id: u64,
    artifacts: HardhatArtifacts,
}

impl EtherscanVerifier {
    pub fn new(
        config: EtherscanConfig,
        api_key: impl Into<String>,
        chain_id: u64,
        artifacts: HardhatArtifacts,
    ) -> Result<Self, VerificationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VerificationError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
            chain_id,
            artifacts,
        })
    }

    /// Build a verifier from `config`, or `None` when no API key is configured.
    pub fn from_config(
        config: &EtherscanConfig,
        chain_id: u64,
        artifacts: HardhatArtifacts,
    ) -> Result<Option<Self>, VerificationError> {
        match config.api_key.clone() {
            Some(key) if !key.is_empty() => {
                Self::new(config.clone(), key, chain_id, artifacts).map(Some)
            }
            _ => Ok(None),
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<EtherscanResponse, VerificationError> {
        let response = request
            .query(&[("chainid", self.chain_id.to_string())])
            .send()
            .await
            .map_err(|e| VerificationError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VerificationError::Transport(format!(
                "Etherscan API request failed: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| VerificationError::Transport(format!("invalid Etherscan response: {e}")))
    }

    async fn submit(&self, request: &VerificationRequest) -> Result<String, VerificationError> {
        let build_info = self
            .artifacts
            .build_info(&request.contract_name)
            .map_err(|e| VerificationError::MissingBuildInfo {
                contract: request.contract_name.clone(),
                reason: format!("{e:#}"),
            })?;

        let source_code = serde_json::to_string(&build_info.input)
            .map_err(|e| VerificationError::MissingBuildInfo {
                contract: request.contract_name.clone(),
                reason: e.to_string(),
            })?;
        let constructor_args =
            hex::encode(ContractFactory::encode_constructor_args(&request.constructor_args));
        let compiler_version = format!("v{}", build_info.solc_long_version);
        let address = request.address.to_string();

        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source_code.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", request.qualified_name.as_str()),
            ("compilerversion", compiler_version.as_str()),
            ("constructorArguements", constructor_args.as_str()),
        ];

        let response = self
            .send(self.client.post(self.config.api_url.clone()).form(&form))
            .await?;
        classify_submission(response)
    }

    async fn check_status(&self, guid: &str) -> Result<(), PollError> {
        let query = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "checkverifystatus"),
            ("guid", guid),
        ];
        let response = self
            .send(self.client.get(self.config.api_url.clone()).query(&query))
            .await
            .map_err(PollError::Failed)?;
        classify_status(response)
    }
}

impl Verifier for EtherscanVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<(), VerificationError> {
        let contract = request.contract_name.as_str();
        tracing::info!(
            contract,
            address = %request.address,
            "Submitting source for verification..."
        );

        let guid = self.submit(request).await?;
        tracing::debug!(contract, %guid, "Verification submitted");

        let checks = self.config.max_status_checks.max(1);
        let policy = ConstantBuilder::default()
            .with_delay(Duration::from_secs(self.config.poll_interval_secs))
            .with_max_times(checks - 1);

        let result = (|| self.check_status(&guid))
            .retry(policy)
            .when(|e| matches!(e, PollError::Pending))
            .notify(|_, delay| {
                tracing::debug!(contract, ?delay, "Verification pending");
            })
            .await;

        match result {
            Ok(()) => {
                tracing::info!(contract, address = %request.address, "Contract verified");
                Ok(())
            }
            Err(PollError::Pending) => Err(VerificationError::Timeout { attempts: checks }),
            Err(PollError::Failed(e)) => Err(e),
        }
    }
}
