//! JSON-RPC chain client.
//!
//! Transactions are sent with `eth_sendTransaction`, so signing is delegated to
//! the endpoint (an unlocked development node or a wallet-backed dashboard RPC).

use std::time::Duration;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, Bytes, TxHash},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::OnceCell;
use url::Url;

use crate::{ChainClient, ContractFactory, DeployError, TxReceipt};

/// Timeout for every RPC request except `eth_sendTransaction`.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between receipt polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Errors from a single JSON-RPC exchange.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("transport error calling {method}: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("failed to decode {method} result: {reason}")]
    Decode { method: String, reason: String },
}

impl RpcError {
    /// Whether the node reported an execution revert.
    pub fn is_revert(&self) -> bool {
        matches!(self, RpcError::Rpc { message, .. } if message.to_lowercase().contains("revert"))
    }

    /// Classify a failed `eth_sendTransaction`.
    ///
    /// Once the request may have reached the endpoint the transaction may be
    /// broadcast, so only connection failures stay retryable.
    fn into_submission_error(self, contract: &str) -> DeployError {
        let may_be_sent =
            matches!(&self, RpcError::Transport { source, .. } if !source.is_connect());
        if may_be_sent {
            return DeployError::OutcomeUnknown {
                contract: contract.to_string(),
                reason: self.to_string(),
            };
        }
        self.into_deploy_error(contract)
    }

    fn into_deploy_error(self, contract: &str) -> DeployError {
        if self.is_revert() {
            DeployError::DeploymentReverted {
                contract: contract.to_string(),
                reason: self.to_string(),
            }
        } else {
            DeployError::SubmissionFailed {
                contract: contract.to_string(),
                reason: self.to_string(),
            }
        }
    }
}

/// Configuration of the JSON-RPC client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcChainConfig {
    /// The RPC endpoint.
    pub rpc_url: Url,
    /// Sending account. Defaults to the first account reported by `eth_accounts`.
    pub from: Option<Address>,
    /// Interval between receipt polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Number of blocks (including the inclusion block) to wait for.
    pub confirmations: u64,
    /// Give up waiting for a receipt after this many seconds. Waits forever when unset.
    pub confirmation_timeout_secs: Option<u64>,
    /// Give up waiting for `eth_sendTransaction` to return after this many seconds.
    ///
    /// Waits forever when unset, since a wallet-backed endpoint only answers once
    /// the transaction has been signed.
    pub submission_timeout_secs: Option<u64>,
}

impl Default for RpcChainConfig {
    fn default() -> Self {
        Self {
            // Truffle dashboard, the endpoint the contracts were originally deployed through.
            rpc_url: Url::parse("http://localhost:24012/rpc").expect("static URL is valid"),
            from: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            confirmations: 1,
            confirmation_timeout_secs: None,
            submission_timeout_secs: None,
        }
    }
}

/// Receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    block_number: u64,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    status: u64,
    contract_address: Option<Address>,
}

/// Deserialize a u64 from a hex string (with 0x prefix).
fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_hex_u64(&s).map_err(serde::de::Error::custom)
}

fn parse_hex_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
}

/// [`ChainClient`] backed by a JSON-RPC endpoint.
#[derive(Debug)]
pub struct RpcChainClient {
    client: reqwest::Client,
    config: RpcChainConfig,
    sender: OnceCell<Address>,
}

impl RpcChainClient {
    pub fn new(config: RpcChainConfig) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|source| RpcError::Transport {
                method: "client".to_string(),
                source,
            })?;

        Ok(Self {
            client,
            config,
            sender: OnceCell::new(),
        })
    }

    /// Make a JSON-RPC call and deserialize the result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        self.request(method, params, Some(DEFAULT_REQUEST_TIMEOUT)).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<T, RpcError> {
        let mut request = self
            .client
            .post(self.config.rpc_url.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }));
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                method: method.to_string(),
                source,
            })?;

        let result: Value = response.json().await.map_err(|source| RpcError::Transport {
            method: method.to_string(),
            source,
        })?;

        if let Some(error) = result.get("error") {
            return Err(RpcError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }

        let result_value = result.get("result").cloned().ok_or_else(|| RpcError::Decode {
            method: method.to_string(),
            reason: "no result in response".to_string(),
        })?;

        serde_json::from_value(result_value).map_err(|e| RpcError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })
    }

    /// The account transactions are sent from.
    pub async fn sender(&self) -> Result<Address, RpcError> {
        self.sender
            .get_or_try_init(|| async {
                if let Some(from) = self.config.from {
                    return Ok::<_, RpcError>(from);
                }
                let accounts: Vec<Address> = self.call("eth_accounts", vec![]).await?;
                let from = accounts.first().copied().ok_or_else(|| RpcError::Decode {
                    method: "eth_accounts".to_string(),
                    reason: "the endpoint exposes no accounts".to_string(),
                })?;
                tracing::info!(%from, "Using first account exposed by the RPC endpoint");
                Ok(from)
            })
            .await
            .copied()
    }

    async fn send_transaction(
        &self,
        contract: &str,
        to: Option<Address>,
        data: Bytes,
    ) -> Result<TxHash, DeployError> {
        let from = self.sender().await.map_err(|e| e.into_deploy_error(contract))?;

        let mut tx = serde_json::json!({
            "from": from,
            "data": data,
        });
        if let Some(to) = to {
            tx["to"] = serde_json::json!(to);
        }

        let timeout = self.config.submission_timeout_secs.map(Duration::from_secs);
        let tx_hash: TxHash = self
            .request("eth_sendTransaction", vec![tx], timeout)
            .await
            .map_err(|e| e.into_submission_error(contract))?;

        tracing::debug!(contract, %tx_hash, ?to, "Transaction submitted");
        Ok(tx_hash)
    }

    async fn poll_receipt(&self, contract: &str, tx_hash: TxHash) -> TxReceipt {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        let receipt = loop {
            let params = vec![serde_json::json!(tx_hash)];
            match self
                .call::<Option<RpcReceipt>>("eth_getTransactionReceipt", params)
                .await
            {
                Ok(Some(receipt)) => break receipt,
                Ok(None) => {
                    tracing::trace!(
                        contract,
                        %tx_hash,
                        "Transaction not yet included, retrying..."
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        contract,
                        %tx_hash,
                        error = %e,
                        "Receipt poll failed, retrying..."
                    );
                }
            }
            tokio::time::sleep(poll_interval).await;
        };

        if self.config.confirmations > 1 {
            let target = receipt.block_number + self.config.confirmations - 1;
            loop {
                let head = self
                    .call::<String>("eth_blockNumber", vec![])
                    .await
                    .map(|n| parse_hex_u64(&n));
                match head {
                    Ok(Ok(head)) if head >= target => break,
                    Ok(Ok(head)) => {
                        tracing::trace!(contract, head, target, "Waiting for confirmations...");
                    }
                    Ok(Err(e)) => tracing::warn!(contract, error = %e, "Malformed block number"),
                    Err(e) => {
                        tracing::warn!(
                            contract,
                            error = %e,
                            "Block number poll failed, retrying..."
                        );
                    }
                }
                tokio::time::sleep(poll_interval).await;
            }
        }

        TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            success: receipt.status == 1,
            contract_address: receipt.contract_address,
        }
    }
}

impl ChainClient for RpcChainClient {
    async fn submit_deployment(
        &self,
        factory: &ContractFactory,
        args: &[DynSolValue],
    ) -> Result<TxHash, DeployError> {
        let data = factory.deploy_data(args)?;
        self.send_transaction(&factory.contract_name, None, data).await
    }

    async fn submit_call(
        &self,
        to: Address,
        factory: &ContractFactory,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<TxHash, DeployError> {
        let data = factory.call_data(function, args)?;
        self.send_transaction(&factory.contract_name, Some(to), data).await
    }

    async fn wait_for_receipt(
        &self,
        contract: &str,
        tx_hash: TxHash,
    ) -> Result<TxReceipt, DeployError> {
        match self.config.confirmation_timeout_secs {
            Some(secs) => {
                let poll = self.poll_receipt(contract, tx_hash);
                tokio::time::timeout(Duration::from_secs(secs), poll)
                    .await
                    .map_err(|_| DeployError::OutcomeUnknown {
                        contract: contract.to_string(),
                        reason: format!("no receipt for {tx_hash} after {secs}s"),
                    })
            }
            None => Ok(self.poll_receipt(contract, tx_hash).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_deserialization() {
        let json = serde_json::json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": "0x10",
            "status": "0x1",
            "contractAddress": "0x00000000000000000000000000000000000000a2",
            "gasUsed": "0x5208"
        });
        let receipt: RpcReceipt = serde_json::from_value(json).unwrap();
        assert_eq!(receipt.block_number, 16);
        assert_eq!(receipt.status, 1);
        assert_eq!(
            receipt.contract_address,
            Some(Address::with_last_byte(0xa2))
        );
    }

    #[test]
    fn test_receipt_without_contract_address() {
        let json = serde_json::json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": "0x1",
            "status": "0x0",
            "contractAddress": null
        });
        let receipt: RpcReceipt = serde_json::from_value(json).unwrap();
        assert_eq!(receipt.status, 0);
        assert!(receipt.contract_address.is_none());
    }

    #[test]
    fn test_revert_classification() {
        let revert = RpcError::Rpc {
            code: 3,
            message: "execution reverted: AccessControl".to_string(),
        };
        assert!(matches!(
            revert.into_deploy_error("Votes"),
            DeployError::DeploymentReverted { .. }
        ));

        let other = RpcError::Rpc {
            code: -32000,
            message: "nonce too low".to_string(),
        };
        assert!(matches!(
            other.into_deploy_error("Votes"),
            DeployError::SubmissionFailed { .. }
        ));
    }

    #[test]
    fn test_default_config() {
        let config = RpcChainConfig::default();
        assert_eq!(config.confirmations, 1);
        assert!(config.confirmation_timeout_secs.is_none());
        assert!(config.submission_timeout_secs.is_none());
        assert_eq!(config.rpc_url.as_str(), "http://localhost:24012/rpc");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_submission_failure() {
        let client = RpcChainClient::new(RpcChainConfig {
            rpc_url: Url::parse("http://127.0.0.1:1").unwrap(),
            from: Some(Address::with_last_byte(1)),
            ..Default::default()
        })
        .unwrap();
        let factory = ContractFactory::new(
            "Votes",
            "contracts/Votes.sol",
            Default::default(),
            Bytes::from_static(&[0x60]),
        );

        let err = client.submit_deployment(&factory, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::SubmissionFailed { ref contract, .. } if contract == "Votes"
        ));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unanswered_send_is_outcome_unknown() {
        // Accepts the request and never answers, like a dashboard waiting on a signature.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let client = RpcChainClient::new(RpcChainConfig {
            rpc_url: Url::parse(&format!("http://{endpoint}/rpc")).unwrap(),
            from: Some(Address::with_last_byte(1)),
            submission_timeout_secs: Some(1),
            ..Default::default()
        })
        .unwrap();
        let factory = ContractFactory::new(
            "Votes",
            "contracts/Votes.sol",
            Default::default(),
            Bytes::from_static(&[0x60]),
        );

        let err = client.submit_deployment(&factory, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::OutcomeUnknown { ref contract, .. } if contract == "Votes"
        ));
        assert!(!err.is_transient());
        server.abort();
    }
}
