//! Chain client abstraction.
//!
//! Submission and confirmation are separate steps: a submitted transaction has a
//! hash and must never be resubmitted, while a failed submission may be retried.

use std::future::Future;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, TxHash},
};

use crate::{ContractFactory, DeployError};

/// Receipt of a transaction included in a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Whether execution succeeded.
    pub success: bool,
    /// Set for contract-creation transactions.
    pub contract_address: Option<Address>,
}

/// Transport and signing layer used to talk to the network.
///
/// Signing and nonce management belong to the implementation. How many
/// confirmations to await and whether to time out is the implementation's
/// policy as well.
pub trait ChainClient: Send + Sync {
    /// Submit a contract-creation transaction.
    fn submit_deployment(
        &self,
        factory: &ContractFactory,
        args: &[DynSolValue],
    ) -> impl Future<Output = Result<TxHash, DeployError>> + Send;

    /// Submit a call to `function` on the contract at `to`.
    fn submit_call(
        &self,
        to: Address,
        factory: &ContractFactory,
        function: &str,
        args: &[DynSolValue],
    ) -> impl Future<Output = Result<TxHash, DeployError>> + Send;

    /// Wait until `tx_hash` is included and return its receipt.
    ///
    /// `contract` is used for error reporting only.
    fn wait_for_receipt(
        &self,
        contract: &str,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<TxReceipt, DeployError>> + Send;
}
