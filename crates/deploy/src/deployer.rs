//! Single-contract deployer: compile, instantiate, submit, await confirmation.

use std::future::Future;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, TxHash},
};
use backon::{ExponentialBuilder, Retryable};

use crate::{
    ArgValue, ArtifactSource, ChainClient, ContractFactory, ContractRole, DeployError,
    DeploymentSpec, ResolvedAddresses, TxReceipt, VerificationStatus,
};

/// Outcome of a confirmed deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentResult {
    pub role: ContractRole,
    pub contract_name: String,
    /// `source:Name` of the compiled contract.
    pub qualified_name: String,
    pub address: Address,
    pub tx_hash: TxHash,
    /// Constructor arguments exactly as submitted, kept for verification.
    pub constructor_args: Vec<DynSolValue>,
    pub verification: VerificationStatus,
}

/// Deploys one contract at a time and sends confirmed calls.
///
/// Deployment is not idempotent: every successful call creates a new contract
/// instance at a new address.
#[derive(Debug)]
pub struct ContractDeployer<C, A> {
    client: C,
    artifacts: A,
    submission_retries: usize,
}

impl<C, A> ContractDeployer<C, A>
where
    C: ChainClient,
    A: ArtifactSource,
{
    pub fn new(client: C, artifacts: A) -> Self {
        Self {
            client,
            artifacts,
            submission_retries: 0,
        }
    }

    /// Retry failed submissions up to `retries` times with exponential backoff.
    ///
    /// Only [`DeployError::SubmissionFailed`] is retried. A submission whose
    /// outcome is unknown and a pending confirmation are never resubmitted.
    pub fn submission_retries(mut self, retries: usize) -> Self {
        self.submission_retries = retries;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn factory(&self, contract_name: &str) -> Result<ContractFactory, DeployError> {
        self.artifacts.factory(contract_name)
    }

    /// Deploy `spec`, resolving forward references against `resolved`.
    pub async fn deploy(
        &self,
        spec: &DeploymentSpec,
        resolved: &ResolvedAddresses,
    ) -> Result<DeploymentResult, DeployError> {
        let contract = spec.contract_name.as_str();
        let factory = self.artifacts.factory(contract)?;
        let args = spec.bind(resolved)?;
        let values = factory.bind_constructor(&args)?;

        tracing::info!(
            contract,
            depends_on = ?spec.depends_on(),
            args = ?values,
            "Deploying contract..."
        );

        let tx_hash = self
            .submit(contract, || self.client.submit_deployment(&factory, &values))
            .await?;
        let receipt = self.confirm(contract, tx_hash).await?;

        let address = receipt
            .contract_address
            .ok_or_else(|| DeployError::SubmissionFailed {
                contract: contract.to_string(),
                reason: format!("receipt for {tx_hash} carries no contract address"),
            })?;

        tracing::info!(
            contract,
            %address,
            %tx_hash,
            block = receipt.block_number,
            "{contract} deployed to {address}"
        );

        Ok(DeploymentResult {
            role: spec.role,
            contract_name: spec.contract_name.clone(),
            qualified_name: factory.qualified_name(),
            address,
            tx_hash,
            constructor_args: values,
            verification: VerificationStatus::Pending,
        })
    }

    /// Call `function` on the contract at `to` and wait for the receipt.
    pub async fn transact(
        &self,
        to: Address,
        factory: &ContractFactory,
        function: &str,
        args: &[ArgValue],
    ) -> Result<TxReceipt, DeployError> {
        let contract = factory.contract_name.as_str();
        let values = factory.bind_call(function, args)?;

        tracing::info!(contract, %to, function, args = ?values, "Sending transaction...");

        let tx_hash = self
            .submit(contract, || self.client.submit_call(to, factory, function, &values))
            .await?;
        self.confirm(contract, tx_hash).await
    }

    async fn submit<F, Fut>(&self, contract: &str, submit: F) -> Result<TxHash, DeployError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TxHash, DeployError>>,
    {
        submit
            .retry(ExponentialBuilder::default().with_max_times(self.submission_retries))
            .when(DeployError::is_transient)
            .notify(|err, delay| {
                tracing::warn!(contract, error = %err, ?delay, "Submission failed, retrying...");
            })
            .await
    }

    async fn confirm(&self, contract: &str, tx_hash: TxHash) -> Result<TxReceipt, DeployError> {
        let receipt = self.client.wait_for_receipt(contract, tx_hash).await?;
        if !receipt.success {
            return Err(DeployError::DeploymentReverted {
                contract: contract.to_string(),
                reason: format!(
                    "transaction {tx_hash} reverted in block {}",
                    receipt.block_number
                ),
            });
        }
        Ok(receipt)
    }
}
