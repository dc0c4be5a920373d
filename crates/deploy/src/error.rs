//! Error taxonomy for the deployment pipeline.
//!
//! Deployment errors are fatal to the stage that raised them and to every stage
//! depending on its output. Verification errors are never fatal and only ever
//! surface as a [`VerificationStatus`](crate::VerificationStatus).

use crate::{ContractRole, ContractSymbol, DeploymentReport, Stage};

/// Errors raised while resolving, binding, submitting or confirming a deployment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    /// The requested network is not one of the supported networks.
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// A required address has no entry for the active network.
    #[error("no {symbol} address is known for network {network}")]
    MissingAddress {
        symbol: ContractSymbol,
        network: String,
    },

    /// No compiled artifact exists for the contract.
    #[error("no compiled artifact for contract {name}: {reason}")]
    UnknownContract { name: String, reason: String },

    /// Constructor or call arguments do not match the declared ABI.
    #[error("argument mismatch for {contract}: {reason}")]
    ArgumentMismatch { contract: String, reason: String },

    /// A forward reference points at a contract whose address is not resolved yet.
    #[error("{contract} references the {role} address, which has not been resolved")]
    UnresolvedReference { contract: String, role: ContractRole },

    /// The transaction was mined but execution reverted.
    #[error("transaction for {contract} reverted: {reason}")]
    DeploymentReverted { contract: String, reason: String },

    /// The transaction could not be submitted.
    #[error("submission for {contract} failed: {reason}")]
    SubmissionFailed { contract: String, reason: String },

    /// The transaction may have been broadcast, but its outcome was not observed.
    ///
    /// Never retried: resubmitting could execute the transaction twice.
    #[error("outcome of the {contract} transaction is unknown, it may still be mined: {reason}")]
    OutcomeUnknown { contract: String, reason: String },
}

impl DeployError {
    /// Whether retrying the submission may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SubmissionFailed { .. })
    }

    /// Whether the transaction may be live on-chain despite the error.
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, Self::OutcomeUnknown { .. })
    }
}

/// Errors returned by a [`Verifier`](crate::Verifier).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("contract source is already verified")]
    AlreadyVerified,

    #[error("verification rejected: {0}")]
    Rejected(String),

    #[error("verification still pending after {attempts} status checks")]
    Timeout { attempts: usize },

    #[error("verification service unreachable: {0}")]
    Transport(String),

    #[error("compiler input for {contract} unavailable: {reason}")]
    MissingBuildInfo { contract: String, reason: String },
}

/// Aggregate failure of an orchestration run.
///
/// Always carries the report of what is live on-chain at the time of failure,
/// since committed deployments cannot be rolled back.
#[derive(Debug, thiserror::Error)]
#[error("orchestration failed at stage {stage} ({contract}): {source}")]
pub struct OrchestrationError {
    pub stage: Stage,
    pub contract: String,
    #[source]
    pub source: DeployError,
    pub report: DeploymentReport,
}

impl OrchestrationError {
    /// True when at least one contract was deployed before the failure.
    pub fn is_partial(&self) -> bool {
        self.report.deployed().next().is_some()
    }
}
