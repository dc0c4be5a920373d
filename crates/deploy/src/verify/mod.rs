//! Source verification on a block explorer.
//!
//! Verification is best-effort: a [`Verifier`] returns a `Result` and the caller
//! turns it into a [`VerificationStatus`]. Nothing on-chain depends on it.

pub mod etherscan;

use std::{fmt, future::Future};

use alloy_core::{dyn_abi::DynSolValue, primitives::Address};

pub use etherscan::{EtherscanConfig, EtherscanVerifier};

use crate::{DeploymentResult, VerificationError};

/// Everything an explorer needs to match deployed bytecode back to source.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRequest {
    pub contract_name: String,
    /// `source:Name` of the compiled contract.
    pub qualified_name: String,
    pub address: Address,
    pub constructor_args: Vec<DynSolValue>,
}

impl From<&DeploymentResult> for VerificationRequest {
    fn from(result: &DeploymentResult) -> Self {
        Self {
            contract_name: result.contract_name.clone(),
            qualified_name: result.qualified_name.clone(),
            address: result.address,
            constructor_args: result.constructor_args.clone(),
        }
    }
}

/// External source-verification service.
pub trait Verifier: Send + Sync {
    fn verify(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = Result<(), VerificationError>> + Send;
}

/// Verification state of a deployed contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Not attempted yet.
    Pending,
    Verified,
    Failed(String),
    /// Verification is disabled for this run.
    Skipped,
}

impl From<Result<(), VerificationError>> for VerificationStatus {
    fn from(result: Result<(), VerificationError>) -> Self {
        match result {
            Ok(()) => VerificationStatus::Verified,
            Err(e) => VerificationStatus::Failed(e.to_string()),
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Pending => write!(f, "pending"),
            VerificationStatus::Verified => write!(f, "verified"),
            VerificationStatus::Failed(reason) => write!(f, "failed: {reason}"),
            VerificationStatus::Skipped => write!(f, "skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_result() {
        assert_eq!(VerificationStatus::from(Ok(())), VerificationStatus::Verified);
        assert_eq!(
            VerificationStatus::from(Err(VerificationError::AlreadyVerified)),
            VerificationStatus::Failed("contract source is already verified".to_string())
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(VerificationStatus::Pending.to_string(), "pending");
        assert_eq!(
            VerificationStatus::Failed("rate limited".to_string()).to_string(),
            "failed: rate limited"
        );
    }
}
