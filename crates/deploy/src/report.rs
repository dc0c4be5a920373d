//! Outcome of an orchestration run.

use std::fmt;

use alloy_core::primitives::{Address, B256, TxHash};
use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};

use crate::{AddressSource, ContractRole, DeploymentResult, Network, VerificationStatus};

/// Deployment state of one contract within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStatus {
    /// Deployed by this run.
    Deployed,
    /// Not deployed, an existing address was used instead.
    Existing,
    /// Deployment was attempted and failed.
    Failed(String),
    /// The deployment was sent but never confirmed. The contract may be live.
    Unconfirmed(String),
    /// The run stopped or was configured to skip this contract.
    NotAttempted,
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployStatus::Deployed => write!(f, "deployed"),
            DeployStatus::Existing => write!(f, "existing"),
            DeployStatus::Failed(reason) => write!(f, "failed: {reason}"),
            DeployStatus::Unconfirmed(reason) => write!(f, "unconfirmed: {reason}"),
            DeployStatus::NotAttempted => write!(f, "not attempted"),
        }
    }
}

/// One row of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRecord {
    pub role: ContractRole,
    pub status: DeployStatus,
    pub address: Option<Address>,
    /// Where `address` came from. Unset when there is no address.
    pub source: Option<AddressSource>,
    pub tx_hash: Option<TxHash>,
    pub verification: VerificationStatus,
}

impl ContractRecord {
    fn new(role: ContractRole) -> Self {
        Self {
            role,
            status: DeployStatus::NotAttempted,
            address: None,
            source: None,
            tx_hash: None,
            verification: VerificationStatus::Skipped,
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.status == DeployStatus::Deployed
    }
}

/// A role granted on-chain during the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    /// Contract holding the role.
    pub granted_on: Address,
    pub role_name: String,
    pub role_id: B256,
    pub grantee: Address,
    pub tx_hash: TxHash,
}

/// What is live on-chain after a run, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub network: Network,
    /// Set when the run completes or aborts.
    pub generated_at: DateTime<Utc>,
    records: Vec<ContractRecord>,
    /// Votes address the downstream contracts were built against.
    pub votes_binding: Option<(Address, AddressSource)>,
    pub grant: Option<PermissionGrant>,
}

impl DeploymentReport {
    /// Empty report with one not-attempted row per contract.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            generated_at: Utc::now(),
            records: ContractRole::all().map(ContractRecord::new).collect(),
            votes_binding: None,
            grant: None,
        }
    }

    pub fn records(&self) -> &[ContractRecord] {
        &self.records
    }

    pub fn record(&self, role: ContractRole) -> &ContractRecord {
        // Every role has a row from construction on.
        self.records
            .iter()
            .find(|r| r.role == role)
            .unwrap_or_else(|| unreachable!("report has a row for {role}"))
    }

    fn record_mut(&mut self, role: ContractRole) -> &mut ContractRecord {
        self.records
            .iter_mut()
            .find(|r| r.role == role)
            .unwrap_or_else(|| unreachable!("report has a row for {role}"))
    }

    /// Contracts deployed by this run.
    pub fn deployed(&self) -> impl Iterator<Item = &ContractRecord> {
        self.records.iter().filter(|r| r.is_deployed())
    }

    pub fn address(&self, role: ContractRole) -> Option<Address> {
        self.record(role).address
    }

    pub fn record_deployed(&mut self, result: &DeploymentResult) {
        let record = self.record_mut(result.role);
        record.status = DeployStatus::Deployed;
        record.address = Some(result.address);
        record.source = Some(AddressSource::Deployed);
        record.tx_hash = Some(result.tx_hash);
        record.verification = result.verification.clone();
    }

    /// Record a contract that was not deployed but is referenced at `address`.
    pub fn record_existing(&mut self, role: ContractRole, address: Address, source: AddressSource) {
        let record = self.record_mut(role);
        record.status = DeployStatus::Existing;
        record.address = Some(address);
        record.source = Some(source);
    }

    pub fn record_failed(&mut self, role: ContractRole, reason: impl Into<String>) {
        self.record_mut(role).status = DeployStatus::Failed(reason.into());
    }

    pub fn record_unconfirmed(&mut self, role: ContractRole, reason: impl Into<String>) {
        self.record_mut(role).status = DeployStatus::Unconfirmed(reason.into());
    }

    pub fn set_verification(&mut self, role: ContractRole, status: VerificationStatus) {
        self.record_mut(role).verification = status;
    }

    pub fn set_grant(&mut self, grant: PermissionGrant) {
        self.grant = Some(grant);
    }

    /// Stamp the report with the time the run ended.
    pub fn finish(&mut self) {
        self.generated_at = Utc::now();
    }

    /// Render the report as a table.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "Contract",
                "Status",
                "Address",
                "Source",
                "Transaction",
                "Verification",
            ]);

        let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
        for record in &self.records {
            table.add_row(vec![
                record.role.contract_name().to_string(),
                record.status.to_string(),
                or_dash(record.address.map(|a| a.to_string())),
                or_dash(record.source.map(|s| s.to_string())),
                or_dash(record.tx_hash.map(|h| h.to_string())),
                record.verification.to_string(),
            ]);
        }

        table
    }
}

impl fmt::Display for DeploymentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Deployment on {} (chain {}) at {}",
            self.network,
            self.network.chain_id(),
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f, "{}", self.to_table())?;
        if let Some((address, source)) = self.votes_binding {
            writeln!(f, "Downstream contracts bound to Votes at {address} ({source})")?;
        }
        match &self.grant {
            Some(grant) => write!(
                f,
                "{} ({}) granted to {} on {} in {}",
                grant.role_name, grant.role_id, grant.grantee, grant.granted_on, grant.tx_hash
            ),
            None => write!(f, "No role granted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(role: ContractRole, byte: u8) -> DeploymentResult {
        DeploymentResult {
            role,
            contract_name: role.contract_name().to_string(),
            qualified_name: format!("contracts/{0}.sol:{0}", role.contract_name()),
            address: Address::repeat_byte(byte),
            tx_hash: B256::repeat_byte(byte),
            constructor_args: vec![],
            verification: VerificationStatus::Pending,
        }
    }

    #[test]
    fn test_new_report_has_a_row_per_contract() {
        let report = DeploymentReport::new(Network::Goerli);
        assert_eq!(report.records().len(), 3);
        assert!(report.records().iter().all(|r| r.status == DeployStatus::NotAttempted));
        assert_eq!(report.deployed().count(), 0);
    }

    #[test]
    fn test_record_deployed_and_existing() {
        let mut report = DeploymentReport::new(Network::Sepolia);
        report.record_deployed(&result(ContractRole::Auction, 0x22));
        report.record_existing(
            ContractRole::Votes,
            Address::repeat_byte(0x11),
            AddressSource::Override,
        );

        let deployed: Vec<_> = report.deployed().map(|r| r.role).collect();
        assert_eq!(deployed, vec![ContractRole::Auction]);
        assert_eq!(report.address(ContractRole::Votes), Some(Address::repeat_byte(0x11)));
        assert_eq!(report.record(ContractRole::Votes).source, Some(AddressSource::Override));
        assert_eq!(report.address(ContractRole::Questions), None);
    }

    #[test]
    fn test_display_lists_every_contract() {
        let mut report = DeploymentReport::new(Network::Goerli);
        report.record_deployed(&result(ContractRole::Votes, 0x11));
        report.set_verification(ContractRole::Votes, VerificationStatus::Verified);
        report.record_failed(ContractRole::Auction, "reverted");

        let rendered = report.to_string();
        for name in ["Votes", "Auction", "Questions"] {
            assert!(rendered.contains(name), "missing {name} in {rendered}");
        }
        assert!(rendered.contains("verified"));
        assert!(rendered.contains("failed: reverted"));
        assert!(rendered.contains("No role granted"));
    }

    #[test]
    fn test_unconfirmed_is_not_counted_as_deployed() {
        let mut report = DeploymentReport::new(Network::Goerli);
        report.record_unconfirmed(ContractRole::Votes, "timed out");

        assert_eq!(report.deployed().count(), 0);
        assert!(report.to_string().contains("unconfirmed: timed out"));
    }

    #[test]
    fn test_finish_stamps_end_of_run() {
        let mut report = DeploymentReport::new(Network::Goerli);
        let started = report.generated_at - chrono::Duration::minutes(5);
        report.generated_at = started;

        report.finish();
        assert!(report.generated_at > started);
    }
}
