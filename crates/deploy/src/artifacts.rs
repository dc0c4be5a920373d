//! Compiled contract artifacts.
//!
//! Compilation itself is out of scope: artifacts are produced by the Hardhat
//! toolchain and read from disk. A [`ContractFactory`] pairs the creation
//! bytecode with the ABI and binds [`ArgValue`]s to the declared parameter types.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{JsonAbi, Param},
    primitives::Bytes,
};
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::{ArgValue, DeployError};

/// Hardhat mirrors the source tree under the artifacts root.
const SOURCES_DIR: &str = "contracts";

/// Source of compiled contract factories.
pub trait ArtifactSource: Send + Sync {
    /// Look up the factory for a contract by name.
    fn factory(&self, contract_name: &str) -> Result<ContractFactory, DeployError>;
}

/// Creation bytecode and ABI of one compiled contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractFactory {
    pub contract_name: String,
    /// Fully-qualified source path, e.g. `contracts/Votes.sol`.
    pub source_name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

/// On-disk layout of a Hardhat artifact file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    source_name: String,
    abi: JsonAbi,
    bytecode: Bytes,
}

impl ContractFactory {
    pub fn new(
        contract_name: impl Into<String>,
        source_name: impl Into<String>,
        abi: JsonAbi,
        bytecode: Bytes,
    ) -> Self {
        Self {
            contract_name: contract_name.into(),
            source_name: source_name.into(),
            abi,
            bytecode,
        }
    }

    /// Parse a Hardhat artifact JSON document.
    pub fn from_artifact_json(json: &str) -> Result<Self, serde_json::Error> {
        let artifact: HardhatArtifact = serde_json::from_str(json)?;
        Ok(Self {
            contract_name: artifact.contract_name,
            source_name: artifact.source_name,
            abi: artifact.abi,
            bytecode: artifact.bytecode,
        })
    }

    /// `source:Name`, the identifier explorers expect.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Bind constructor arguments to the declared constructor inputs.
    ///
    /// A contract without a declared constructor accepts no arguments.
    pub fn bind_constructor(&self, args: &[ArgValue]) -> Result<Vec<DynSolValue>, DeployError> {
        let inputs = self
            .abi
            .constructor
            .as_ref()
            .map(|ctor| ctor.inputs.as_slice())
            .unwrap_or_default();
        bind_params(&self.contract_name, "constructor", inputs, args)
    }

    /// Bind arguments to the first overload of `function`.
    pub fn bind_call(
        &self,
        function: &str,
        args: &[ArgValue],
    ) -> Result<Vec<DynSolValue>, DeployError> {
        let func = self.function(function)?;
        bind_params(&self.contract_name, function, &func.inputs, args)
    }

    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub fn deploy_data(&self, values: &[DynSolValue]) -> Result<Bytes, DeployError> {
        let mut data = self.bytecode.to_vec();
        match &self.abi.constructor {
            Some(ctor) => {
                let encoded = ctor.abi_encode_input(values).map_err(|e| self.mismatch(e))?;
                data.extend_from_slice(&encoded);
            }
            None if values.is_empty() => {}
            None => {
                return Err(self.mismatch(format!(
                    "no constructor declared but {} arguments supplied",
                    values.len()
                )));
            }
        }
        Ok(data.into())
    }

    /// Selector followed by the ABI-encoded call arguments.
    pub fn call_data(&self, function: &str, values: &[DynSolValue]) -> Result<Bytes, DeployError> {
        let func = self.function(function)?;
        func.abi_encode_input(values)
            .map(Bytes::from)
            .map_err(|e| self.mismatch(e))
    }

    /// ABI-encoded constructor arguments without bytecode, as explorers expect them.
    pub fn encode_constructor_args(values: &[DynSolValue]) -> Bytes {
        DynSolValue::Tuple(values.to_vec()).abi_encode_params().into()
    }

    fn function(&self, name: &str) -> Result<&alloy_core::json_abi::Function, DeployError> {
        self.abi
            .function(name)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| self.mismatch(format!("function {name} is not declared")))
    }

    fn mismatch(&self, reason: impl ToString) -> DeployError {
        DeployError::ArgumentMismatch {
            contract: self.contract_name.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Check arity and types of `args` against `inputs` and convert them to ABI values.
fn bind_params(
    contract: &str,
    target: &str,
    inputs: &[Param],
    args: &[ArgValue],
) -> Result<Vec<DynSolValue>, DeployError> {
    let mismatch = |reason: String| DeployError::ArgumentMismatch {
        contract: contract.to_string(),
        reason,
    };

    if inputs.len() != args.len() {
        return Err(mismatch(format!(
            "{target} expects {} arguments, got {}",
            inputs.len(),
            args.len()
        )));
    }

    inputs
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (param, arg))| {
            let ty: DynSolType = param
                .resolve()
                .map_err(|e| mismatch(format!("{target} parameter {index}: {e}")))?;
            let value = match (&ty, arg) {
                (DynSolType::Address, ArgValue::Address(address)) => DynSolValue::Address(*address),
                (DynSolType::Uint(bits), ArgValue::Uint(value)) if value.bit_len() <= *bits => {
                    DynSolValue::Uint(*value, *bits)
                }
                (DynSolType::String, ArgValue::Text(text)) => DynSolValue::String(text.clone()),
                (DynSolType::FixedBytes(32), ArgValue::Word(word)) => {
                    DynSolValue::FixedBytes(*word, 32)
                }
                (_, ArgValue::Ref(role)) => {
                    return Err(mismatch(format!(
                        "{target} parameter {index} ({}) is an unresolved reference to {role}",
                        param.name
                    )));
                }
                (ty, arg) => {
                    return Err(mismatch(format!(
                        "{target} parameter {index} ({}) is declared {} but got {arg:?}",
                        param.name,
                        ty.sol_type_name()
                    )));
                }
            };
            Ok(value)
        })
        .collect()
}

/// Artifacts read from a Hardhat `artifacts/` directory.
///
/// A contract `Name` is expected at `<root>/contracts/Name.sol/Name.json`.
#[derive(Debug, Clone)]
pub struct HardhatArtifacts {
    root: PathBuf,
}

impl HardhatArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn artifact_path(&self, contract_name: &str) -> PathBuf {
        self.root
            .join(SOURCES_DIR)
            .join(format!("{contract_name}.sol"))
            .join(format!("{contract_name}.json"))
    }

    /// Load the compiler input that produced `contract_name`.
    ///
    /// Hardhat writes a `Name.dbg.json` next to each artifact pointing at the
    /// build-info file holding the standard-JSON input and compiler version.
    pub fn build_info(&self, contract_name: &str) -> anyhow::Result<BuildInfo> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct DebugFile {
            build_info: String,
        }

        let artifact_dir = self
            .artifact_path(contract_name)
            .parent()
            .map(Path::to_path_buf)
            .context("Artifact path has no parent directory")?;
        let dbg_path = artifact_dir.join(format!("{contract_name}.dbg.json"));

        let content = std::fs::read_to_string(&dbg_path)
            .with_context(|| format!("Failed to read {}", dbg_path.display()))?;
        let dbg: DebugFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", dbg_path.display()))?;

        let build_info_path = artifact_dir.join(dbg.build_info);
        let content = std::fs::read_to_string(&build_info_path)
            .with_context(|| format!("Failed to read {}", build_info_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", build_info_path.display()))
    }
}

impl ArtifactSource for HardhatArtifacts {
    fn factory(&self, contract_name: &str) -> Result<ContractFactory, DeployError> {
        let path = self.artifact_path(contract_name);
        let unknown = |reason: String| DeployError::UnknownContract {
            name: contract_name.to_string(),
            reason,
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| unknown(format!("failed to read {}: {e}", path.display())))?;
        let factory = ContractFactory::from_artifact_json(&content)
            .map_err(|e| unknown(format!("failed to parse {}: {e}", path.display())))?;

        tracing::debug!(
            contract = contract_name,
            path = %path.display(),
            bytecode_len = factory.bytecode.len(),
            "Loaded contract artifact"
        );

        Ok(factory)
    }
}

/// Compiler input and version recorded by Hardhat for one compilation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// Full compiler version, e.g. `0.8.18+commit.87f61d96`.
    pub solc_long_version: String,
    /// Standard-JSON compiler input.
    pub input: Value,
}

/// In-memory artifact set, keyed by contract name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    factories: HashMap<String, ContractFactory>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, factory: ContractFactory) -> Self {
        self.factories.insert(factory.contract_name.clone(), factory);
        self
    }
}

impl ArtifactSource for ArtifactSet {
    fn factory(&self, contract_name: &str) -> Result<ContractFactory, DeployError> {
        self.factories
            .get(contract_name)
            .cloned()
            .ok_or_else(|| DeployError::UnknownContract {
                name: contract_name.to_string(),
                reason: "not present in artifact set".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::{Address, B256, U256, address};
    use tempdir::TempDir;

    use super::*;

    const QUESTIONS_ARTIFACT: &str = r#"{
        "_format": "hh-sol-artifact-1",
        "contractName": "Questions",
        "sourceName": "contracts/Questions.sol",
        "abi": [
            {
                "type": "constructor",
                "stateMutability": "nonpayable",
                "inputs": [
                    { "name": "_votesAddress", "type": "address", "internalType": "address" }
                ]
            }
        ],
        "bytecode": "0x6080604052",
        "deployedBytecode": "0x6080",
        "linkReferences": {},
        "deployedLinkReferences": {}
    }"#;

    const VOTES_ABI: &str = r#"[
        {
            "type": "function",
            "name": "grantRole",
            "stateMutability": "nonpayable",
            "inputs": [
                { "name": "role", "type": "bytes32", "internalType": "bytes32" },
                { "name": "account", "type": "address", "internalType": "address" }
            ],
            "outputs": []
        }
    ]"#;

    fn votes_factory() -> ContractFactory {
        ContractFactory::new(
            "Votes",
            "contracts/Votes.sol",
            serde_json::from_str(VOTES_ABI).unwrap(),
            Bytes::from_static(&[0x60, 0x80]),
        )
    }

    #[test]
    fn test_parse_hardhat_artifact() {
        let factory = ContractFactory::from_artifact_json(QUESTIONS_ARTIFACT).unwrap();
        assert_eq!(factory.contract_name, "Questions");
        assert_eq!(factory.qualified_name(), "contracts/Questions.sol:Questions");
        assert_eq!(factory.bytecode.len(), 5);
        assert!(factory.abi.constructor.is_some());
    }

    #[test]
    fn test_bind_constructor_arity_mismatch() {
        let factory = ContractFactory::from_artifact_json(QUESTIONS_ARTIFACT).unwrap();
        let err = factory.bind_constructor(&[]).unwrap_err();
        assert!(matches!(
            err,
            DeployError::ArgumentMismatch { ref contract, .. } if contract == "Questions"
        ));
    }

    #[test]
    fn test_bind_constructor_type_mismatch() {
        let factory = ContractFactory::from_artifact_json(QUESTIONS_ARTIFACT).unwrap();
        let err = factory
            .bind_constructor(&[ArgValue::Text("not an address".to_string())])
            .unwrap_err();
        assert!(matches!(err, DeployError::ArgumentMismatch { .. }));
    }

    #[test]
    fn test_deploy_data_appends_encoded_args() {
        let factory = ContractFactory::from_artifact_json(QUESTIONS_ARTIFACT).unwrap();
        let votes = address!("00000000000000000000000000000000000000a2");
        let values = factory.bind_constructor(&[ArgValue::Address(votes)]).unwrap();
        assert_eq!(values, vec![DynSolValue::Address(votes)]);

        let data = factory.deploy_data(&values).unwrap();
        assert_eq!(data.len(), 5 + 32);
        assert_eq!(&data[..5], factory.bytecode.as_ref());
        assert_eq!(&data[5 + 12..], votes.as_slice());
    }

    #[test]
    fn test_no_constructor_accepts_no_args() {
        let factory = votes_factory();
        assert!(factory.bind_constructor(&[]).unwrap().is_empty());
        assert_eq!(factory.deploy_data(&[]).unwrap(), factory.bytecode);
        assert!(factory.bind_constructor(&[ArgValue::Uint(U256::from(1u64))]).is_err());
    }

    #[test]
    fn test_bind_call_grant_role() {
        let factory = votes_factory();
        let role = B256::repeat_byte(0x11);
        let account = Address::repeat_byte(0x22);

        let values = factory
            .bind_call("grantRole", &[ArgValue::Word(role), ArgValue::Address(account)])
            .unwrap();
        assert_eq!(
            values,
            vec![DynSolValue::FixedBytes(role, 32), DynSolValue::Address(account)]
        );

        let data = factory.call_data("grantRole", &values).unwrap();
        // selector + two words
        assert_eq!(data.len(), 4 + 64);
    }

    #[test]
    fn test_bind_call_unknown_function() {
        let err = votes_factory().bind_call("mint", &[]).unwrap_err();
        assert!(matches!(
            err,
            DeployError::ArgumentMismatch { ref reason, .. } if reason.contains("mint")
        ));
    }

    #[test]
    fn test_hardhat_artifacts_from_disk() {
        let dir = TempDir::new("quorum-artifacts").unwrap();
        let contract_dir = dir.path().join("contracts/Questions.sol");
        std::fs::create_dir_all(&contract_dir).unwrap();
        std::fs::write(contract_dir.join("Questions.json"), QUESTIONS_ARTIFACT).unwrap();

        let artifacts = HardhatArtifacts::new(dir.path());
        let factory = artifacts.factory("Questions").unwrap();
        assert_eq!(factory.source_name, "contracts/Questions.sol");

        let err = artifacts.factory("Auction").unwrap_err();
        assert!(matches!(err, DeployError::UnknownContract { ref name, .. } if name == "Auction"));
    }

    #[test]
    fn test_build_info_follows_debug_file() {
        let dir = TempDir::new("quorum-build-info").unwrap();
        let contract_dir = dir.path().join("contracts/Questions.sol");
        let build_info_dir = dir.path().join("build-info");
        std::fs::create_dir_all(&contract_dir).unwrap();
        std::fs::create_dir_all(&build_info_dir).unwrap();

        std::fs::write(
            contract_dir.join("Questions.dbg.json"),
            r#"{ "_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/abc123.json" }"#,
        )
        .unwrap();
        std::fs::write(
            build_info_dir.join("abc123.json"),
            r#"{
                "solcVersion": "0.8.18",
                "solcLongVersion": "0.8.18+commit.87f61d96",
                "input": { "language": "Solidity" }
            }"#,
        )
        .unwrap();

        let info = HardhatArtifacts::new(dir.path()).build_info("Questions").unwrap();
        assert_eq!(info.solc_long_version, "0.8.18+commit.87f61d96");
        assert_eq!(info.input["language"], "Solidity");
    }

    #[test]
    fn test_artifact_set_lookup() {
        let set = ArtifactSet::new().with(votes_factory());
        assert!(set.factory("Votes").is_ok());
        assert!(matches!(set.factory("Auction"), Err(DeployError::UnknownContract { .. })));
    }

    #[test]
    fn test_encode_constructor_args() {
        let votes = address!("00000000000000000000000000000000000000a2");
        let encoded = ContractFactory::encode_constructor_args(&[DynSolValue::Address(votes)]);
        assert_eq!(encoded.len(), 32);
        assert_eq!(&encoded[12..], votes.as_slice());
    }
}
