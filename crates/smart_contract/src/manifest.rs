//! Contract manifests: the ABI and permission surface of a contract.

use crate::error::{ContractError, ContractResult};
use neo3_core::UInt160;
use neo3_cryptography::ECPoint;
use serde::{Deserialize, Serialize};

/// Maximum serialized manifest size in bytes.
pub const MAX_MANIFEST_SIZE: usize = 0xffff;

/// A single exported method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    /// Parameter names/types; only the count is enforced at call time.
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    /// Entry offset into the NEF script.
    #[serde(default)]
    pub offset: usize,
    #[serde(rename = "returntype", default)]
    pub return_type: String,
    /// Safe methods need only ReadStates.
    #[serde(default)]
    pub safe: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: String,
}

/// A declared event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
}

/// The contract ABI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractAbi {
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    #[serde(default)]
    pub events: Vec<EventDescriptor>,
}

/// A group: a public key vouching for a set of contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractGroup {
    #[serde(rename = "pubkey")]
    pub public_key: ECPoint,
    /// Signature of the contract hash by the group key.
    pub signature: String,
}

/// What the contract may call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractPermission {
    /// "*" or a contract hash or a group key.
    #[serde(default = "wildcard")]
    pub contract: String,
    /// "*" or a method list.
    #[serde(default)]
    pub methods: serde_json::Value,
}

fn wildcard() -> String {
    "*".to_string()
}

/// The contract manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractManifest {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<ContractGroup>,
    #[serde(default)]
    pub abi: ContractAbi,
    #[serde(default)]
    pub permissions: Vec<ContractPermission>,
    #[serde(default)]
    pub trusts: serde_json::Value,
    #[serde(rename = "supportedstandards", default)]
    pub supported_standards: Vec<String>,
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl ContractManifest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Looks a method up by name and parameter count.
    pub fn method(&self, name: &str, parameter_count: usize) -> Option<&MethodDescriptor> {
        self.abi
            .methods
            .iter()
            .find(|m| m.name == name && m.parameters.len() == parameter_count)
    }

    /// Looks a method up by name alone (unique names are the norm).
    pub fn method_by_name(&self, name: &str) -> Option<&MethodDescriptor> {
        self.abi.methods.iter().find(|m| m.name == name)
    }

    /// The group keys, used by CustomGroups witness scopes.
    pub fn group_keys(&self) -> Vec<ECPoint> {
        self.groups.iter().map(|g| g.public_key).collect()
    }

    /// Parses manifest JSON, enforcing the size cap.
    pub fn from_json_bytes(data: &[u8]) -> ContractResult<Self> {
        if data.len() > MAX_MANIFEST_SIZE {
            return Err(ContractError::InvalidManifest(format!(
                "manifest of {} bytes exceeds the maximum",
                data.len()
            )));
        }
        let manifest: Self = serde_json::from_slice(data)
            .map_err(|e| ContractError::InvalidManifest(e.to_string()))?;
        if manifest.name.is_empty() || manifest.name.len() > 255 {
            return Err(ContractError::InvalidManifest(
                "invalid manifest name".to_string(),
            ));
        }
        Ok(manifest)
    }

    pub fn to_json_bytes(&self) -> ContractResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ContractError::InvalidManifest(e.to_string()))
    }

    /// Whether the manifest permits calling `target::method`. A missing
    /// permission table means nothing is restricted for system use.
    pub fn can_call(&self, target: &UInt160, method: &str) -> bool {
        if self.permissions.is_empty() {
            return true;
        }
        self.permissions.iter().any(|permission| {
            let contract_matches = permission.contract == "*"
                || UInt160::from_hex(&permission.contract)
                    .map(|h| h == *target)
                    .unwrap_or(false);
            let method_matches = match &permission.methods {
                serde_json::Value::String(s) => s == "*",
                serde_json::Value::Array(names) => names
                    .iter()
                    .any(|n| n.as_str().map(|s| s == method).unwrap_or(false)),
                _ => true,
            };
            contract_matches && method_matches
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContractManifest {
        let mut manifest = ContractManifest::new("Sample");
        manifest.abi.methods.push(MethodDescriptor {
            name: "transfer".to_string(),
            parameters: vec![
                ParameterDescriptor {
                    name: "from".to_string(),
                    parameter_type: "Hash160".to_string(),
                },
                ParameterDescriptor {
                    name: "to".to_string(),
                    parameter_type: "Hash160".to_string(),
                },
            ],
            offset: 42,
            return_type: "Boolean".to_string(),
            safe: false,
        });
        manifest
    }

    #[test]
    fn json_round_trip() {
        let manifest = sample();
        let bytes = manifest.to_json_bytes().unwrap();
        let parsed = ContractManifest::from_json_bytes(&bytes).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn method_lookup_respects_arity() {
        let manifest = sample();
        assert!(manifest.method("transfer", 2).is_some());
        assert!(manifest.method("transfer", 3).is_none());
        assert!(manifest.method("burn", 0).is_none());
    }

    #[test]
    fn empty_name_is_rejected() {
        let json = br#"{"name": ""}"#;
        assert!(ContractManifest::from_json_bytes(json).is_err());
    }

    #[test]
    fn wildcard_permissions_allow_everything() {
        let mut manifest = sample();
        manifest.permissions.push(ContractPermission {
            contract: "*".to_string(),
            methods: serde_json::json!("*"),
        });
        assert!(manifest.can_call(&UInt160::zero(), "anything"));
    }
}
