//! Raw call surface of the external ledger contract.
//!
//! The contract is a fixed interface of five methods. Transports (JSON-RPC,
//! an embedded node, a test double) implement [`LedgerContract`]; everything
//! above it goes through [`crate::gateway::LedgerGateway`].

use async_trait::async_trait;
use serde::Serialize;

/// One method of the contract with its parameters.
///
/// Serializes as `{ "method": "...", "params": { ... } }` with the contract's
/// own parameter names.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum ContractCall {
    GetOwner,
    GetAuthorization {
        acc: String,
    },
    AuthorizeProvider {
        provider: String,
    },
    #[serde(rename_all = "camelCase")]
    AddRecord {
        #[serde(rename = "patientID")]
        patient_id: u64,
        patient_name: String,
        diagnosis: String,
        treatment: String,
    },
    GetPatientRecords {
        #[serde(rename = "patientID")]
        patient_id: u64,
    },
}

impl ContractCall {
    /// Contract method name
    pub fn method(&self) -> &'static str {
        match self {
            ContractCall::GetOwner => "getOwner",
            ContractCall::GetAuthorization { .. } => "getAuthorization",
            ContractCall::AuthorizeProvider { .. } => "authorizeProvider",
            ContractCall::AddRecord { .. } => "addRecord",
            ContractCall::GetPatientRecords { .. } => "getPatientRecords",
        }
    }

    /// Whether the call changes ledger state (must be signed and sent)
    pub fn mutates_ledger(&self) -> bool {
        matches!(
            self,
            ContractCall::AuthorizeProvider { .. } | ContractCall::AddRecord { .. }
        )
    }

    /// Whether the ledger requires a caller context for this call.
    ///
    /// `getPatientRecords` performs no mutation but is declared non-view.
    pub fn requires_caller(&self) -> bool {
        self.mutates_ledger() || matches!(self, ContractCall::GetPatientRecords { .. })
    }
}

/// A call addressed to a deployed contract.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CallRequest {
    /// Deployed contract address
    pub to: String,
    /// Caller the call is attributed to, when the ledger needs one
    pub from: Option<String>,
    #[serde(flatten)]
    pub call: ContractCall,
}

/// Outcome of a single contract invocation
#[derive(Clone, Debug, PartialEq)]
pub enum CallResponse {
    /// Call accepted; payload is the decoded return value, or the receipt for
    /// state-changing calls
    Ok(serde_json::Value),
    /// The contract reverted
    Reverted(String),
    /// The user declined to sign
    Rejected,
    /// The ledger could not be reached
    NetworkError(String),
}

/// Transport to the deployed contract.
#[async_trait]
pub trait LedgerContract: Send + Sync {
    /// Perform one request/response round trip. No retry.
    async fn invoke(&self, request: CallRequest) -> CallResponse;
}
