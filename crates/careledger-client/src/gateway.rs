//! Ledger Gateway
//!
//! The single typed boundary over the external contract. One method per
//! contract operation, one round trip each, no retry. The gateway only
//! decodes structure; deciding who may do what is the authorization gate's
//! job.
//!
//! ## Response mapping
//!
//! | Transport outcome | Error |
//! |---|---|
//! | `Reverted` | `RejectedByLedger` |
//! | `Rejected` | `UserRejected` |
//! | `NetworkError` | `GatewayUnavailable` |
//! | undecodable `Ok` | `MalformedResponse` |

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::contract::{CallRequest, CallResponse, ContractCall, LedgerContract};
use crate::error::{ClientError, ClientResult};
use crate::identity::Identity;
use crate::types::{CommitReceipt, NewRecord, PatientId, PatientRecord};

/// Handle to the deployed contract, bound to one session identity.
#[derive(Clone)]
pub struct LedgerGateway {
    contract: Arc<dyn LedgerContract>,
    contract_address: String,
    bound: Identity,
}

impl std::fmt::Debug for LedgerGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerGateway")
            .field("contract_address", &self.contract_address)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

impl LedgerGateway {
    pub fn new(contract: Arc<dyn LedgerContract>, contract_address: String, bound: Identity) -> Self {
        Self {
            contract,
            contract_address,
            bound,
        }
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    /// Identity this handle attributes calls to
    pub fn bound_identity(&self) -> &Identity {
        &self.bound
    }

    // ==================== READ-ONLY ====================

    pub async fn get_owner(&self) -> ClientResult<Identity> {
        let call = ContractCall::GetOwner;
        let method = call.method();
        let value = self.invoke(None, call).await?;
        let raw: String = decode(method, value)?;
        Identity::parse(&raw).map_err(|e| ClientError::MalformedResponse {
            method,
            message: e.to_string(),
        })
    }

    pub async fn get_authorization(&self, identity: &Identity) -> ClientResult<bool> {
        let call = ContractCall::GetAuthorization {
            acc: identity.as_str().to_string(),
        };
        let method = call.method();
        let value = self.invoke(None, call).await?;
        decode(method, value)
    }

    // ==================== CALLER CONTEXT ====================

    pub async fn authorize_provider(
        &self,
        caller: &Identity,
        provider: &Identity,
    ) -> ClientResult<CommitReceipt> {
        self.check_caller(caller)?;
        let call = ContractCall::AuthorizeProvider {
            provider: provider.as_str().to_string(),
        };
        let method = call.method();
        let value = self.invoke(Some(caller), call).await?;
        decode(method, value)
    }

    pub async fn add_record(&self, caller: &Identity, record: &NewRecord) -> ClientResult<CommitReceipt> {
        self.check_caller(caller)?;
        let call = ContractCall::AddRecord {
            patient_id: record.patient_id.get(),
            patient_name: record.patient_name.clone(),
            diagnosis: record.diagnosis.clone(),
            treatment: record.treatment.clone(),
        };
        let method = call.method();
        let value = self.invoke(Some(caller), call).await?;
        decode(method, value)
    }

    /// Records for a patient in ledger append order.
    ///
    /// Needs a caller context even though nothing is mutated.
    pub async fn list_records(
        &self,
        caller: &Identity,
        patient_id: PatientId,
    ) -> ClientResult<Vec<PatientRecord>> {
        self.check_caller(caller)?;
        let call = ContractCall::GetPatientRecords {
            patient_id: patient_id.get(),
        };
        let method = call.method();
        let value = self.invoke(Some(caller), call).await?;
        let raw: Vec<RawRecord> = decode(method, value)?;
        Ok(raw
            .into_iter()
            .map(|r| PatientRecord {
                record_id: r.record_id,
                patient_id,
                patient_name: r.patient_name,
                diagnosis: r.diagnosis,
                treatment: r.treatment,
                timestamp: r.timestamp,
            })
            .collect())
    }

    // ==================== INTERNALS ====================

    fn check_caller(&self, caller: &Identity) -> ClientResult<()> {
        if caller != &self.bound {
            return Err(ClientError::CallerMismatch {
                caller: caller.to_string(),
                bound: self.bound.to_string(),
            });
        }
        Ok(())
    }

    async fn invoke(&self, from: Option<&Identity>, call: ContractCall) -> ClientResult<serde_json::Value> {
        let method = call.method();
        debug_assert_eq!(
            call.requires_caller(),
            from.is_some(),
            "{} caller context mismatch",
            method
        );
        debug!(method, caller = ?from.map(Identity::short), "ledger call");

        let request = CallRequest {
            to: self.contract_address.clone(),
            from: from.map(|f| f.as_str().to_string()),
            call,
        };

        match self.contract.invoke(request).await {
            CallResponse::Ok(value) => Ok(value),
            CallResponse::Reverted(reason) => {
                debug!(method, %reason, "ledger call reverted");
                Err(ClientError::RejectedByLedger(reason))
            }
            CallResponse::Rejected => Err(ClientError::UserRejected),
            CallResponse::NetworkError(err) => {
                debug!(method, %err, "ledger unreachable");
                Err(ClientError::GatewayUnavailable(format!("{}: {}", method, err)))
            }
        }
    }
}

fn decode<T: DeserializeOwned>(method: &'static str, value: serde_json::Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|e| ClientError::MalformedResponse {
        method,
        message: e.to_string(),
    })
}

/// Element of the `getPatientRecords` tuple array
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "recordID", deserialize_with = "uint::deserialize")]
    record_id: u64,
    #[serde(rename = "patientName")]
    patient_name: String,
    diagnosis: String,
    treatment: String,
    #[serde(deserialize_with = "uint::deserialize")]
    timestamp: u64,
}

/// `uint256` values arrive as JSON numbers, decimal strings or `0x` hex.
mod uint {
    use serde::de::{self, Deserializer};
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => parse(&s).map_err(de::Error::custom),
        }
    }

    pub(super) fn parse(s: &str) -> Result<u64, String> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse::<u64>(),
        };
        parsed.map_err(|e| format!("invalid uint {:?}: {}", s, e))
    }
}
