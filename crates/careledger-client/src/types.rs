//! Record and receipt types exchanged with the ledger.

use careledger_validation::{parse_patient_id, validate_record_fields};
use chrono::{DateTime, TimeZone, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Numeric patient identifier as stored on the ledger
#[derive(
    Clone, Copy, Debug, Display, From, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct PatientId(pub u64);

impl PatientId {
    /// Parse from form text, rejecting empty and non-numeric input
    pub fn parse(raw: &str) -> ClientResult<Self> {
        parse_patient_id(raw).map(PatientId).map_err(ClientError::from)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::str::FromStr for PatientId {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatientId::parse(s)
    }
}

/// One diagnosis/treatment entry. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientRecord {
    pub record_id: u64,
    pub patient_id: PatientId,
    pub patient_name: String,
    pub diagnosis: String,
    pub treatment: String,
    /// Unix seconds
    pub timestamp: u64,
}

impl PatientRecord {
    /// Ledger timestamp as a UTC date-time, if representable
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.timestamp).ok()?;
        Utc.timestamp_opt(secs, 0).single()
    }
}

/// Raw add-record form input, exactly as typed.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordDraft {
    pub patient_id: String,
    pub patient_name: String,
    pub diagnosis: String,
    pub treatment: String,
}

impl RecordDraft {
    pub fn new(
        patient_id: impl Into<String>,
        patient_name: impl Into<String>,
        diagnosis: impl Into<String>,
        treatment: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            patient_name: patient_name.into(),
            diagnosis: diagnosis.into(),
            treatment: treatment.into(),
        }
    }

    /// Check every field and produce the record to submit.
    ///
    /// All problems are reported together in the `InvalidInput` message.
    pub fn validate(&self) -> ClientResult<NewRecord> {
        validate_record_fields(
            &self.patient_id,
            &self.patient_name,
            &self.diagnosis,
            &self.treatment,
        )
        .into_result()?;

        Ok(NewRecord {
            patient_id: PatientId::parse(&self.patient_id)?,
            patient_name: self.patient_name.clone(),
            diagnosis: self.diagnosis.clone(),
            treatment: self.treatment.clone(),
        })
    }
}

/// A validated record ready for `addRecord`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewRecord {
    pub patient_id: PatientId,
    pub patient_name: String,
    pub diagnosis: String,
    pub treatment: String,
}

/// Acknowledgement that a state-changing call was accepted.
///
/// Acceptance is not final settlement.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<u64>,
}
