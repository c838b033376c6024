//! Shared fixtures: an in-process stand-in for the records contract and a
//! scriptable wallet.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use careledger_client::{
    CallRequest, CallResponse, CareLedgerClient, ClientConfig, ContractCall, LedgerContract,
    RecordDraft, WalletError, WalletProvider, WritePolicy,
};
use serde_json::json;
use tokio::sync::Notify;

// ============================================================================
// Fixtures
// ============================================================================

pub const OWNER: &str = "0x7c4f5bDa50e93E74824Bd7Ab5706Fc4FC19dDf62";
pub const PROVIDER: &str = "0x1111111111111111111111111111111111111111";
pub const PROVIDER_Q: &str = "0x2222222222222222222222222222222222222222";
pub const STRANGER: &str = "0x3333333333333333333333333333333333333333";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_draft(patient_id: &str) -> RecordDraft {
    RecordDraft::new(patient_id, "Jane Roe", "Type 2 diabetes", "Metformin 500mg")
}

pub fn client(ledger: &Arc<MockLedger>, wallet: &Arc<MockWallet>) -> CareLedgerClient {
    client_with_policy(ledger, wallet, WritePolicy::Reject)
}

pub fn client_with_policy(
    ledger: &Arc<MockLedger>,
    wallet: &Arc<MockWallet>,
    policy: WritePolicy,
) -> CareLedgerClient {
    init_tracing();
    let provider: Arc<dyn WalletProvider> = wallet.clone();
    let contract: Arc<dyn LedgerContract> = ledger.clone();
    CareLedgerClient::new(
        ClientConfig::default().with_write_policy(policy),
        Some(provider),
        contract,
    )
}

// ============================================================================
// Wallet
// ============================================================================

pub struct MockWallet {
    response: Mutex<Result<Vec<String>, WalletError>>,
    requests: AtomicUsize,
    hold_next: AtomicBool,
    request_held: Notify,
    release: Notify,
}

impl MockWallet {
    pub fn with_account(account: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(vec![account.to_string()])),
            requests: AtomicUsize::new(0),
            hold_next: AtomicBool::new(false),
            request_held: Notify::new(),
            release: Notify::new(),
        })
    }

    pub fn respond(&self, response: Result<Vec<String>, WalletError>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn switch_to(&self, account: &str) {
        self.respond(Ok(vec![account.to_string()]));
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Park the next account request, after it has read its answer, until
    /// [`MockWallet::release`]
    pub fn hold_next(&self) {
        self.hold_next.store(true, Ordering::SeqCst);
    }

    /// Resolves once a request is parked
    pub async fn request_held(&self) {
        self.request_held.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_waiters();
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<String>, WalletError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let response = self.response.lock().unwrap().clone();
        if self.hold_next.swap(false, Ordering::SeqCst) {
            let released = self.release.notified();
            self.request_held.notify_one();
            released.await;
        }
        response
    }
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Debug, Clone)]
struct StoredRecord {
    record_id: u64,
    patient_id: u64,
    patient_name: String,
    diagnosis: String,
    treatment: String,
    timestamp: u64,
}

#[derive(Default)]
struct LedgerState {
    owner: String,
    authorized: HashSet<String>,
    records: Vec<StoredRecord>,
    next_record_id: u64,
    next_block: u64,
    calls: Vec<(String, Option<String>)>,
    /// Canned responses consumed by the next call of a method
    scripted: HashMap<String, Vec<CallResponse>>,
    offline: bool,
    in_flight_writes: usize,
    max_in_flight_writes: usize,
}

/// In-process stand-in for the deployed contract.
///
/// Behaves like the reference contract: owner-only `authorizeProvider`,
/// authorized-only `addRecord`/`getPatientRecords`, append-only records with
/// increasing IDs. Returns `uint`s as decimal strings like web3 does.
pub struct MockLedger {
    state: Mutex<LedgerState>,
    /// Methods whose calls park before executing
    held: Mutex<HashSet<String>>,
    call_held: Notify,
    release: Notify,
}

impl MockLedger {
    pub fn new(owner: &str) -> Arc<Self> {
        let mut authorized = HashSet::new();
        authorized.insert(owner.to_lowercase());
        Arc::new(Self {
            state: Mutex::new(LedgerState {
                owner: owner.to_string(),
                authorized,
                next_record_id: 1,
                next_block: 1,
                ..Default::default()
            }),
            held: Mutex::new(HashSet::new()),
            call_held: Notify::new(),
            release: Notify::new(),
        })
    }

    /// Set an identity's authorization bit directly, bypassing the owner
    pub fn set_authorized(&self, account: &str, authorized: bool) {
        let mut state = self.state.lock().unwrap();
        if authorized {
            state.authorized.insert(account.to_lowercase());
        } else {
            state.authorized.remove(&account.to_lowercase());
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Answer the next call of `method` with `response` instead of executing it
    pub fn script(&self, method: &str, response: CallResponse) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .entry(method.to_string())
            .or_default()
            .push(response);
    }

    /// Park calls of `method` before they execute, until [`MockLedger::release`]
    pub fn hold(&self, method: &str) {
        self.held.lock().unwrap().insert(method.to_string());
    }

    /// Let every parked call proceed and stop holding new ones
    pub fn release(&self) {
        self.held.lock().unwrap().clear();
        self.release.notify_waiters();
    }

    /// Resolves once a held call has reached the ledger
    pub async fn call_held(&self) {
        self.call_held.notified().await;
    }

    /// Park state-changing calls until [`MockLedger::release_writes`]
    pub fn hold_writes(&self) {
        self.hold("addRecord");
        self.hold("authorizeProvider");
    }

    pub fn release_writes(&self) {
        self.release();
    }

    /// Resolves once a held state-changing call has reached the ledger
    pub async fn write_started(&self) {
        self.call_held().await;
    }

    /// Append a record directly, as another client of the ledger would
    pub fn append_record(&self, patient_id: u64, diagnosis: &str) {
        let mut state = self.state.lock().unwrap();
        let record_id = state.next_record_id;
        state.next_record_id += 1;
        state.records.push(StoredRecord {
            record_id,
            patient_id,
            patient_name: "Jane Roe".to_string(),
            diagnosis: diagnosis.to_string(),
            treatment: "Observation".to_string(),
            timestamp: 1_704_153_600 + record_id,
        });
    }

    fn is_held(&self, method: &str) -> bool {
        self.held.lock().unwrap().contains(method)
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    pub fn max_in_flight_writes(&self) -> usize {
        self.state.lock().unwrap().max_in_flight_writes
    }

    pub fn record_count(&self, patient_id: u64) -> usize {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .count()
    }

    fn begin(&self, request: &CallRequest) -> Option<CallResponse> {
        let mut state = self.state.lock().unwrap();
        let method = request.call.method().to_string();
        state.calls.push((method.clone(), request.from.clone()));

        if let Some(queue) = state.scripted.get_mut(&method) {
            if !queue.is_empty() {
                return Some(queue.remove(0));
            }
        }
        if state.offline {
            return Some(CallResponse::NetworkError("connection refused".to_string()));
        }
        if request.call.mutates_ledger() {
            state.in_flight_writes += 1;
            state.max_in_flight_writes = state.max_in_flight_writes.max(state.in_flight_writes);
        }
        None
    }

    fn execute(&self, request: &CallRequest) -> CallResponse {
        let mut state = self.state.lock().unwrap();
        let from = request.from.as_deref().map(str::to_lowercase);
        let caller_authorized = from
            .as_ref()
            .map(|f| state.authorized.contains(f))
            .unwrap_or(false);

        match &request.call {
            ContractCall::GetOwner => CallResponse::Ok(json!(state.owner)),
            ContractCall::GetAuthorization { acc } => {
                CallResponse::Ok(json!(state.authorized.contains(&acc.to_lowercase())))
            }
            ContractCall::AuthorizeProvider { provider } => {
                if from.as_deref() != Some(state.owner.to_lowercase().as_str()) {
                    return CallResponse::Reverted("Only owner can authorize providers".to_string());
                }
                state.authorized.insert(provider.to_lowercase());
                Self::receipt(&mut state)
            }
            ContractCall::AddRecord {
                patient_id,
                patient_name,
                diagnosis,
                treatment,
            } => {
                if !caller_authorized {
                    return CallResponse::Reverted("Not authorized".to_string());
                }
                let record_id = state.next_record_id;
                state.next_record_id += 1;
                state.records.push(StoredRecord {
                    record_id,
                    patient_id: *patient_id,
                    patient_name: patient_name.clone(),
                    diagnosis: diagnosis.clone(),
                    treatment: treatment.clone(),
                    timestamp: 1_704_153_600 + record_id,
                });
                Self::receipt(&mut state)
            }
            ContractCall::GetPatientRecords { patient_id } => {
                if !caller_authorized {
                    return CallResponse::Reverted("Not authorized".to_string());
                }
                let records: Vec<_> = state
                    .records
                    .iter()
                    .filter(|r| r.patient_id == *patient_id)
                    .map(|r| {
                        json!({
                            "recordID": r.record_id.to_string(),
                            "patientName": r.patient_name,
                            "diagnosis": r.diagnosis,
                            "treatment": r.treatment,
                            "timestamp": r.timestamp.to_string(),
                        })
                    })
                    .collect();
                CallResponse::Ok(json!(records))
            }
        }
    }

    fn receipt(state: &mut LedgerState) -> CallResponse {
        let block = state.next_block;
        state.next_block += 1;
        CallResponse::Ok(json!({
            "transactionHash": format!("0x{:064x}", block),
            "blockNumber": block,
        }))
    }
}

#[async_trait]
impl LedgerContract for MockLedger {
    async fn invoke(&self, request: CallRequest) -> CallResponse {
        if let Some(response) = self.begin(&request) {
            return response;
        }

        let method = request.call.method();
        if self.is_held(method) {
            self.call_held.notify_one();
            loop {
                let released = self.release.notified();
                if !self.is_held(method) {
                    break;
                }
                released.await;
            }
        }

        // Yield once so concurrent callers interleave at the call boundary.
        tokio::task::yield_now().await;

        let response = self.execute(&request);
        if request.call.mutates_ledger() {
            self.state.lock().unwrap().in_flight_writes -= 1;
        }
        response
    }
}
