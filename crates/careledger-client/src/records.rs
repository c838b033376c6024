//! Record Service
//!
//! The clinician and owner workflows:
//! - `fetch_records`: gate, then list a patient's records into the cache
//! - `add_record`: validate, gate, append, then refresh the patient's cache
//! - `authorize_provider`: validate, require owner, grant, then drop the
//!   authorization cache
//!
//! State-changing workflows never overlap. Depending on
//! [`WritePolicy`], a second write while one is in flight is refused with
//! `WriteInFlight` or waits its turn.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, info, warn};

use crate::authorization::AuthorizationGate;
use crate::config::WritePolicy;
use crate::error::{ClientError, ClientResult};
use crate::identity::{Identity, IdentityBinder, Session};
use crate::types::{CommitReceipt, PatientId, PatientRecord, RecordDraft};
use crate::workflow::{Workflow, WorkflowKind, WorkflowState};

/// Last fetched record list for one patient
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordListCache {
    pub patient_id: PatientId,
    pub records: Vec<PatientRecord>,
}

#[derive(Debug, Default)]
struct RecordCache {
    epoch: u64,
    lists: HashMap<PatientId, RecordListCache>,
}

impl RecordCache {
    /// Drop lists filled under an older session
    fn sync_epoch(&mut self, epoch: u64) {
        if self.epoch != epoch {
            self.lists.clear();
            self.epoch = epoch;
        }
    }
}

/// Result of a committed add-record workflow
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddRecordOutcome {
    pub receipt: CommitReceipt,
    pub patient_id: PatientId,
    pub patient_name: String,
    /// Records after the read-your-writes refresh, or the refresh failure
    pub refresh: Result<Vec<PatientRecord>, ClientError>,
}

impl AddRecordOutcome {
    pub fn notice(&self) -> String {
        format!("Record added successfully for patient: {}", self.patient_name)
    }

    pub fn refreshed(&self) -> bool {
        self.refresh.is_ok()
    }
}

/// Result of a committed authorize-provider workflow
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizeOutcome {
    pub receipt: CommitReceipt,
    pub provider: Identity,
}

impl AuthorizeOutcome {
    pub fn notice(&self) -> String {
        format!("Provider {} authorized successfully", self.provider)
    }
}

pub struct RecordService {
    binder: Arc<IdentityBinder>,
    gate: Arc<AuthorizationGate>,
    write_policy: WritePolicy,
    write_guard: AsyncMutex<()>,
    cache: Mutex<RecordCache>,
    last_states: Mutex<HashMap<WorkflowKind, WorkflowState>>,
}

impl RecordService {
    pub fn new(binder: Arc<IdentityBinder>, gate: Arc<AuthorizationGate>) -> Self {
        let write_policy = binder.config().write_policy;
        Self {
            binder,
            gate,
            write_policy,
            write_guard: AsyncMutex::new(()),
            cache: Mutex::new(RecordCache::default()),
            last_states: Mutex::new(HashMap::new()),
        }
    }

    // ==================== FETCH ====================

    /// Fetch a patient's records and replace the cached list on success.
    ///
    /// On failure the previous list, if any, stays available through
    /// [`RecordService::cached_records`].
    pub async fn fetch_records(&self, patient_id: PatientId) -> ClientResult<Vec<PatientRecord>> {
        let mut wf = Workflow::start(WorkflowKind::FetchRecords);
        let result = self.run_fetch(&mut wf, patient_id).await;
        let result = wf.finish(result);
        self.record_state(&wf);
        if let Err(err) = &result {
            if err.is_transient() {
                warn!(%patient_id, %err, "fetch failed, keeping cached records");
            }
        }
        result
    }

    async fn run_fetch(
        &self,
        wf: &mut Workflow,
        patient_id: PatientId,
    ) -> ClientResult<Vec<PatientRecord>> {
        wf.advance(WorkflowState::Checking);
        let session = self.binder.session()?;
        self.gate.ensure_authorized_for(&session).await?;

        wf.advance(WorkflowState::Executing);
        let records = session
            .gateway()
            .list_records(session.identity(), patient_id)
            .await?;

        // Records listed for a retired identity are neither cached nor returned.
        self.require_current(&session)?;
        self.store_records(&session, patient_id, records.clone());
        debug!(%patient_id, count = records.len(), "records fetched");
        Ok(records)
    }

    // ==================== ADD ====================

    /// Append a record, then refresh that patient's cached list.
    ///
    /// A failed refresh does not fail the add; it is reported in
    /// [`AddRecordOutcome::refresh`].
    pub async fn add_record(&self, draft: RecordDraft) -> ClientResult<AddRecordOutcome> {
        let mut wf = Workflow::start(WorkflowKind::AddRecord);
        let result = self.run_add(&mut wf, draft).await;
        let result = wf.finish(result);
        self.record_state(&wf);
        result
    }

    async fn run_add(&self, wf: &mut Workflow, draft: RecordDraft) -> ClientResult<AddRecordOutcome> {
        let record = draft.validate()?;
        let _write = self.acquire_write().await?;

        wf.advance(WorkflowState::Checking);
        let session = self.binder.session()?;
        self.gate.ensure_authorized_for(&session).await?;

        wf.advance(WorkflowState::Executing);
        self.require_current(&session)?;
        let receipt = session.gateway().add_record(session.identity(), &record).await?;
        info!(
            patient_id = %record.patient_id,
            tx = %receipt.transaction_hash,
            "record added"
        );

        let refresh = self.fetch_records(record.patient_id).await;
        if let Err(err) = &refresh {
            warn!(patient_id = %record.patient_id, %err, "refresh after add failed");
        }

        Ok(AddRecordOutcome {
            receipt,
            patient_id: record.patient_id,
            patient_name: record.patient_name,
            refresh,
        })
    }

    // ==================== AUTHORIZE ====================

    /// Grant a provider write access. Owner only.
    pub async fn authorize_provider(&self, provider: &str) -> ClientResult<AuthorizeOutcome> {
        let mut wf = Workflow::start(WorkflowKind::AuthorizeProvider);
        let result = self.run_authorize(&mut wf, provider).await;
        let result = wf.finish(result);
        self.record_state(&wf);
        result
    }

    async fn run_authorize(&self, wf: &mut Workflow, provider: &str) -> ClientResult<AuthorizeOutcome> {
        let provider = Identity::parse(provider)?;
        let _write = self.acquire_write().await?;

        wf.advance(WorkflowState::Checking);
        let session = self.binder.session()?;
        self.gate.ensure_owner_for(&session).await?;

        wf.advance(WorkflowState::Executing);
        self.require_current(&session)?;
        let result = session
            .gateway()
            .authorize_provider(session.identity(), &provider)
            .await;
        // Issued, so the ledger may have changed even if the call failed.
        self.gate.invalidate_all();

        let receipt = result?;
        info!(provider = %provider, tx = %receipt.transaction_hash, "provider authorized");
        Ok(AuthorizeOutcome { receipt, provider })
    }

    // ==================== CACHE ====================

    /// Last successfully fetched records for a patient, possibly stale
    pub fn cached_records(&self, patient_id: PatientId) -> Option<Vec<PatientRecord>> {
        let mut cache = self.lock_cache();
        cache.sync_epoch(self.binder.current_epoch());
        cache.lists.get(&patient_id).map(|l| l.records.clone())
    }

    /// Terminal state of the most recent completed run of `kind`
    pub fn last_state(&self, kind: WorkflowKind) -> WorkflowState {
        self.last_states
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    fn store_records(&self, session: &Session, patient_id: PatientId, records: Vec<PatientRecord>) {
        let mut cache = self.lock_cache();
        let live = self.binder.current_epoch();
        if session.epoch() != live {
            debug!(%patient_id, "session changed during fetch, not caching");
            return;
        }
        cache.sync_epoch(live);
        cache
            .lists
            .insert(patient_id, RecordListCache { patient_id, records });
    }

    fn lock_cache(&self) -> MutexGuard<'_, RecordCache> {
        self.cache.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record_state(&self, wf: &Workflow) {
        self.last_states
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(wf.kind(), wf.state());
    }

    // ==================== WRITE DISCIPLINE ====================

    async fn acquire_write(&self) -> ClientResult<AsyncMutexGuard<'_, ()>> {
        match self.write_policy {
            WritePolicy::Reject => self.write_guard.try_lock().map_err(|_| {
                warn!("write refused, another write is in flight");
                ClientError::WriteInFlight
            }),
            WritePolicy::Queue => Ok(self.write_guard.lock().await),
        }
    }

    fn require_current(&self, session: &Session) -> ClientResult<()> {
        if self.binder.is_current(session) {
            Ok(())
        } else {
            Err(ClientError::SessionChanged)
        }
    }
}
