//! Wiring of the four components into one session handle.

use std::sync::Arc;

use crate::authorization::{AuthorizationGate, Role};
use crate::config::ClientConfig;
use crate::contract::LedgerContract;
use crate::error::ClientResult;
use crate::identity::{Identity, IdentityBinder, WalletProvider};
use crate::records::RecordService;

/// One user session over the records ledger.
pub struct CareLedgerClient {
    binder: Arc<IdentityBinder>,
    gate: Arc<AuthorizationGate>,
    records: RecordService,
}

impl CareLedgerClient {
    pub fn new(
        config: ClientConfig,
        provider: Option<Arc<dyn WalletProvider>>,
        contract: Arc<dyn LedgerContract>,
    ) -> Self {
        let binder = Arc::new(IdentityBinder::new(provider, contract, config));
        let gate = Arc::new(AuthorizationGate::new(Arc::clone(&binder)));
        let records = RecordService::new(Arc::clone(&binder), Arc::clone(&gate));
        Self {
            binder,
            gate,
            records,
        }
    }

    /// Bind the wallet's active account. Call again to switch accounts.
    pub async fn connect(&self) -> ClientResult<Identity> {
        self.binder.bind().await
    }

    /// Role of the connected account, e.g. for a "you are the owner" banner
    pub async fn role(&self) -> ClientResult<Role> {
        self.gate.resolve_role().await
    }

    pub fn identity(&self) -> ClientResult<Identity> {
        self.binder.identity()
    }

    pub fn binder(&self) -> &IdentityBinder {
        &self.binder
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    pub fn records(&self) -> &RecordService {
        &self.records
    }
}
