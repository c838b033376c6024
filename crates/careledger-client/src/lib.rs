//! CareLedger Client
//!
//! Client-side orchestration over an append-only, permissioned ledger of
//! patient diagnosis/treatment records:
//! - Identity binding through a wallet-style provider
//! - A typed gateway over the ledger contract's five operations
//! - Authorization gating with a per-session role cache
//! - Fetch, add-record and authorize-provider workflows
//!
//! The ledger stores the records and enforces authorization; this crate only
//! sequences calls to it and reacts to its answers.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use careledger_client::{CareLedgerClient, ClientConfig, PatientId, RecordDraft};
//!
//! let client = CareLedgerClient::new(ClientConfig::default(), Some(wallet), contract);
//! client.connect().await?;
//!
//! let outcome = client
//!     .records()
//!     .add_record(RecordDraft::new("7", "Jane Roe", "Influenza A", "Oseltamivir"))
//!     .await?;
//! println!("{}", outcome.notice());
//!
//! let records = client.records().fetch_records(PatientId(7)).await?;
//! ```

pub mod authorization;
pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod records;
pub mod types;
pub mod workflow;

pub use authorization::{AuthorizationCacheEntry, AuthorizationGate, Role};
pub use client::CareLedgerClient;
pub use config::{ClientConfig, ConfigError, WritePolicy};
pub use contract::{CallRequest, CallResponse, ContractCall, LedgerContract};
pub use error::{ClientError, ClientResult};
pub use gateway::LedgerGateway;
pub use identity::{Identity, IdentityBinder, Session, WalletError, WalletProvider};
pub use records::{AddRecordOutcome, AuthorizeOutcome, RecordListCache, RecordService};
pub use types::{CommitReceipt, NewRecord, PatientId, PatientRecord, RecordDraft};
pub use workflow::{WorkflowKind, WorkflowState};
