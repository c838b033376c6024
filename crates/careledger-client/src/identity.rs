//! Identity binding
//!
//! Performs the single wallet handshake per session, binds the first account
//! returned, and builds the gateway handle used by every later call.
//!
//! Every bind attempt bumps the session epoch. Caches held by the
//! authorization gate and the record service stamp their entries with the
//! epoch they were filled under and discard anything older, so rebinding
//! invalidates them without this module knowing about them.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use careledger_validation::validate_address;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::contract::LedgerContract;
use crate::error::{ClientError, ClientResult};
use crate::gateway::LedgerGateway;

// ==================== IDENTITY ====================

/// Address-like value identifying a caller to the ledger.
///
/// Equality and hashing ignore ASCII case, so checksummed and lower-case
/// renderings of the same hex address compare equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Validate and wrap an address
    pub fn parse(raw: &str) -> ClientResult<Self> {
        let trimmed = raw.trim();
        validate_address(trimmed, "address").into_result()?;
        Ok(Identity(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines, e.g. `0x7c4f…Df62`
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 12 {
            return self.0.clone();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identity::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl std::str::FromStr for Identity {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identity::parse(s)
    }
}

// ==================== WALLET PROVIDER ====================

/// Failure reported by a wallet-style provider
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("user rejected the account request")]
    UserRejected,
    #[error("{0}")]
    Unavailable(String),
}

/// External identity provider.
///
/// One call per bind: the equivalent of an `eth_requestAccounts` prompt.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<String>, WalletError>;
}

// ==================== SESSION ====================

/// State established by a successful bind
#[derive(Clone, Debug)]
pub struct Session {
    identity: Identity,
    gateway: LedgerGateway,
    epoch: u64,
}

impl Session {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn gateway(&self) -> &LedgerGateway {
        &self.gateway
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Resolves and holds the caller identity for the session.
pub struct IdentityBinder {
    provider: Option<Arc<dyn WalletProvider>>,
    contract: Arc<dyn LedgerContract>,
    config: ClientConfig,
    epoch: AtomicU64,
    session: RwLock<Option<Session>>,
}

impl IdentityBinder {
    /// `provider` is `None` when no wallet is installed.
    pub fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        contract: Arc<dyn LedgerContract>,
        config: ClientConfig,
    ) -> Self {
        Self {
            provider,
            contract,
            config,
            epoch: AtomicU64::new(0),
            session: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform the handshake and bind account 0.
    ///
    /// Any previous session is torn down first, whether or not this bind
    /// succeeds.
    pub async fn bind(&self) -> ClientResult<Identity> {
        let epoch = {
            let mut guard = self.write_session();
            *guard = None;
            self.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };

        let provider = self.provider.as_ref().ok_or_else(|| {
            warn!("no identity provider installed");
            ClientError::NoIdentityProvider
        })?;

        let accounts = provider.request_accounts().await.map_err(|e| match e {
            WalletError::UserRejected => ClientError::UserRejected,
            WalletError::Unavailable(msg) => ClientError::ProviderUnavailable(msg),
        })?;

        let first = accounts.first().ok_or_else(|| {
            warn!("identity provider returned no accounts");
            ClientError::NoIdentityProvider
        })?;

        let identity = Identity::parse(first).map_err(|e| {
            ClientError::ProviderUnavailable(format!("provider returned a malformed account: {}", e))
        })?;

        let gateway = LedgerGateway::new(
            Arc::clone(&self.contract),
            self.config.contract_address.clone(),
            identity.clone(),
        );
        {
            // Epoch bumps happen under this lock, so the check and the store
            // cannot be split by a concurrent bind.
            let mut guard = self.write_session();
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return Err(ClientError::SessionChanged);
            }
            *guard = Some(Session {
                identity: identity.clone(),
                gateway,
                epoch,
            });
        }

        info!(account = %identity, epoch, "connected account");
        Ok(identity)
    }

    /// The bound session, or `NotBound`
    pub fn session(&self) -> ClientResult<Session> {
        let guard = self.session.read().unwrap_or_else(|p| p.into_inner());
        guard.clone().ok_or(ClientError::NotBound)
    }

    /// The bound identity, or `NotBound`
    pub fn identity(&self) -> ClientResult<Identity> {
        self.session().map(|s| s.identity)
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Whether `session` is still the live session
    pub fn is_current(&self, session: &Session) -> bool {
        self.current_epoch() == session.epoch
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.session.write().unwrap_or_else(|p| p.into_inner())
    }
}
