//! Authorization Gate
//!
//! Decides whether the bound identity may proceed, before any write and
//! before any record fetch. The ledger exposes two independent predicates,
//! `getOwner` and `getAuthorization`, and the gate keeps them independent:
//! being owner grants the owner-only action, it does not imply being an
//! authorized provider on the ledger.
//!
//! Outcomes are cached per identity and session epoch. The cache is emptied
//! whenever an authorize-provider call is issued, since that call may have
//! flipped any identity's bit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::identity::{Identity, IdentityBinder, Session};

/// Message shown when a non-provider tries a record workflow
pub const NOT_AUTHORIZED_PROVIDER: &str = "You are not an authorized provider!";

/// Message shown when a non-owner tries to authorize a provider
pub const OWNER_ONLY: &str = "Only the contract owner can authorize providers.";

/// Derived permission classification for the bound identity
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    Owner,
    AuthorizedProvider,
    Unauthorized,
}

impl Role {
    /// Whether the role may fetch and append patient records
    pub fn can_manage_records(self) -> bool {
        matches!(self, Role::Owner | Role::AuthorizedProvider)
    }

    pub fn is_owner(self) -> bool {
        self == Role::Owner
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Owner => write!(f, "Owner"),
            Role::AuthorizedProvider => write!(f, "AuthorizedProvider"),
            Role::Unauthorized => write!(f, "Unauthorized"),
        }
    }
}

/// Cached outcome of a role lookup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationCacheEntry {
    pub identity: Identity,
    pub role: Role,
    pub as_of_session_epoch: u64,
}

#[derive(Debug, Default)]
struct AuthorizationCache {
    entries: HashMap<Identity, AuthorizationCacheEntry>,
    /// Bumped by every invalidation; lookups started under an older
    /// generation are not written back.
    generation: u64,
}

pub struct AuthorizationGate {
    binder: Arc<IdentityBinder>,
    cache: Mutex<AuthorizationCache>,
}

impl AuthorizationGate {
    pub fn new(binder: Arc<IdentityBinder>) -> Self {
        Self {
            binder,
            cache: Mutex::new(AuthorizationCache::default()),
        }
    }

    /// Role of the bound identity, failing with `Unauthorized` when it has none.
    pub async fn ensure_authorized(&self) -> ClientResult<Role> {
        let session = self.binder.session()?;
        self.ensure_authorized_for(&session).await
    }

    pub async fn ensure_authorized_for(&self, session: &Session) -> ClientResult<Role> {
        let role = self.resolve_role_for(session).await?;
        if !role.can_manage_records() {
            warn!(account = %session.identity(), "identity is not an authorized provider");
            return Err(ClientError::Unauthorized(NOT_AUTHORIZED_PROVIDER.to_string()));
        }
        Ok(role)
    }

    pub async fn ensure_owner(&self) -> ClientResult<()> {
        let session = self.binder.session()?;
        self.ensure_owner_for(&session).await
    }

    /// Require exactly `Owner` for the bound identity.
    pub async fn ensure_owner_for(&self, session: &Session) -> ClientResult<()> {
        match self.resolve_role_for(session).await? {
            Role::Owner => Ok(()),
            role => {
                warn!(account = %session.identity(), %role, "owner-only action refused");
                Err(ClientError::Unauthorized(OWNER_ONLY.to_string()))
            }
        }
    }

    /// Role of the bound identity, including `Unauthorized`.
    pub async fn resolve_role(&self) -> ClientResult<Role> {
        let session = self.binder.session()?;
        self.resolve_role_for(&session).await
    }

    pub async fn resolve_role_for(&self, session: &Session) -> ClientResult<Role> {
        let identity = session.identity();

        let generation = {
            let cache = self.lock();
            if let Some(entry) = cache.entries.get(identity) {
                if entry.as_of_session_epoch == session.epoch() {
                    debug!(account = %identity.short(), role = %entry.role, "role cache hit");
                    return Ok(entry.role);
                }
            }
            cache.generation
        };

        let gateway = session.gateway();
        let owner = gateway.get_owner().await?;
        let role = if &owner == identity {
            Role::Owner
        } else if gateway.get_authorization(identity).await? {
            Role::AuthorizedProvider
        } else {
            Role::Unauthorized
        };

        let mut cache = self.lock();
        if cache.generation == generation && self.binder.is_current(session) {
            cache.entries.insert(
                identity.clone(),
                AuthorizationCacheEntry {
                    identity: identity.clone(),
                    role,
                    as_of_session_epoch: session.epoch(),
                },
            );
        }
        debug!(account = %identity.short(), %role, "role resolved");
        Ok(role)
    }

    /// Drop every cached entry for every identity.
    pub fn invalidate_all(&self) {
        let mut cache = self.lock();
        cache.entries.clear();
        cache.generation += 1;
        debug!(generation = cache.generation, "authorization cache invalidated");
    }

    /// Cached entry for `identity`, if any (regardless of epoch)
    pub fn cached_entry(&self, identity: &Identity) -> Option<AuthorizationCacheEntry> {
        self.lock().entries.get(identity).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, AuthorizationCache> {
        self.cache.lock().unwrap_or_else(|p| p.into_inner())
    }
}
