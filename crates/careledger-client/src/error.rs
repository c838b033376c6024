//! Error types shared by every component of the client.

use careledger_validation::ValidationResult;
use thiserror::Error;

use crate::workflow::WorkflowState;

/// Errors surfaced by session binding, the ledger gateway, the authorization
/// gate and the record workflows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientError {
    /// No wallet-style identity provider is present, or it exposes no account.
    #[error("no identity provider is available")]
    NoIdentityProvider,

    /// The user declined the identity request or a signing prompt.
    #[error("request rejected by the user")]
    UserRejected,

    /// The identity provider failed during the handshake.
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Network or provider failure while talking to the ledger.
    #[error("ledger gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Policy denial for the bound identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Local precondition failure; never reaches the gateway.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The ledger reverted the call.
    #[error("rejected by ledger: {0}")]
    RejectedByLedger(String),

    /// The ledger answered with a payload that does not decode.
    #[error("malformed ledger response for {method}: {message}")]
    MalformedResponse {
        /// Contract method that was called.
        method: &'static str,
        /// Decoder message.
        message: String,
    },

    /// No identity is bound to the session.
    #[error("no identity is bound to this session")]
    NotBound,

    /// The identity was rebound while the workflow was running.
    #[error("session identity changed during the workflow")]
    SessionChanged,

    /// A state-changing workflow is already in flight for this session.
    #[error("another state-changing call is already in flight")]
    WriteInFlight,

    /// A call was attributed to an identity other than the bound one.
    #[error("caller {caller} does not match the bound identity {bound}")]
    CallerMismatch {
        /// Caller passed to the gateway.
        caller: String,
        /// Identity the gateway handle was bound to.
        bound: String,
    },
}

/// Result alias used throughout the client.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Errors that abort session bootstrap.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::NoIdentityProvider | ClientError::UserRejected | ClientError::NotBound
        )
    }

    /// Errors caused by transport conditions rather than policy or input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::GatewayUnavailable(_)
                | ClientError::ProviderUnavailable(_)
                | ClientError::WriteInFlight
        )
    }

    /// Terminal workflow state a workflow ends in when it fails with `self`.
    pub fn terminal_state(&self) -> WorkflowState {
        match self {
            ClientError::Unauthorized(_) | ClientError::WriteInFlight => WorkflowState::Rejected,
            _ => WorkflowState::Failed,
        }
    }

    /// Message suitable for showing to the person at the keyboard.
    pub fn notice(&self) -> String {
        match self {
            ClientError::NoIdentityProvider => {
                "No wallet is installed. Install an identity provider to continue.".to_string()
            }
            ClientError::UserRejected => "The request was cancelled in your wallet.".to_string(),
            ClientError::Unauthorized(reason) => reason.clone(),
            ClientError::InvalidInput(reason) => format!("Please check the form: {}", reason),
            ClientError::GatewayUnavailable(_) => {
                "The ledger is unreachable right now. Please try again.".to_string()
            }
            ClientError::ProviderUnavailable(_) => {
                "The identity provider is not responding. Please try again.".to_string()
            }
            ClientError::SessionChanged => {
                "The connected account changed. Please retry with the current account.".to_string()
            }
            ClientError::WriteInFlight => {
                "Please wait for the previous submission to finish.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<ValidationResult> for ClientError {
    fn from(result: ValidationResult) -> Self {
        ClientError::InvalidInput(result.to_string())
    }
}
