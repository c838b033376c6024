//! Workflow state machine
//!
//! Each record workflow runs `Idle → Checking → {Executing → Done} | Rejected | Failed`.
//! Input that fails local validation ends the workflow before the check
//! (`Idle → Failed`), and a write refused by the in-flight guard ends it
//! immediately as `Idle → Rejected`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClientResult;

/// The three user-facing workflows.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkflowKind {
    FetchRecords,
    AddRecord,
    AuthorizeProvider,
}

impl WorkflowKind {
    /// Whether the workflow issues a state-changing ledger call.
    pub fn is_write(self) -> bool {
        !matches!(self, WorkflowKind::FetchRecords)
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowKind::FetchRecords => write!(f, "fetch_records"),
            WorkflowKind::AddRecord => write!(f, "add_record"),
            WorkflowKind::AuthorizeProvider => write!(f, "authorize_provider"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkflowState {
    #[default]
    Idle,
    Checking,
    Executing,
    Done,
    Rejected,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowState::Done | WorkflowState::Rejected | WorkflowState::Failed
        )
    }

    pub fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Idle, Checking)
                | (Idle, Rejected)
                | (Idle, Failed)
                | (Checking, Executing)
                | (Checking, Rejected)
                | (Checking, Failed)
                | (Executing, Done)
                | (Executing, Failed)
        )
    }
}

/// A single workflow invocation's progress.
#[derive(Debug)]
pub(crate) struct Workflow {
    kind: WorkflowKind,
    state: WorkflowState,
}

impl Workflow {
    pub(crate) fn start(kind: WorkflowKind) -> Self {
        debug!(workflow = %kind, write = kind.is_write(), "workflow started");
        Self {
            kind,
            state: WorkflowState::Idle,
        }
    }

    pub(crate) fn kind(&self) -> WorkflowKind {
        self.kind
    }

    pub(crate) fn state(&self) -> WorkflowState {
        self.state
    }

    /// Move to `next`. Illegal edges are a programming error in this crate.
    pub(crate) fn advance(&mut self, next: WorkflowState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal {} transition {:?} -> {:?}",
            self.kind,
            self.state,
            next
        );
        debug!(workflow = %self.kind, from = ?self.state, to = ?next, "workflow transition");
        self.state = next;
    }

    /// Settle the workflow from its result: `Done` on success, otherwise the
    /// error's terminal state.
    pub(crate) fn finish<T>(&mut self, result: ClientResult<T>) -> ClientResult<T> {
        let next = match &result {
            Ok(_) => WorkflowState::Done,
            Err(err) => err.terminal_state(),
        };
        if !self.state.is_terminal() {
            self.advance(next);
        }
        result
    }
}
