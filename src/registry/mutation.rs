//! Mutation state tracking
//!
//! Each mutation kind moves `Idle -> InFlight -> Succeeded | Failed`. A kind
//! that is in flight refuses a second submission until it settles.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    SetDisabled,
    SetPriority,
    ResetFailureCount,
    AddCredential,
    DeleteCredential,
    BatchImport,
    BatchDelete,
    Export,
}

impl MutationKind {
    /// Whether success discards the cached listing
    ///
    /// Export only reads, everything else can change a displayed field or
    /// pool membership.
    pub fn invalidates_listing(&self) -> bool {
        !matches!(self, MutationKind::Export)
    }

    /// Whether success can remove credentials from the pool
    pub fn changes_membership(&self) -> bool {
        matches!(
            self,
            MutationKind::DeleteCredential | MutationKind::BatchDelete
        )
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::SetDisabled => "set disabled",
            MutationKind::SetPriority => "set priority",
            MutationKind::ResetFailureCount => "reset failure count",
            MutationKind::AddCredential => "add credential",
            MutationKind::DeleteCredential => "delete credential",
            MutationKind::BatchImport => "batch import",
            MutationKind::BatchDelete => "batch delete",
            MutationKind::Export => "export",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    InFlight,
    Succeeded,
    Failed(String),
}

#[derive(Default)]
pub struct MutationTracker {
    states: Mutex<HashMap<MutationKind, MutationState>>,
}

impl MutationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, kind: MutationKind) -> MutationState {
        self.states
            .lock()
            .get(&kind)
            .cloned()
            .unwrap_or(MutationState::Idle)
    }

    /// Whether the trigger for `kind` should currently be disabled
    pub fn is_pending(&self, kind: MutationKind) -> bool {
        self.state(kind) == MutationState::InFlight
    }

    /// Move `kind` to in-flight; `None` if it already is
    pub fn begin(&self, kind: MutationKind) -> Option<MutationGuard<'_>> {
        let mut states = self.states.lock();
        if states.get(&kind) == Some(&MutationState::InFlight) {
            return None;
        }
        states.insert(kind, MutationState::InFlight);
        Some(MutationGuard {
            tracker: self,
            kind,
            settled: false,
        })
    }

    fn settle(&self, kind: MutationKind, state: MutationState) {
        self.states.lock().insert(kind, state);
    }
}

/// In-flight mutation; settles as failed if dropped unsettled
pub struct MutationGuard<'a> {
    tracker: &'a MutationTracker,
    kind: MutationKind,
    settled: bool,
}

impl MutationGuard<'_> {
    pub fn succeed(mut self) {
        self.settled = true;
        self.tracker.settle(self.kind, MutationState::Succeeded);
    }

    pub fn fail(mut self, message: impl Into<String>) {
        self.settled = true;
        self.tracker
            .settle(self.kind, MutationState::Failed(message.into()));
    }
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.settle(
                self.kind,
                MutationState::Failed("cancelled before completion".to_string()),
            );
        }
    }
}
