//! Persistence collaborator contract.
//!
//! The pipeline does not implement storage. It requires three things of the
//! persistence layer: transaction primitives, a flush, and a way to
//! enumerate staged mutations (with their state) before that flush so the
//! auditing hook can stamp them. Any storage engine that can report
//! added/modified/unchanged/deleted sets satisfies this contract.

use crate::audit::Auditable;
use serde::{Deserialize, Serialize};
use trellis_core::{AppResult, BoxFuture};

/// The lifecycle state of an entity staged for the next flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Newly created, not yet persisted.
    Added,
    /// Persisted previously, changed in this unit of work.
    Modified,
    /// Tracked but untouched.
    Unchanged,
    /// Scheduled for removal.
    Deleted,
}

/// Transaction and flush primitives exposed by the persistence layer.
///
/// The transaction stage drives this trait with a strict two-outcome
/// discipline: every `begin` is followed by exactly one `commit` or
/// `rollback` on every exit path, including panics and cancellation.
pub trait TransactionalStore: Send + Sync + 'static {
    /// Opens a transaction.
    fn begin<'a>(&'a self) -> BoxFuture<'a, AppResult<()>>;

    /// Commits the open transaction, making all flushed changes visible.
    fn commit<'a>(&'a self) -> BoxFuture<'a, AppResult<()>>;

    /// Rolls the open transaction back, discarding all staged changes.
    fn rollback<'a>(&'a self) -> BoxFuture<'a, AppResult<()>>;

    /// Writes all staged changes to storage (still subject to commit).
    fn flush<'a>(&'a self) -> BoxFuture<'a, AppResult<()>>;

    /// Visits every auditable entity staged for the next flush, with its
    /// state.
    ///
    /// Called by the auditing hook immediately before `flush`. Entities
    /// without the auditable capability need not be reported; the hook would
    /// skip them anyway.
    fn scan_pending(&self, visit: &mut dyn FnMut(EntityState, &mut dyn Auditable));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&EntityState::Added).unwrap(), "\"added\"");
        assert_eq!(
            serde_json::to_string(&EntityState::Modified).unwrap(),
            "\"modified\""
        );
    }
}
