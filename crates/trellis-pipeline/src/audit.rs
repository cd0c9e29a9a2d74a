//! Auditing hook for staged entities.
//!
//! Attached to the persistence layer's pre-flush lifecycle: the transaction
//! stage invokes [`AuditStamper::stamp_pending`] immediately before every
//! flush, stamping creation/modification metadata on each staged entity that
//! declares the [`Auditable`] capability. The hook is the sole writer of
//! these fields.

use crate::store::{EntityState, TransactionalStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actor recorded when no identity is available.
///
/// Background and system-initiated writes must still succeed, so a missing
/// identity falls back to this sentinel instead of failing the flush.
pub const SYSTEM_ACTOR: &str = "System";

/// Creation/modification metadata embedded in auditable entities.
///
/// `updated_at` is monotonically non-decreasing: a stamp earlier than the
/// recorded one is clamped forward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    created_at: Option<DateTime<Utc>>,
    created_by: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl AuditStamp {
    /// Creates an empty stamp for a not-yet-persisted entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns when the entity was first persisted.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Returns who first persisted the entity.
    #[must_use]
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// Returns when the entity was last modified.
    #[must_use]
    pub const fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Returns who last modified the entity.
    #[must_use]
    pub fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }

    fn record_created(&mut self, by: &str, at: DateTime<Utc>) {
        self.created_at = Some(at);
        self.created_by = Some(by.to_string());
    }

    fn record_updated(&mut self, by: &str, at: DateTime<Utc>) {
        // Clamp forward so updated_at never decreases.
        let at = self.updated_at.map_or(at, |prev| at.max(prev));
        self.updated_at = Some(at);
        self.updated_by = Some(by.to_string());
    }
}

/// Capability for entities that track creation/modification metadata.
///
/// Entities embed an [`AuditStamp`] and expose it through this trait; the
/// provided `set_created`/`set_updated` methods are the only mutation path,
/// invoked exclusively by the auditing hook.
///
/// # Example
///
/// ```
/// use trellis_pipeline::{AuditStamp, Auditable};
///
/// struct Todo {
///     title: String,
///     audit: AuditStamp,
/// }
///
/// impl Auditable for Todo {
///     fn stamp(&self) -> &AuditStamp {
///         &self.audit
///     }
///
///     fn stamp_mut(&mut self) -> &mut AuditStamp {
///         &mut self.audit
///     }
/// }
/// ```
pub trait Auditable {
    /// Read access to the entity's audit stamp.
    fn stamp(&self) -> &AuditStamp;

    /// Write access to the entity's audit stamp.
    fn stamp_mut(&mut self) -> &mut AuditStamp;

    /// Records creation metadata. Called by the auditing hook for entities
    /// in the `Added` state.
    fn set_created(&mut self, by: &str, at: DateTime<Utc>) {
        self.stamp_mut().record_created(by, at);
    }

    /// Records modification metadata. Called by the auditing hook for
    /// entities in the `Modified` state.
    fn set_updated(&mut self, by: &str, at: DateTime<Utc>) {
        self.stamp_mut().record_updated(by, at);
    }
}

/// Stamps staged entities with audit metadata before a flush.
pub struct AuditStamper {
    clock: fn() -> DateTime<Utc>,
}

impl AuditStamper {
    /// Creates a stamper using the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self { clock: Utc::now }
    }

    /// Creates a stamper with an injected clock, for tests.
    #[must_use]
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock }
    }

    /// Walks the store's staged mutations and stamps each auditable entity.
    ///
    /// `Added` entities get creation metadata, `Modified` entities get
    /// modification metadata; unchanged and deleted entities are untouched.
    /// All entities stamped in one pass share a single timestamp.
    pub fn stamp_pending(&self, store: &dyn TransactionalStore, actor: &str) {
        let now = (self.clock)();
        store.scan_pending(&mut |state, entity| match state {
            EntityState::Added => entity.set_created(actor, now),
            EntityState::Modified => entity.set_updated(actor, now),
            EntityState::Unchanged | EntityState::Deleted => {}
        });
    }
}

impl Default for AuditStamper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Todo {
        audit: AuditStamp,
    }

    impl Auditable for Todo {
        fn stamp(&self) -> &AuditStamp {
            &self.audit
        }

        fn stamp_mut(&mut self) -> &mut AuditStamp {
            &mut self.audit
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn set_created_stamps_creation_only() {
        let mut todo = Todo {
            audit: AuditStamp::new(),
        };
        todo.set_created("u1", at(100));

        assert_eq!(todo.stamp().created_by(), Some("u1"));
        assert_eq!(todo.stamp().created_at(), Some(at(100)));
        assert!(todo.stamp().updated_at().is_none());
        assert!(todo.stamp().updated_by().is_none());
    }

    #[test]
    fn set_updated_stamps_modification() {
        let mut todo = Todo {
            audit: AuditStamp::new(),
        };
        todo.set_created("u1", at(100));
        todo.set_updated("u2", at(200));

        assert_eq!(todo.stamp().created_by(), Some("u1"));
        assert_eq!(todo.stamp().updated_by(), Some("u2"));
        assert_eq!(todo.stamp().updated_at(), Some(at(200)));
    }

    #[test]
    fn updated_at_never_decreases() {
        let mut todo = Todo {
            audit: AuditStamp::new(),
        };
        todo.set_updated("u1", at(200));
        todo.set_updated("u2", at(150));

        assert_eq!(todo.stamp().updated_at(), Some(at(200)));
        assert_eq!(todo.stamp().updated_by(), Some("u2"));
    }
}
