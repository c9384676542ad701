//! The identity block: id plus creation, update and deletion timestamps.

use super::{ModelId, Timestamp};
use serde::{Deserialize, Serialize};

/// Durable per-record metadata.
///
/// `id` is fixed at embedding time. `created_at` stays zero until the first
/// successful save and never changes afterwards; `updated_at` moves on every
/// save. `deleted_at` is carried through encode and decode but nothing in
/// this crate sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: ModelId,
    created_at: Timestamp,
    updated_at: Timestamp,
    deleted_at: Timestamp,
}

/// A snapshot of the three timestamps, taken before a save mutates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamps {
    /// First successful save.
    pub created_at: Timestamp,
    /// Latest successful save.
    pub updated_at: Timestamp,
    /// Reserved for soft deletion.
    pub deleted_at: Timestamp,
}

impl Identity {
    /// Creates an identity with a fresh random id and zero timestamps.
    #[must_use]
    pub fn fresh() -> Self {
        Self::with_id(ModelId::new())
    }

    pub(crate) fn with_id(id: ModelId) -> Self {
        Self {
            id,
            created_at: Timestamp::ZERO,
            updated_at: Timestamp::ZERO,
            deleted_at: Timestamp::ZERO,
        }
    }

    /// Returns the record id.
    #[must_use]
    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Returns when the record was first saved.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns when the record was last saved.
    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Returns the deletion mark.
    #[must_use]
    pub fn deleted_at(&self) -> Timestamp {
        self.deleted_at
    }

    /// Returns whether the record has been durably written at least once.
    #[must_use]
    pub fn exists(&self) -> bool {
        !self.created_at.is_zero()
    }

    /// Copies out the timestamps.
    #[must_use]
    pub fn timestamps(&self) -> Timestamps {
        Timestamps {
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }

    /// Puts back a snapshot taken with [`Identity::timestamps`].
    pub(crate) fn restore(&mut self, snapshot: Timestamps) {
        self.created_at = snapshot.created_at;
        self.updated_at = snapshot.updated_at;
        self.deleted_at = snapshot.deleted_at;
    }

    /// Stamps a save: moves `updated_at` forward and, on the first save,
    /// sets `created_at` to the same instant.
    pub(crate) fn touch(&mut self) {
        self.updated_at = Timestamp::now_after(self.updated_at);
        if !self.exists() {
            self.created_at = self.updated_at;
        }
    }
}
