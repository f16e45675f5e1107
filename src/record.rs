//! Per-partner relationship record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::lean::RoleLean;

/// Number of independently lockable layers per partner.
pub const LOCK_LAYERS: usize = 3;

/// A time-bound lock placed on one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerLock {
    /// Display name of whoever engaged the lock.
    pub assigner: String,
    pub end_time: DateTime<Utc>,
}

/// Relationship state held for one known counterpart.
///
/// The two directional statuses are independent of each other, and each
/// pending slot holds at most one proposal (a newer one overwrites).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRecord {
    pub name: String,
    /// The role you hold toward them.
    pub your_status_to_them: RoleLean,
    /// The role they hold toward you.
    pub their_status_to_you: RoleLean,
    /// A role you proposed to them, awaiting their answer.
    pub pending_request_from_you: RoleLean,
    /// A role they proposed to you, awaiting your answer.
    pub pending_request_from_player: RoleLean,
    pub commitment_established_at: Option<DateTime<Utc>>,
    pub locks: Vec<Option<LayerLock>>,
}

impl PartnerRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            your_status_to_them: RoleLean::None,
            their_status_to_you: RoleLean::None,
            pending_request_from_you: RoleLean::None,
            pending_request_from_player: RoleLean::None,
            commitment_established_at: None,
            locks: vec![None; LOCK_LAYERS],
        }
    }

    /// Both directional statuses are set.
    pub fn is_committed(&self) -> bool {
        !self.your_status_to_them.is_none() && !self.their_status_to_you.is_none()
    }

    /// How long the current commitment has lasted at `now` (zero when there is none).
    pub fn commitment_duration(&self, now: DateTime<Utc>) -> Duration {
        self.commitment_established_at
            .map(|since| now - since)
            .unwrap_or_else(Duration::zero)
    }

    /// Reset all role and pending fields and the commitment timestamp.
    pub(crate) fn clear_relation(&mut self) {
        self.your_status_to_them = RoleLean::None;
        self.their_status_to_you = RoleLean::None;
        self.pending_request_from_you = RoleLean::None;
        self.pending_request_from_player = RoleLean::None;
        self.commitment_established_at = None;
    }

    pub fn is_layer_locked(&self, layer: usize) -> bool {
        self.locks.get(layer).is_some_and(Option::is_some)
    }
}
