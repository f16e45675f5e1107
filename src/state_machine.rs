//! Per-partner relationship state machine.
//!
//! Each partner record carries two independent directional statuses and two
//! independent pending-request slots. Inbound transitions are driven by
//! decoded messages; local transitions are driven by the user answering or
//! making proposals.
//!
//! # Inbound transitions
//!
//! ```text
//! Request(L)  pending_request_from_player := L
//! Accept(L)   your_status_to_them := L, pending_request_from_you := None,
//!             commitment stamped when both statuses are set and the
//!             change is not a tier adjustment
//! Decline     pending_request_from_you := None
//! Remove      every status and pending slot := None, commitment cleared
//! ```
//!
//! # Local transitions
//!
//! ```text
//! propose(L)        pending_request_from_you := L
//! accept_pending    their_status_to_you := pending_request_from_player,
//!                   pending_request_from_player := None, commitment rule as above
//! decline_pending   pending_request_from_player := None
//! end_relationship  same as Remove
//! ```

use chrono::{DateTime, Utc};
use log::info;

use crate::directory::{PartnerDirectory, PartnerIndex, Whitelist};
use crate::error::RelationError;
use crate::guard::prevent_timer_restart;
use crate::lean::RoleLean;
use crate::record::{LayerLock, PartnerRecord, LOCK_LAYERS};

/// Result of an accept transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptOutcome {
    pub lean: RoleLean,
    /// The commitment timestamp was (re)set by this transition.
    pub commitment_started: Option<DateTime<Utc>>,
}

/// The directory of known partners together with their records.
#[derive(Debug, Clone, Default)]
pub struct RelationBook {
    directory: Whitelist,
    records: Vec<PartnerRecord>,
}

impl RelationBook {
    /// Create a book with one empty record per whitelisted partner.
    pub fn new(directory: Whitelist) -> Self {
        let records = directory
            .names()
            .iter()
            .map(|name| PartnerRecord::new(name.clone()))
            .collect();
        Self { directory, records }
    }

    pub fn add_partner(&mut self, display_name: &str) -> Result<PartnerIndex, RelationError> {
        let idx = self.directory.add(display_name)?;
        self.records.push(PartnerRecord::new(display_name.trim()));
        Ok(idx)
    }

    pub fn resolve(&self, display_name: &str) -> Option<PartnerIndex> {
        self.directory.resolve(display_name)
    }

    /// Resolve a partner for a local operation, failing when unknown.
    pub fn require(&self, display_name: &str) -> Result<PartnerIndex, RelationError> {
        self.resolve(display_name)
            .ok_or_else(|| RelationError::UnknownPartner(display_name.to_string()))
    }

    pub fn record(&self, idx: PartnerIndex) -> Option<&PartnerRecord> {
        self.records.get(idx)
    }

    pub fn record_by_name(&self, display_name: &str) -> Option<&PartnerRecord> {
        self.resolve(display_name).and_then(|idx| self.record(idx))
    }

    pub fn records(&self) -> &[PartnerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn record_mut(&mut self, idx: PartnerIndex) -> Result<&mut PartnerRecord, RelationError> {
        self.records
            .get_mut(idx)
            .ok_or_else(|| RelationError::UnknownPartner(format!("#{idx}")))
    }

    // ─────────────────────────── Inbound ───────────────────────────

    /// The partner proposed `lean` to you.
    ///
    /// ## State Transition:
    /// pending_request_from_player := lean (overwrites any earlier proposal)
    pub fn receive_request(
        &mut self,
        idx: PartnerIndex,
        lean: RoleLean,
    ) -> Result<(), RelationError> {
        let record = self.record_mut(idx)?;
        record.pending_request_from_player = lean;
        info!("[receive_request] {} proposed {lean}", record.name);
        Ok(())
    }

    /// The partner accepted the role you proposed.
    ///
    /// ## State Transition:
    /// your_status_to_them := lean, pending_request_from_you := None.
    /// The commitment timestamp is set to `now` when both directional statuses
    /// are set afterwards and the change is not a same-category tier adjustment.
    pub fn receive_accept(
        &mut self,
        idx: PartnerIndex,
        lean: RoleLean,
        now: DateTime<Utc>,
    ) -> Result<AcceptOutcome, RelationError> {
        let record = self.record_mut(idx)?;
        let prevent_restart = prevent_timer_restart(lean, record.their_status_to_you);

        record.your_status_to_them = lean;
        record.pending_request_from_you = RoleLean::None;

        let commitment_started = stamp_commitment(record, prevent_restart, now);
        info!(
            "[receive_accept] {} accepted, you are now their {lean} (tier adjustment: {prevent_restart})",
            record.name
        );
        Ok(AcceptOutcome {
            lean,
            commitment_started,
        })
    }

    /// The partner declined the role you proposed.
    ///
    /// ## State Transition:
    /// pending_request_from_you := None
    pub fn receive_decline(&mut self, idx: PartnerIndex) -> Result<(), RelationError> {
        let record = self.record_mut(idx)?;
        record.pending_request_from_you = RoleLean::None;
        info!("[receive_decline] {} declined your request", record.name);
        Ok(())
    }

    /// Either party ended the relationship.
    ///
    /// ## State Transition:
    /// all statuses and pending slots := None, commitment cleared
    pub fn remove_relation(&mut self, idx: PartnerIndex) -> Result<(), RelationError> {
        let record = self.record_mut(idx)?;
        record.clear_relation();
        info!("[remove_relation] Relation with {} removed", record.name);
        Ok(())
    }

    // ─────────────────────────── Local ───────────────────────────

    /// Propose holding `lean` toward the partner.
    pub fn propose(&mut self, idx: PartnerIndex, lean: RoleLean) -> Result<(), RelationError> {
        let record = self.record_mut(idx)?;
        if lean.is_none() {
            return Err(RelationError::EmptyProposal(record.name.clone()));
        }
        record.pending_request_from_you = lean;
        info!("[propose] Proposed {lean} to {}", record.name);
        Ok(())
    }

    /// Accept the role the partner proposed to you.
    ///
    /// ## Preconditions:
    /// - pending_request_from_player is set
    ///
    /// ## State Transition:
    /// their_status_to_you := pending_request_from_player, pending cleared,
    /// commitment rule as for [`RelationBook::receive_accept`] with the
    /// directions swapped.
    pub fn accept_pending(
        &mut self,
        idx: PartnerIndex,
        now: DateTime<Utc>,
    ) -> Result<AcceptOutcome, RelationError> {
        let record = self.record_mut(idx)?;
        let lean = record.pending_request_from_player;
        if lean.is_none() {
            return Err(RelationError::NoPendingRequest(record.name.clone()));
        }
        let prevent_restart = prevent_timer_restart(lean, record.your_status_to_them);

        record.their_status_to_you = lean;
        record.pending_request_from_player = RoleLean::None;

        let commitment_started = stamp_commitment(record, prevent_restart, now);
        info!("[accept_pending] {} is now your {lean}", record.name);
        Ok(AcceptOutcome {
            lean,
            commitment_started,
        })
    }

    /// Decline the role the partner proposed to you, returning it.
    pub fn decline_pending(&mut self, idx: PartnerIndex) -> Result<RoleLean, RelationError> {
        let record = self.record_mut(idx)?;
        let lean = record.pending_request_from_player;
        if lean.is_none() {
            return Err(RelationError::NoPendingRequest(record.name.clone()));
        }
        record.pending_request_from_player = RoleLean::None;
        info!("[decline_pending] Declined {lean} from {}", record.name);
        Ok(lean)
    }

    // ─────────────────────────── Locks ───────────────────────────

    /// Check that `layer` exists and is free for the partner.
    pub fn check_layer_free(&self, idx: PartnerIndex, layer: usize) -> Result<(), RelationError> {
        let record = self
            .record(idx)
            .ok_or_else(|| RelationError::UnknownPartner(format!("#{idx}")))?;
        if layer >= LOCK_LAYERS {
            return Err(RelationError::InvalidLayer {
                partner: record.name.clone(),
                layer,
            });
        }
        if record.is_layer_locked(layer) {
            return Err(RelationError::LayerAlreadyLocked {
                partner: record.name.clone(),
                layer,
            });
        }
        Ok(())
    }

    pub fn engage_lock(
        &mut self,
        idx: PartnerIndex,
        layer: usize,
        lock: LayerLock,
    ) -> Result<(), RelationError> {
        self.check_layer_free(idx, layer)?;
        let record = self.record_mut(idx)?;
        record.locks[layer] = Some(lock);
        Ok(())
    }

    /// Release a layer lock, returning whether it was held.
    pub fn release_lock(&mut self, idx: PartnerIndex, layer: usize) -> bool {
        self.records
            .get_mut(idx)
            .and_then(|record| record.locks.get_mut(layer))
            .and_then(Option::take)
            .is_some()
    }
}

fn stamp_commitment(
    record: &mut PartnerRecord,
    prevent_restart: bool,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if record.is_committed() && !prevent_restart {
        record.commitment_established_at = Some(now);
        Some(now)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> RelationBook {
        RelationBook::new(Whitelist::from_names(["Kaede Ito", "Mira Vale"]).unwrap())
    }

    #[test]
    fn test_book_creation() {
        let book = book();
        assert_eq!(book.len(), 2);
        assert_eq!(book.record(1).unwrap().name, "Mira Vale");
        assert_eq!(book.resolve("Kaede Ito"), Some(0));
        assert!(book.record_by_name("Nobody").is_none());
    }

    #[test]
    fn test_add_partner_extends_records() {
        let mut book = book();
        let idx = book.add_partner("Rin Sol").unwrap();
        assert_eq!(idx, 2);
        assert_eq!(book.record(idx).unwrap().name, "Rin Sol");
        assert!(matches!(
            book.add_partner("Rin Sol"),
            Err(RelationError::DuplicatePartner(_))
        ));
        assert_eq!(book.len(), 3);
    }

    #[test]
    fn test_new_proposal_overwrites_pending() {
        let mut book = book();
        book.receive_request(0, RoleLean::Owner).unwrap();
        book.receive_request(0, RoleLean::Pet).unwrap();
        assert_eq!(book.record(0).unwrap().pending_request_from_player, RoleLean::Pet);
    }

    #[test]
    fn test_accept_into_fresh_commitment() {
        let mut book = book();
        let now = Utc::now();
        book.records[0].their_status_to_you = RoleLean::Pet;
        book.propose(0, RoleLean::Owner).unwrap();

        let outcome = book.receive_accept(0, RoleLean::Owner, now).unwrap();
        assert_eq!(outcome.commitment_started, Some(now));

        let record = book.record(0).unwrap();
        assert_eq!(record.your_status_to_them, RoleLean::Owner);
        assert_eq!(record.pending_request_from_you, RoleLean::None);
        assert_eq!(record.commitment_established_at, Some(now));
    }

    #[test]
    fn test_accept_with_none_lean_never_stamps() {
        let mut book = book();
        book.records[0].their_status_to_you = RoleLean::Master;

        let outcome = book.receive_accept(0, RoleLean::None, Utc::now()).unwrap();
        assert_eq!(outcome.commitment_started, None);
        assert!(book.record(0).unwrap().commitment_established_at.is_none());
    }

    #[test]
    fn test_local_accept_pending_round_trip() {
        let mut book = book();
        let now = Utc::now();
        book.records[1].your_status_to_them = RoleLean::Submissive;
        book.receive_request(1, RoleLean::Mistress).unwrap();

        let outcome = book.accept_pending(1, now).unwrap();
        assert_eq!(outcome.lean, RoleLean::Mistress);
        assert_eq!(outcome.commitment_started, Some(now));

        let record = book.record(1).unwrap();
        assert_eq!(record.their_status_to_you, RoleLean::Mistress);
        assert_eq!(record.pending_request_from_player, RoleLean::None);

        assert!(matches!(
            book.accept_pending(1, now),
            Err(RelationError::NoPendingRequest(_))
        ));
    }

    #[test]
    fn test_decline_pending_requires_request() {
        let mut book = book();
        assert!(matches!(
            book.decline_pending(0),
            Err(RelationError::NoPendingRequest(_))
        ));
        book.receive_request(0, RoleLean::Slave).unwrap();
        assert_eq!(book.decline_pending(0).unwrap(), RoleLean::Slave);
        assert_eq!(
            book.record(0).unwrap().pending_request_from_player,
            RoleLean::None
        );
    }

    #[test]
    fn test_propose_none_rejected() {
        let mut book = book();
        assert!(matches!(
            book.propose(0, RoleLean::None),
            Err(RelationError::EmptyProposal(_))
        ));
    }

    #[test]
    fn test_lock_layers() {
        let mut book = book();
        let lock = LayerLock {
            assigner: "Kaede Ito".to_string(),
            end_time: Utc::now(),
        };

        book.engage_lock(0, 1, lock.clone()).unwrap();
        assert!(book.record(0).unwrap().is_layer_locked(1));
        assert!(matches!(
            book.engage_lock(0, 1, lock.clone()),
            Err(RelationError::LayerAlreadyLocked { layer: 1, .. })
        ));
        assert!(matches!(
            book.engage_lock(0, LOCK_LAYERS, lock),
            Err(RelationError::InvalidLayer { .. })
        ));

        assert!(book.release_lock(0, 1));
        assert!(!book.release_lock(0, 1));
        assert!(!book.release_lock(7, 0));
    }

    #[test]
    fn test_unknown_index_is_an_error() {
        let mut book = book();
        assert!(matches!(
            book.receive_decline(5),
            Err(RelationError::UnknownPartner(_))
        ));
        assert!(matches!(
            book.require("Nobody"),
            Err(RelationError::UnknownPartner(_))
        ));
    }
}
