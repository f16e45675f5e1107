//! Message dispatch: decode, resolve the sender, run the transition, notify.
//!
//! ## Inbound flow
//!
//! ```text
//! chat line ──decode──▶ DecodedMessage ──resolve──▶ PartnerIndex
//!                                                     │
//!                  RelationBook transition ◀──────────┘
//!                                │
//!                   EventBus::notify + EventBus::publish
//! ```
//!
//! A sender missing from the directory is treated differently per class:
//! an `Accept` from a stranger is reported as [`RelationError::UnknownSender`],
//! every other class is ignored without touching state.
//!
//! The local operations live here as well: they mutate the book and return the
//! chat line that has to be sent to the partner.

use chrono::Utc;
use log::{debug, error, info};

use crate::{
    config::ProtocolConfig,
    directory::PartnerIndex,
    error::RelationError,
    events::{EventBus, RelationEvent},
    lean::RoleLean,
    message::{DecodedMessage, MessageCodec, TransitionKind},
    state_machine::{AcceptOutcome, RelationBook},
};

/// What a dispatched message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The transition ran against the partner at `partner`.
    Applied {
        kind: TransitionKind,
        partner: PartnerIndex,
    },
    /// The sender is not a known partner; nothing changed.
    Ignored { kind: TransitionKind, sender: String },
}

pub struct Dispatcher {
    codec: MessageCodec,
    bus: EventBus,
    tag: String,
    /// Display name placed in the sender field of outbound lines.
    local_name: String,
}

impl Dispatcher {
    pub fn new(config: &ProtocolConfig, local_name: impl Into<String>, bus: EventBus) -> Self {
        Self {
            codec: MessageCodec::new(config),
            bus,
            tag: config.tag.clone(),
            local_name: local_name.into(),
        }
    }

    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Decode a raw chat line and dispatch it.
    pub async fn handle_payload(
        &self,
        book: &mut RelationBook,
        payload: &str,
    ) -> Result<Transition, RelationError> {
        let message = self.codec.decode(payload).inspect_err(|e| {
            debug!("[handle_payload] Dropping malformed payload: {e}");
        })?;
        self.dispatch(book, message).await
    }

    pub async fn dispatch(
        &self,
        book: &mut RelationBook,
        message: DecodedMessage,
    ) -> Result<Transition, RelationError> {
        let lean = message.lean();
        let Some(idx) = book.resolve(&message.sender_name) else {
            return match message.kind {
                TransitionKind::Accept => {
                    error!(
                        "[dispatch] Player not in your whitelist: {}",
                        message.sender_name
                    );
                    Err(RelationError::UnknownSender {
                        sender: message.sender_name,
                        kind: message.kind,
                    })
                }
                kind => {
                    debug!(
                        "[dispatch] Ignoring {kind} from unknown sender {}",
                        message.sender_name
                    );
                    Ok(Transition::Ignored {
                        kind,
                        sender: message.sender_name,
                    })
                }
            };
        };

        let name = message.sender_name.trim().to_string();
        match message.kind {
            TransitionKind::Request => {
                book.receive_request(idx, lean)?;
                self.bus
                    .notify(&format!(
                        "{} {name} has sent a request to have a {lean} relationship dynamic with you.",
                        self.tag
                    ))
                    .await;
                self.bus
                    .publish(&RelationEvent::RequestReceived {
                        partner: name,
                        lean,
                    })
                    .await;
            }
            TransitionKind::Accept => {
                let outcome = book.receive_accept(idx, lean, Utc::now())?;
                self.bus
                    .notify(&format!(
                        "{} You are now {name}'s {lean}. Enjoy~.",
                        self.tag
                    ))
                    .await;
                self.publish_accept(book, idx, name, outcome).await;
            }
            TransitionKind::Decline => {
                book.receive_decline(idx)?;
                self.bus
                    .notify(&format!("{} {name} has declined your request.", self.tag))
                    .await;
                self.bus
                    .publish(&RelationEvent::ProposalDeclined { partner: name })
                    .await;
            }
            TransitionKind::Remove => {
                book.remove_relation(idx)?;
                self.notify_removed(name).await;
            }
        }

        info!("[dispatch] Applied {} from {}", message.kind, message.sender_name);
        Ok(Transition::Applied {
            kind: message.kind,
            partner: idx,
        })
    }

    // ─────────────────────────── Local operations ───────────────────────────

    /// Propose holding `lean` toward `partner`. Returns the outbound line.
    pub async fn propose(
        &self,
        book: &mut RelationBook,
        partner: &str,
        lean: RoleLean,
    ) -> Result<String, RelationError> {
        let idx = book.require(partner)?;
        book.propose(idx, lean)?;
        self.bus
            .notify(&format!(
                "{} Sent a request to {} to become their {lean}.",
                self.tag,
                partner.trim()
            ))
            .await;
        Ok(self.outbound(TransitionKind::Request, lean))
    }

    /// Accept the pending proposal from `partner`. Returns the outbound line.
    pub async fn accept_pending(
        &self,
        book: &mut RelationBook,
        partner: &str,
    ) -> Result<String, RelationError> {
        let idx = book.require(partner)?;
        let outcome = book.accept_pending(idx, Utc::now())?;
        let name = partner.trim().to_string();
        self.bus
            .notify(&format!(
                "{} {name} is now your {}.",
                self.tag, outcome.lean
            ))
            .await;
        self.publish_accept(book, idx, name, outcome).await;
        Ok(self.outbound(TransitionKind::Accept, outcome.lean))
    }

    /// Decline the pending proposal from `partner`. Returns the outbound line.
    pub async fn decline_pending(
        &self,
        book: &mut RelationBook,
        partner: &str,
    ) -> Result<String, RelationError> {
        let idx = book.require(partner)?;
        let lean = book.decline_pending(idx)?;
        self.bus
            .notify(&format!(
                "{} You have declined {}'s request.",
                self.tag,
                partner.trim()
            ))
            .await;
        Ok(self.outbound(TransitionKind::Decline, lean))
    }

    /// End the relationship with `partner`. Returns the outbound line.
    pub async fn end_relationship(
        &self,
        book: &mut RelationBook,
        partner: &str,
    ) -> Result<String, RelationError> {
        let idx = book.require(partner)?;
        book.remove_relation(idx)?;
        self.notify_removed(partner.trim().to_string()).await;
        Ok(self.outbound(TransitionKind::Remove, RoleLean::None))
    }

    fn outbound(&self, kind: TransitionKind, lean: RoleLean) -> String {
        self.codec.encode(kind, &self.local_name, lean)
    }

    async fn notify_removed(&self, name: String) {
        self.bus
            .notify(&format!(
                "{} Relation status with {name} successfully removed.",
                self.tag
            ))
            .await;
        self.bus
            .publish(&RelationEvent::RelationshipRemoved { partner: name })
            .await;
    }

    async fn publish_accept(
        &self,
        book: &RelationBook,
        idx: PartnerIndex,
        name: String,
        outcome: AcceptOutcome,
    ) {
        let Some(record) = book.record(idx) else {
            return;
        };
        self.bus
            .publish(&RelationEvent::ProposalAccepted {
                partner: name.clone(),
                your_status: record.your_status_to_them,
                their_status: record.their_status_to_you,
            })
            .await;
        if let Some(at) = outcome.commitment_started {
            self.bus
                .publish(&RelationEvent::CommitmentEstablished { partner: name, at })
                .await;
        }
    }
}
