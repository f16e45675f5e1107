use crate::message::TransitionKind;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Payload exceeds {limit} bytes")]
    PayloadTooLong { limit: usize },
    #[error("Expected 3 fields, found {0}")]
    FieldCount(usize),
    #[error("Invalid opcode: {0:?}")]
    InvalidOpcode(String),
    #[error("Opcode {0} does not map to any transition")]
    UnknownOpcode(u32),
    #[error("Sender name is empty")]
    EmptySender,
}

#[derive(Debug, thiserror::Error)]
pub enum RelationError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Player not in your whitelist: {sender} ({kind})")]
    UnknownSender { sender: String, kind: TransitionKind },
    #[error("Partner not found: {0}")]
    UnknownPartner(String),
    #[error("Partner already exists: {0}")]
    DuplicatePartner(String),
    #[error("No pending request from {0}")]
    NoPendingRequest(String),
    #[error("Cannot propose an empty role to {0}")]
    EmptyProposal(String),
    #[error("Invalid lock layer {layer} for {partner}")]
    InvalidLayer { partner: String, layer: usize },
    #[error("Layer {layer} for {partner} is already locked")]
    LayerAlreadyLocked { partner: String, layer: usize },

    #[error(transparent)]
    Timer(#[from] timers::TimerError),

    #[error("Relation gateway is closed")]
    GatewayClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Opcode ranges for {first} and {second} overlap")]
    OverlappingOpcodes {
        first: TransitionKind,
        second: TransitionKind,
    },
    #[error("Empty opcode range for {0}")]
    EmptyOpcodeRange(TransitionKind),
}
