//! Wire codec for relationship messages carried in the chat log.
//!
//! A relationship message is a single chat line holding a `|`-separated
//! 3-tuple, optionally prefixed by the configured tag:
//!
//! ```text
//! [rolebond] 14|Kaede Ito|Mistress
//!            ^^ ^^^^^^^^^ ^^^^^^^^
//!            |  |         dynamic lean (free text, unknown => None)
//!            |  sender display name
//!            opcode, classified through the OpcodeTable
//! ```
//!
//! The opcode space is split into four transition classes:
//!  - [`TransitionKind::Request`]: the sender proposes a role to you
//!  - [`TransitionKind::Accept`]: the sender accepted a role you proposed
//!  - [`TransitionKind::Decline`]: the sender declined a role you proposed
//!  - [`TransitionKind::Remove`]: the sender ended the relationship
//!
//! Input is untrusted: every check happens here, before any state is touched.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::{config::OpcodeTable, config::ProtocolConfig, error::DecodeError, lean::RoleLean};

const FIELD_SEPARATOR: char = '|';

/// The four transition classes an opcode can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    Request,
    Accept,
    Decline,
    Remove,
}

impl Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            TransitionKind::Request => "Request",
            TransitionKind::Accept => "Accept",
            TransitionKind::Decline => "Decline",
            TransitionKind::Remove => "Remove",
        };
        write!(f, "{kind}")
    }
}

/// A decoded relationship message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub opcode: u32,
    pub kind: TransitionKind,
    pub sender_name: String,
    pub dynamic_lean: String,
}

impl DecodedMessage {
    /// The lean argument, with unrecognized text mapped to [`RoleLean::None`].
    pub fn lean(&self) -> RoleLean {
        RoleLean::from_lean_str(&self.dynamic_lean)
    }
}

/// Encoder/decoder bound to one opcode table.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    opcodes: OpcodeTable,
    tag: String,
    max_payload_len: usize,
}

impl MessageCodec {
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            opcodes: config.opcodes.clone(),
            tag: config.tag.clone(),
            max_payload_len: config.max_payload_len,
        }
    }

    /// Whether a chat line carries the protocol tag.
    pub fn is_tagged(&self, line: &str) -> bool {
        line.trim_start().starts_with(&self.tag)
    }

    pub fn decode(&self, payload: &str) -> Result<DecodedMessage, DecodeError> {
        if payload.len() > self.max_payload_len {
            return Err(DecodeError::PayloadTooLong {
                limit: self.max_payload_len,
            });
        }

        let body = payload.trim();
        let body = body.strip_prefix(self.tag.as_str()).unwrap_or(body);

        let fields: Vec<&str> = body.split(FIELD_SEPARATOR).map(str::trim).collect();
        let [opcode, sender, lean] = fields.as_slice() else {
            return Err(DecodeError::FieldCount(fields.len()));
        };

        let opcode: u32 = opcode
            .parse()
            .map_err(|_| DecodeError::InvalidOpcode(opcode.to_string()))?;
        let kind = self
            .opcodes
            .classify(opcode)
            .ok_or(DecodeError::UnknownOpcode(opcode))?;

        if sender.is_empty() {
            return Err(DecodeError::EmptySender);
        }

        Ok(DecodedMessage {
            opcode,
            kind,
            sender_name: sender.to_string(),
            dynamic_lean: lean.to_string(),
        })
    }

    /// Build the chat line for an outbound message sent by `sender`.
    pub fn encode(&self, kind: TransitionKind, sender: &str, lean: RoleLean) -> String {
        let lean = if lean.is_none() {
            String::new()
        } else {
            lean.to_string()
        };
        format!(
            "{} {}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
            self.tag,
            self.opcodes.opcode_for(kind),
            sender.trim(),
            lean
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> MessageCodec {
        MessageCodec::new(&ProtocolConfig::default())
    }

    #[test]
    fn test_decode_tagged_and_untagged() {
        let codec = codec();

        let msg = codec
            .decode("[rolebond] 14|Kaede Ito|Mistress")
            .expect("valid payload");
        assert_eq!(msg.opcode, 14);
        assert_eq!(msg.kind, TransitionKind::Accept);
        assert_eq!(msg.sender_name, "Kaede Ito");
        assert_eq!(msg.lean(), RoleLean::Mistress);

        let msg = codec.decode(" 11 | Mira Vale | pet ").expect("valid payload");
        assert_eq!(msg.kind, TransitionKind::Request);
        assert_eq!(msg.sender_name, "Mira Vale");
        assert_eq!(msg.lean(), RoleLean::Pet);
    }

    #[test]
    fn test_decode_unknown_lean_is_none() {
        let msg = codec().decode("18|Kaede Ito|").expect("valid payload");
        assert_eq!(msg.kind, TransitionKind::Remove);
        assert_eq!(msg.lean(), RoleLean::None);

        let msg = codec().decode("12|Kaede Ito|Empress").expect("valid payload");
        assert_eq!(msg.lean(), RoleLean::None);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let codec = codec();
        assert_eq!(codec.decode("14|Kaede Ito"), Err(DecodeError::FieldCount(2)));
        assert_eq!(
            codec.decode("14|Kaede|Owner|extra"),
            Err(DecodeError::FieldCount(4))
        );
        assert_eq!(
            codec.decode("x14|Kaede Ito|Owner"),
            Err(DecodeError::InvalidOpcode("x14".to_string()))
        );
        assert_eq!(
            codec.decode("-1|Kaede Ito|Owner"),
            Err(DecodeError::InvalidOpcode("-1".to_string()))
        );
        assert_eq!(
            codec.decode("99|Kaede Ito|Owner"),
            Err(DecodeError::UnknownOpcode(99))
        );
        assert_eq!(codec.decode("14| |Owner"), Err(DecodeError::EmptySender));
        assert_eq!(codec.decode("hello there"), Err(DecodeError::FieldCount(1)));
    }

    #[test]
    fn test_decode_rejects_oversized_payload() {
        let payload = format!("14|{}|Owner", "a".repeat(600));
        assert_eq!(
            codec().decode(&payload),
            Err(DecodeError::PayloadTooLong { limit: 500 })
        );
    }

    #[test]
    fn test_encode_uses_first_opcode_of_class() {
        let codec = codec();
        let line = codec.encode(TransitionKind::Accept, "Kaede Ito", RoleLean::AbsoluteSlave);
        assert_eq!(line, "[rolebond] 14|Kaede Ito|Absolute-Slave");
        assert!(codec.is_tagged(&line));

        let decoded = codec.decode(&line).expect("encoded line decodes");
        assert_eq!(decoded.kind, TransitionKind::Accept);
        assert_eq!(decoded.lean(), RoleLean::AbsoluteSlave);

        let line = codec.encode(TransitionKind::Remove, "Kaede Ito", RoleLean::None);
        assert_eq!(line, "[rolebond] 18|Kaede Ito|");
    }
}
