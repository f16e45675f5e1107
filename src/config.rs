//! Protocol configuration.
//!
//! The numeric opcode table is not fixed by the protocol itself; whoever
//! controls the transport on both ends decides it. Defaults follow the ids
//! observed in the wild (requests 11-13, accepts 14-16).

use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{error::ConfigError, message::TransitionKind};

/// Environment variable holding the path to a JSON config file.
pub const CONFIG_ENV_VAR: &str = "ROLEBOND_CONFIG";

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 500;
pub const DEFAULT_TAG: &str = "[rolebond]";
pub const DEFAULT_NOTIFICATION_HISTORY: usize = 64;

/// Inclusive range of opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcodeRange {
    pub first: u32,
    pub last: u32,
}

impl OpcodeRange {
    pub const fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    pub fn contains(&self, opcode: u32) -> bool {
        (self.first..=self.last).contains(&opcode)
    }

    fn overlaps(&self, other: &OpcodeRange) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

/// Maps opcode ranges to transition classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcodeTable {
    pub request: OpcodeRange,
    pub accept: OpcodeRange,
    pub decline: OpcodeRange,
    pub remove: OpcodeRange,
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self {
            request: OpcodeRange::new(11, 13),
            accept: OpcodeRange::new(14, 16),
            decline: OpcodeRange::new(17, 17),
            remove: OpcodeRange::new(18, 18),
        }
    }
}

impl OpcodeTable {
    fn entries(&self) -> [(TransitionKind, &OpcodeRange); 4] {
        [
            (TransitionKind::Request, &self.request),
            (TransitionKind::Accept, &self.accept),
            (TransitionKind::Decline, &self.decline),
            (TransitionKind::Remove, &self.remove),
        ]
    }

    pub fn classify(&self, opcode: u32) -> Option<TransitionKind> {
        self.entries()
            .into_iter()
            .find(|(_, range)| range.contains(opcode))
            .map(|(kind, _)| kind)
    }

    /// Opcode used when encoding an outbound message of `kind`.
    pub fn opcode_for(&self, kind: TransitionKind) -> u32 {
        match kind {
            TransitionKind::Request => self.request.first,
            TransitionKind::Accept => self.accept.first,
            TransitionKind::Decline => self.decline.first,
            TransitionKind::Remove => self.remove.first,
        }
    }

    /// Every range must be non-empty and no two ranges may overlap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let entries = self.entries();
        for (kind, range) in entries {
            if range.first > range.last {
                return Err(ConfigError::EmptyOpcodeRange(kind));
            }
        }
        for (i, (first, a)) in entries.iter().enumerate() {
            for (second, b) in entries.iter().skip(i + 1) {
                if a.overlaps(b) {
                    return Err(ConfigError::OverlappingOpcodes {
                        first: *first,
                        second: *second,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub opcodes: OpcodeTable,
    /// Tick period of lock timers.
    pub tick_interval_ms: u64,
    /// Longest chat line the decoder will look at.
    pub max_payload_len: usize,
    /// Prefix marking a chat line as a relationship message.
    pub tag: String,
    /// Notification lines kept by the notification log.
    pub notification_history: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            opcodes: OpcodeTable::default(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            tag: DEFAULT_TAG.to_string(),
            notification_history: DEFAULT_NOTIFICATION_HISTORY,
        }
    }
}

impl ProtocolConfig {
    /// Load and validate a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: ProtocolConfig = serde_json::from_str(&text)?;
        config.opcodes.validate()?;
        Ok(config)
    }

    /// Load from the file named by [`CONFIG_ENV_VAR`], falling back to defaults.
    pub fn from_env() -> Self {
        let Ok(path) = std::env::var(CONFIG_ENV_VAR) else {
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => {
                info!("[ProtocolConfig] Loaded config from {path}");
                config
            }
            Err(e) => {
                error!("[ProtocolConfig] Failed to load {path}: {e}. Using defaults");
                Self::default()
            }
        }
    }
}
