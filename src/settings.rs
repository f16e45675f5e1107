//! Persisted hardcore settings.
//!
//! The document holds one [`PartnerHardcoreConfig`] per whitelisted partner
//! (same order as the whitelist) and a folder tree of stored text entries:
//!
//! ```json
//! {
//!   "CharacterSettings": [
//!     { "LockEndTimes": ["1970-01-01T00:00:00Z", ...], "ForcedToStay": false, "ForcedToSit": false }
//!   ],
//!   "StoredEntriesFolder": { "Name": "ForcedDeclineList", "Entries": [], "Children": [] }
//! }
//! ```
//!
//! A lock end time equal to the Unix epoch means the layer is free.

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::{
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};
use timers::{BackingSlot, SharedDeadlines};

use crate::{error::SettingsError, record::LOCK_LAYERS};

pub const REQUIRED_ROOT_FOLDER: &str = "ForcedDeclineList";

fn empty_deadlines() -> SharedDeadlines {
    Arc::new(Mutex::new(vec![DateTime::<Utc>::default(); LOCK_LAYERS]))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartnerHardcoreConfig {
    #[serde(default = "empty_deadlines")]
    pub lock_end_times: SharedDeadlines,
    #[serde(default)]
    pub forced_to_stay: bool,
    #[serde(default)]
    pub forced_to_sit: bool,
}

impl Default for PartnerHardcoreConfig {
    fn default() -> Self {
        Self {
            lock_end_times: empty_deadlines(),
            forced_to_stay: false,
            forced_to_sit: false,
        }
    }
}

impl PartnerHardcoreConfig {
    /// Slot a lock timer for `layer` writes its end time into.
    pub fn backing_slot(&self, layer: usize) -> BackingSlot {
        BackingSlot::new(self.lock_end_times.clone(), layer)
    }

    pub fn lock_end_time(&self, layer: usize) -> Option<DateTime<Utc>> {
        self.deadlines().get(layer).copied()
    }

    /// Mark `layer` as free.
    pub fn clear_lock(&self, layer: usize) {
        if let Some(slot) = self.deadlines().get_mut(layer) {
            *slot = DateTime::<Utc>::default();
        }
    }

    /// Layers whose persisted end time is set, with that end time.
    pub fn stored_locks(&self) -> Vec<(usize, DateTime<Utc>)> {
        self.deadlines()
            .iter()
            .enumerate()
            .filter(|(_, end)| **end != DateTime::<Utc>::default())
            .map(|(layer, end)| (layer, *end))
            .collect()
    }

    fn normalize(&self) {
        self.deadlines()
            .resize(LOCK_LAYERS, DateTime::<Utc>::default());
    }

    fn deadlines(&self) -> std::sync::MutexGuard<'_, Vec<DateTime<Utc>>> {
        self.lock_end_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Folder of stored text entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TextFolderNode {
    pub name: String,
    #[serde(default)]
    pub entries: Vec<String>,
    #[serde(default)]
    pub children: Vec<TextFolderNode>,
}

impl TextFolderNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Give the root its required name when it has none.
    pub fn ensure_required(&mut self) {
        if self.name.trim().is_empty() {
            self.name = REQUIRED_ROOT_FOLDER.to_string();
        }
    }

    /// Drop blank entries, then every child folder left with nothing in it.
    pub fn prune_empty(&mut self) {
        self.entries.retain(|entry| !entry.trim().is_empty());
        for child in &mut self.children {
            child.prune_empty();
        }
        self.children.retain(|child| !child.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.children.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HardcoreSettings {
    #[serde(default)]
    pub character_settings: Vec<PartnerHardcoreConfig>,
    #[serde(default = "default_folder")]
    pub stored_entries_folder: TextFolderNode,
}

fn default_folder() -> TextFolderNode {
    TextFolderNode::new(REQUIRED_ROOT_FOLDER)
}

impl Default for HardcoreSettings {
    fn default() -> Self {
        Self {
            character_settings: Vec::new(),
            stored_entries_folder: default_folder(),
        }
    }
}

impl HardcoreSettings {
    /// Load settings, falling back to defaults when the file is missing or unreadable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!("[HardcoreSettings] No settings at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::try_load(path) {
            Ok(settings) => {
                info!("[HardcoreSettings] Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                error!(
                    "[HardcoreSettings] Failed to load {}: {e}. Using defaults",
                    path.display()
                );
                Self::default()
            }
        }
    }

    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        let mut settings: HardcoreSettings = serde_json::from_str(&text)?;
        settings.normalize();
        Ok(settings)
    }

    /// Write the settings as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!("[HardcoreSettings] Saved settings to {}", path.display());
        Ok(())
    }

    /// Grow the per-partner configs to at least `partners` entries.
    pub fn ensure_len(&mut self, partners: usize) {
        if self.character_settings.len() < partners {
            self.character_settings
                .resize_with(partners, PartnerHardcoreConfig::default);
        }
    }

    pub fn partner(&self, idx: usize) -> Option<&PartnerHardcoreConfig> {
        self.character_settings.get(idx)
    }

    fn normalize(&mut self) {
        for config in &self.character_settings {
            config.normalize();
        }
        self.stored_entries_folder.ensure_required();
        self.stored_entries_folder.prune_empty();
    }
}
