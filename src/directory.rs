//! Partner directory: resolving display names arriving in messages.

use std::collections::HashMap;

use crate::error::RelationError;

/// Stable index of a partner record.
pub type PartnerIndex = usize;

/// Lookup of known counterparts.
///
/// Dispatch only ever resolves names through this trait; it never adds,
/// removes or iterates entries.
pub trait PartnerDirectory: Send + Sync {
    fn resolve(&self, display_name: &str) -> Option<PartnerIndex>;
}

/// Name-keyed whitelist of partners.
///
/// Names are unique: a duplicate is rejected when it is added, so a lookup can
/// never be ambiguous.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    names: Vec<String>,
    by_name: HashMap<String, PartnerIndex>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a whitelist from names, in order. Fails on the first duplicate.
    pub fn from_names<I, S>(names: I) -> Result<Self, RelationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = Self::new();
        for name in names {
            whitelist.add(name.as_ref())?;
        }
        Ok(whitelist)
    }

    /// Add a partner and return its index.
    pub fn add(&mut self, display_name: &str) -> Result<PartnerIndex, RelationError> {
        let key = display_name.trim();
        if self.by_name.contains_key(key) {
            return Err(RelationError::DuplicatePartner(key.to_string()));
        }
        let idx = self.names.len();
        self.names.push(key.to_string());
        self.by_name.insert(key.to_string(), idx);
        Ok(idx)
    }

    pub fn name(&self, idx: PartnerIndex) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl PartnerDirectory for Whitelist {
    fn resolve(&self, display_name: &str) -> Option<PartnerIndex> {
        self.by_name.get(display_name.trim()).copied()
    }
}
