// ironbee_rust/src/core/var/store.rs
use crate::core::field::FieldRef;
use crate::core::util::NameKey;
use crate::core::var::config::VarConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-transaction value container.
///
/// Two views over the same fields: a case-insensitive name hash and a
/// dense array sized to the config's index space. For every indexed
/// source assigned through this store both views hold the same handle;
/// mutation goes through both. Unindexed sources live in the hash only.
pub struct VarStore {
    config: Arc<VarConfig>,
    hash: HashMap<NameKey, FieldRef>,
    array: Vec<Option<FieldRef>>,
}

impl VarStore {
    /// Build a store from a config, freezing the config's schema.
    pub fn new(config: &Arc<VarConfig>) -> Self {
        config.mark_frozen();
        let slots = config.next_index();
        Self {
            config: Arc::clone(config),
            hash: HashMap::new(),
            array: vec![None; slots],
        }
    }

    pub fn config(&self) -> &Arc<VarConfig> {
        &self.config
    }

    pub(crate) fn slot(&self, index: usize) -> Option<FieldRef> {
        self.array.get(index).and_then(|s| s.clone())
    }

    pub(crate) fn named(&self, name: &[u8]) -> Option<FieldRef> {
        self.hash.get(&NameKey::new(name)).cloned()
    }

    /// Write or clear an entry, keeping hash and array in lockstep for
    /// indexed sources.
    pub(crate) fn install(&mut self, key: NameKey, index: Option<usize>, field: Option<FieldRef>) {
        match &field {
            Some(fref) => {
                self.hash.insert(key, Arc::clone(fref));
            }
            None => {
                self.hash.remove(&key);
            }
        }
        if let Some(i) = index {
            if let Some(slot) = self.array.get_mut(i) {
                *slot = field;
            }
        }
    }

    /// All assigned fields, in no particular order. Used by audit-style
    /// consumers that walk the whole store.
    pub fn export(&self) -> Vec<FieldRef> {
        self.hash.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }
}

impl std::fmt::Debug for VarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VarStore")
            .field("config", &self.config.id())
            .field("assigned", &self.hash.len())
            .field("slots", &self.array.len())
            .finish()
    }
}
