// ironbee_rust/src/core/var/config.rs
use crate::core::exception::{CoreError, CoreResult};
use crate::core::phase::Phase;
use crate::core::util::NameKey;
use crate::core::var::source::VarSource;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

struct ConfigInner {
    sources: HashMap<NameKey, Arc<VarSource>>,
    next_index: usize,
}

/// Immutable-after-build var schema.
///
/// Sources may only be registered before the first store is built from
/// this config; every store built afterwards carries a dense slot for each
/// registered source. Ad-hoc acquisition of unregistered names never
/// mutates the schema.
pub struct VarConfig {
    id: Uuid,
    inner: RwLock<ConfigInner>,
    frozen: AtomicBool,
}

impl VarConfig {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            inner: RwLock::new(ConfigInner {
                sources: HashMap::new(),
                next_index: 0,
            }),
            frozen: AtomicBool::new(false),
        })
    }

    /// Schema identity, used to reject cross-config source/store pairing.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Register a named source with its validity phases, assigning the
    /// next dense index.
    pub fn register(
        &self,
        name: &[u8],
        initial_phase: Phase,
        final_phase: Phase,
    ) -> CoreResult<Arc<VarSource>> {
        if !Phase::valid_range(initial_phase, final_phase) {
            return Err(CoreError::InvalidArgument(format!(
                "final phase {final_phase} precedes initial phase {initial_phase}"
            )));
        }
        if self.frozen.load(Ordering::Acquire) {
            return Err(CoreError::InvalidArgument(
                "source registration after store creation".to_string(),
            ));
        }
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let key = NameKey::new(name);
        if inner.sources.contains_key(&key) {
            return Err(CoreError::AlreadyExists(
                String::from_utf8_lossy(name).into_owned(),
            ));
        }
        let index = inner.next_index;
        let source = Arc::new(VarSource::new_indexed(
            self.id,
            name.to_vec(),
            initial_phase,
            final_phase,
            index,
        ));
        inner.sources.insert(key, Arc::clone(&source));
        inner.next_index += 1;
        tracing::debug!(
            name = %String::from_utf8_lossy(name),
            index,
            "registered var source"
        );
        Ok(source)
    }

    /// Look up a registered source; unregistered names fail.
    pub fn source(&self, name: &[u8]) -> CoreResult<Arc<VarSource>> {
        self.inner
            .read()
            .expect("RwLock poisoned")
            .sources
            .get(&NameKey::new(name))
            .cloned()
            .ok_or_else(|| CoreError::NotFound(String::from_utf8_lossy(name).into_owned()))
    }

    /// Look up a registered source, or build an ad-hoc unindexed one.
    ///
    /// The slow path accepts arbitrary transaction-local names without
    /// touching the schema.
    pub fn acquire(&self, name: &[u8]) -> Arc<VarSource> {
        match self.source(name) {
            Ok(source) => source,
            Err(_) => Arc::new(VarSource::new_unindexed(self.id, name.to_vec())),
        }
    }

    pub fn next_index(&self) -> usize {
        self.inner.read().expect("RwLock poisoned").next_index
    }

    pub(crate) fn mark_frozen(&self) {
        self.frozen.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for VarConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VarConfig")
            .field("id", &self.id)
            .field("next_index", &self.next_index())
            .finish()
    }
}
