// ironbee_rust/src/core/transaction.rs
use crate::core::capture::Capture;
use crate::core::collection::{self, ManagedCollection, ManagedCollectionInstance};
use crate::core::engine::Engine;
use crate::core::exception::CoreResult;
use crate::core::mem::MemScope;
use crate::core::var::VarStore;
use std::sync::{Arc, Mutex};

/// Per-transaction data substrate: the var store, the release scope that
/// bounds plugin instance lifetimes, and the managed collections recorded
/// for persistence.
///
/// One transaction is bound to one worker; nothing here synchronizes
/// beyond what sharing the engine registries requires.
pub struct Transaction {
    id: String,
    engine: Arc<Engine>,
    store: Mutex<VarStore>,
    scope: MemScope,
    collections: Mutex<Vec<ManagedCollectionInstance>>,
}

impl Transaction {
    pub fn new(engine: &Arc<Engine>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            engine: Arc::clone(engine),
            store: Mutex::new(VarStore::new(engine.var_config())),
            scope: MemScope::new(),
            collections: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn store(&self) -> &Mutex<VarStore> {
        &self.store
    }

    /// The scope bounding operator/action/transformation/stream-processor
    /// instances created for this transaction.
    pub fn scope(&self) -> &MemScope {
        &self.scope
    }

    /// Bind the engine's capture collection in this transaction's store.
    pub fn capture(&self) -> CoreResult<Capture> {
        let mut store = self.store.lock().expect("Mutex poisoned");
        Capture::acquire(&mut store, Some(self.engine.capture_collection()))
    }

    /// Populate one collection into the store and record it for
    /// persistence.
    pub fn populate_collection(&self, collection: &Arc<ManagedCollection>) -> CoreResult<()> {
        let instance = {
            let mut store = self.store.lock().expect("Mutex poisoned");
            collection.populate(&mut store)?
        };
        self.collections
            .lock()
            .expect("Mutex poisoned")
            .push(instance);
        Ok(())
    }

    /// Populate every collection the engine bound at construction.
    /// Called at transaction start.
    pub fn populate_collections(&self) -> CoreResult<()> {
        for collection in self.engine.managed_collections() {
            self.populate_collection(&collection)?;
        }
        Ok(())
    }

    /// Persist recorded collections in recording order, continuing past
    /// failures. Called at transaction end.
    pub fn persist_collections(&self) -> CoreResult<()> {
        let instances = self.collections.lock().expect("Mutex poisoned");
        collection::persist_all(&instances)
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .finish()
    }
}
