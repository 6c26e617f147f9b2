// ironbee_rust/src/core/engine.rs
use crate::core::action::{self, ActionRegistry};
use crate::core::collection::handlers::{JsonFileHandler, VarsHandler};
use crate::core::collection::{CollectionHandler, ManagedCollection};
use crate::core::config::EngineConfig;
use crate::core::exception::CoreResult;
use crate::core::operator::{self, OperatorRegistry};
use crate::core::stream::StreamProcessorRegistry;
use crate::core::transaction::Transaction;
use crate::core::transformation::{self, TransformationRegistry};
use crate::core::var::VarConfig;
use std::sync::{Arc, RwLock};

/// The engine handle: the var schema plus the plugin registries shared by
/// every transaction.
///
/// Built up serially at configuration time; transactions treat it as
/// read-only. Phase and stream operators are separate namespaces with the
/// same builtin set.
pub struct Engine {
    config: EngineConfig,
    var_config: Arc<VarConfig>,
    operators: OperatorRegistry,
    stream_operators: OperatorRegistry,
    actions: ActionRegistry,
    transformations: TransformationRegistry,
    stream_processors: StreamProcessorRegistry,
    collection_handlers: RwLock<Vec<Arc<dyn CollectionHandler>>>,
    collections: RwLock<Vec<Arc<ManagedCollection>>>,
}

impl Engine {
    pub fn new() -> CoreResult<Arc<Self>> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> CoreResult<Arc<Self>> {
        let var_config = VarConfig::new();
        for decl in &config.vars {
            var_config.register(decl.name.as_bytes(), decl.initial_phase, decl.final_phase)?;
        }

        let operators = OperatorRegistry::new();
        operator::builtins::register_builtins(&operators)?;
        let stream_operators = OperatorRegistry::new();
        operator::builtins::register_builtins(&stream_operators)?;
        let actions = ActionRegistry::new();
        action::builtins::register_builtins(&actions)?;
        let transformations = TransformationRegistry::new();
        transformation::builtins::register_builtins(&transformations)?;

        let collection_handlers: Vec<Arc<dyn CollectionHandler>> =
            vec![Arc::new(VarsHandler), Arc::new(JsonFileHandler)];

        let engine = Self {
            var_config,
            operators,
            stream_operators,
            actions,
            transformations,
            stream_processors: StreamProcessorRegistry::new(),
            collection_handlers: RwLock::new(collection_handlers),
            collections: RwLock::new(Vec::new()),
            config,
        };

        // Bind configured collections now so a bad URI fails engine
        // construction, not the first transaction.
        for c in &engine.config.collections {
            let collection = engine.select_collection(&c.name, &c.params)?;
            engine
                .collections
                .write()
                .expect("RwLock poisoned")
                .push(collection);
        }

        tracing::debug!(
            vars = engine.config.vars.len(),
            collections = engine.config.collections.len(),
            "engine constructed"
        );
        Ok(Arc::new(engine))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn var_config(&self) -> &Arc<VarConfig> {
        &self.var_config
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    pub fn stream_operators(&self) -> &OperatorRegistry {
        &self.stream_operators
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn transformations(&self) -> &TransformationRegistry {
        &self.transformations
    }

    pub fn stream_processors(&self) -> &StreamProcessorRegistry {
        &self.stream_processors
    }

    pub fn capture_collection(&self) -> &str {
        &self.config.capture_collection
    }

    /// Append a handler to the selection probe order.
    pub fn register_collection_handler(&self, handler: Arc<dyn CollectionHandler>) {
        self.collection_handlers
            .write()
            .expect("RwLock poisoned")
            .push(handler);
    }

    /// Probe registered handlers for `name`, first acceptance wins.
    pub fn select_collection(
        &self,
        name: &str,
        params: &[String],
    ) -> CoreResult<Arc<ManagedCollection>> {
        let handlers = self.collection_handlers.read().expect("RwLock poisoned");
        ManagedCollection::select(&handlers, name, params).map(Arc::new)
    }

    /// Collections bound at construction, populated into each transaction.
    pub fn managed_collections(&self) -> Vec<Arc<ManagedCollection>> {
        self.collections.read().expect("RwLock poisoned").clone()
    }

    pub fn new_transaction(self: &Arc<Self>) -> Transaction {
        Transaction::new(self)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("var_config", &self.var_config)
            .field("operators", &self.operators.names().len())
            .field("actions", &self.actions.names().len())
            .field("transformations", &self.transformations.names().len())
            .finish()
    }
}
