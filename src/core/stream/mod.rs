// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream Processor Registry
//!
//! Stream processors consume transaction body bytes, orthogonal to the
//! field-value path. Defs are registered by name and filed under each of
//! their MIME-like type tags; instances are created per transaction and
//! torn down with the transaction's scope.

use crate::core::exception::{CoreError, CoreResult};
use crate::core::mem::{MemScope, OpaqueData};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

/// A stream processor implementation. The default `execute` is the
/// pass-through; the default `create` carries no state.
pub trait StreamProcessorDef: Debug + Send + Sync {
    fn create(&self) -> CoreResult<Option<OpaqueData>> {
        Ok(None)
    }

    fn execute(
        &self,
        _inst: &StreamProcessorInstance,
        input: &[u8],
        output: &mut Vec<u8>,
    ) -> CoreResult<()> {
        output.extend_from_slice(input);
        Ok(())
    }

    fn destroy(&self, _data: OpaqueData) {}
}

/// A registered processor: name, the type tags it handles, implementation.
#[derive(Debug)]
pub struct StreamProcessor {
    name: String,
    types: Vec<String>,
    def: Arc<dyn StreamProcessorDef>,
}

impl StreamProcessor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }
}

/// A per-transaction processor with its instance state.
pub struct StreamProcessorInstance {
    processor: Arc<StreamProcessor>,
    data: Option<OpaqueData>,
}

impl StreamProcessorInstance {
    pub fn processor(&self) -> &Arc<StreamProcessor> {
        &self.processor
    }

    pub fn data(&self) -> Option<&OpaqueData> {
        self.data.as_ref()
    }

    pub fn execute(&self, input: &[u8], output: &mut Vec<u8>) -> CoreResult<()> {
        self.processor.def.execute(self, input, output)
    }
}

impl Debug for StreamProcessorInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProcessorInstance")
            .field("processor", &self.processor.name)
            .finish()
    }
}

/// Name-keyed processor registry with a secondary type-tag index.
/// Execution order within a type tag is registration order; chaining is
/// the caller's concern.
pub struct StreamProcessorRegistry {
    by_name: RwLock<HashMap<String, Arc<StreamProcessor>>>,
    by_type: RwLock<HashMap<String, Vec<Arc<StreamProcessor>>>>,
}

impl StreamProcessorRegistry {
    pub fn new() -> Self {
        Self {
            by_name: RwLock::new(HashMap::new()),
            by_type: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(
        &self,
        name: &str,
        types: &[&str],
        def: Arc<dyn StreamProcessorDef>,
    ) -> CoreResult<Arc<StreamProcessor>> {
        let mut by_name = self.by_name.write().expect("RwLock poisoned");
        if by_name.contains_key(name) {
            return Err(CoreError::InvalidArgument(format!(
                "stream processor '{name}' already registered"
            )));
        }
        let processor = Arc::new(StreamProcessor {
            name: name.to_string(),
            types: types.iter().map(|t| t.to_string()).collect(),
            def,
        });
        by_name.insert(name.to_string(), Arc::clone(&processor));
        let mut by_type = self.by_type.write().expect("RwLock poisoned");
        for t in types {
            by_type
                .entry(t.to_string())
                .or_default()
                .push(Arc::clone(&processor));
        }
        tracing::debug!(name, ?types, "registered stream processor");
        Ok(processor)
    }

    pub fn lookup(&self, name: &str) -> CoreResult<Arc<StreamProcessor>> {
        self.by_name
            .read()
            .expect("RwLock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("stream processor '{name}'")))
    }

    /// Registered processor names for a type tag, in registration order.
    pub fn names_for_type(&self, type_tag: &str) -> Vec<String> {
        self.by_type
            .read()
            .expect("RwLock poisoned")
            .get(type_tag)
            .map(|list| list.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Create a per-transaction instance; its destroy hook is registered
    /// on `scope`.
    pub fn create_instance(
        &self,
        name: &str,
        scope: &MemScope,
    ) -> CoreResult<StreamProcessorInstance> {
        let processor = self.lookup(name)?;
        let data = processor.def.create()?;
        if let Some(data) = &data {
            let def = Arc::clone(&processor.def);
            let held = Arc::clone(data);
            scope.register_cleanup(move || def.destroy(held));
        }
        Ok(StreamProcessorInstance { processor, data })
    }
}

impl Default for StreamProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for StreamProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .by_name
            .read()
            .expect("RwLock poisoned")
            .keys()
            .cloned()
            .collect();
        f.debug_struct("StreamProcessorRegistry")
            .field("processors", &names)
            .finish()
    }
}
