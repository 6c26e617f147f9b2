// ironbee_rust/src/core/transformation/mod.rs
// Transformations are pure field-to-field mappers, chained in front of an
// operator. A transformation must not mutate its input and always
// produces an output field; failures are reported as errors, never as an
// absent result.

pub mod builtins;

use crate::core::exception::{CoreError, CoreResult};
use crate::core::field::{Field, FieldRef, FieldValue};
use crate::core::mem::{MemScope, OpaqueData};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

pub trait TransformationDef: Debug + Send + Sync {
    fn create(&self, _parameters: &str) -> CoreResult<Option<OpaqueData>> {
        Ok(None)
    }

    /// Map `input` to a new field. Implementations must treat `input` as
    /// read-only; returning the input handle unchanged is permitted.
    fn execute(&self, inst: &TransformationInstance, input: &FieldRef) -> CoreResult<FieldRef>;

    fn destroy(&self, _data: OpaqueData) {}
}

/// A registered transformation: name, list-distribution policy,
/// implementation.
#[derive(Debug)]
pub struct Transformation {
    name: String,
    handle_list: bool,
    def: Arc<dyn TransformationDef>,
}

impl Transformation {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When false, the runtime applies the transformation element-wise
    /// over list input and reassembles a list of identical shape; when
    /// true, the implementation receives the list itself.
    pub fn handle_list(&self) -> bool {
        self.handle_list
    }

    pub fn create_instance(
        self: &Arc<Self>,
        scope: &MemScope,
        parameters: &str,
    ) -> CoreResult<TransformationInstance> {
        let data = self.def.create(parameters)?;
        if let Some(data) = &data {
            let def = Arc::clone(&self.def);
            let held = Arc::clone(data);
            scope.register_cleanup(move || def.destroy(held));
        }
        Ok(TransformationInstance {
            tfn: Arc::clone(self),
            parameters: parameters.to_string(),
            data,
        })
    }
}

pub struct TransformationInstance {
    tfn: Arc<Transformation>,
    parameters: String,
    data: Option<OpaqueData>,
}

impl TransformationInstance {
    pub fn transformation(&self) -> &Arc<Transformation> {
        &self.tfn
    }

    pub fn parameters(&self) -> &str {
        &self.parameters
    }

    pub fn data(&self) -> Option<&OpaqueData> {
        self.data.as_ref()
    }

    /// Apply, distributing over list input unless the transformation
    /// handles lists itself. The reassembled list keeps the input's name
    /// and element order.
    pub fn execute(&self, input: &FieldRef) -> CoreResult<FieldRef> {
        if self.tfn.handle_list {
            return self.tfn.def.execute(self, input);
        }
        let list_parts = {
            let guard = input.lock().expect("Mutex poisoned");
            match &guard.value {
                FieldValue::List(children) => Some((guard.name().to_vec(), children.clone())),
                _ => None,
            }
        };
        let Some((name, children)) = list_parts else {
            return self.tfn.def.execute(self, input);
        };
        let mut mapped = Vec::with_capacity(children.len());
        for child in &children {
            mapped.push(self.tfn.def.execute(self, child)?);
        }
        Ok(Field::list(name, mapped).into_ref())
    }
}

impl Debug for TransformationInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationInstance")
            .field("transformation", &self.tfn.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Pipe a field through an instance chain in order, as the rule engine
/// does between target resolution and operator execution.
pub fn apply_chain(
    chain: &[TransformationInstance],
    input: &FieldRef,
) -> CoreResult<FieldRef> {
    let mut current = Arc::clone(input);
    for inst in chain {
        current = inst.execute(&current)?;
    }
    Ok(current)
}

pub struct TransformationRegistry {
    map: RwLock<HashMap<String, Arc<Transformation>>>,
}

impl TransformationRegistry {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(
        &self,
        name: &str,
        handle_list: bool,
        def: Arc<dyn TransformationDef>,
    ) -> CoreResult<Arc<Transformation>> {
        let mut map = self.map.write().expect("RwLock poisoned");
        if map.contains_key(name) {
            return Err(CoreError::InvalidArgument(format!(
                "transformation '{name}' already registered"
            )));
        }
        let tfn = Arc::new(Transformation {
            name: name.to_string(),
            handle_list,
            def,
        });
        map.insert(name.to_string(), Arc::clone(&tfn));
        tracing::debug!(name, handle_list, "registered transformation");
        Ok(tfn)
    }

    pub fn lookup(&self, name: &str) -> CoreResult<Arc<Transformation>> {
        self.map
            .read()
            .expect("RwLock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("transformation '{name}'")))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .map
            .read()
            .expect("RwLock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for TransformationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for TransformationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationRegistry")
            .field("transformations", &self.names())
            .finish()
    }
}
