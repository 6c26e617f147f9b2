// ironbee_rust/src/core/operator/mod.rs
// Operators are the predicate plugin kind: named, capability-gated,
// instantiated per rule with a parameter string. Phase and stream
// operators share the API but live in separate namespaces.

pub mod builtins;

use crate::core::exception::{CoreError, CoreResult};
use crate::core::field::FieldRef;
use crate::core::mem::{MemScope, OpaqueData};
use bitflags::bitflags;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

bitflags! {
    /// Where an operator may be composed: phase rules, stream rules,
    /// capture-producing rules, null-input-tolerant rules.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OperatorCapabilities: u32 {
        const PHASE = 1 << 0;
        const STREAM = 1 << 1;
        const CAPTURE = 1 << 2;
        const ALLOW_NULL = 1 << 3;
    }
}

/// An operator implementation.
///
/// All hooks are optional: the default `create` carries no instance data,
/// the default `execute` is the always-true no-op, the default `destroy`
/// does nothing.
pub trait OperatorDef: Debug + Send + Sync {
    fn create(&self, _parameters: &str) -> CoreResult<Option<OpaqueData>> {
        Ok(None)
    }

    /// Evaluate against `input`, optionally writing match groups into the
    /// supplied capture list. Returns 0 (no match) or non-zero.
    fn execute(
        &self,
        _inst: &OperatorInstance,
        _input: &FieldRef,
        _capture: Option<&FieldRef>,
    ) -> CoreResult<i64> {
        Ok(1)
    }

    fn destroy(&self, _data: OpaqueData) {}
}

/// A registered operator: name, capability set, implementation.
#[derive(Debug)]
pub struct Operator {
    name: String,
    capabilities: OperatorCapabilities,
    def: Arc<dyn OperatorDef>,
}

impl Operator {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> OperatorCapabilities {
        self.capabilities
    }

    /// Bind a parameter string into an executable instance.
    ///
    /// The caller's required capabilities must be a subset of what the
    /// operator provides. The instance's destroy hook is registered on
    /// `scope`; the instance lives exactly as long as that scope.
    pub fn create_instance(
        self: &Arc<Self>,
        scope: &MemScope,
        required: OperatorCapabilities,
        parameters: &str,
    ) -> CoreResult<OperatorInstance> {
        if !self.capabilities.contains(required) {
            return Err(CoreError::NotImplemented(format!(
                "operator '{}' lacks required capabilities {:?}",
                self.name,
                required.difference(self.capabilities)
            )));
        }
        let data = self.def.create(parameters)?;
        if let Some(data) = &data {
            let def = Arc::clone(&self.def);
            let held = Arc::clone(data);
            scope.register_cleanup(move || def.destroy(held));
        }
        Ok(OperatorInstance {
            op: Arc::clone(self),
            parameters: parameters.to_string(),
            data,
        })
    }
}

/// A parameter-bound operator ready for repeated execution.
pub struct OperatorInstance {
    op: Arc<Operator>,
    parameters: String,
    data: Option<OpaqueData>,
}

impl OperatorInstance {
    pub fn operator(&self) -> &Arc<Operator> {
        &self.op
    }

    pub fn parameters(&self) -> &str {
        &self.parameters
    }

    pub fn data(&self) -> Option<&OpaqueData> {
        self.data.as_ref()
    }

    pub fn execute(&self, input: &FieldRef, capture: Option<&FieldRef>) -> CoreResult<i64> {
        self.op.def.execute(self, input, capture)
    }
}

impl Debug for OperatorInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorInstance")
            .field("operator", &self.op.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Case-sensitive name → operator map. Built serially at configuration
/// time, read-only afterwards.
pub struct OperatorRegistry {
    map: RwLock<HashMap<String, Arc<Operator>>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Names starting with `@` belong to the rule DSL and are rejected.
    pub fn register(
        &self,
        name: &str,
        capabilities: OperatorCapabilities,
        def: Arc<dyn OperatorDef>,
    ) -> CoreResult<Arc<Operator>> {
        if name.starts_with('@') {
            return Err(CoreError::InvalidArgument(format!(
                "operator name '{name}' uses the reserved '@' prefix"
            )));
        }
        let mut map = self.map.write().expect("RwLock poisoned");
        if map.contains_key(name) {
            return Err(CoreError::InvalidArgument(format!(
                "operator '{name}' already registered"
            )));
        }
        let op = Arc::new(Operator {
            name: name.to_string(),
            capabilities,
            def,
        });
        map.insert(name.to_string(), Arc::clone(&op));
        tracing::debug!(name, ?capabilities, "registered operator");
        Ok(op)
    }

    pub fn lookup(&self, name: &str) -> CoreResult<Arc<Operator>> {
        self.map
            .read()
            .expect("RwLock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("operator '{name}'")))
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

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::Field;

    #[derive(Debug)]
    struct NoopOperator;
    impl OperatorDef for NoopOperator {}

    #[test]
    fn default_execute_is_always_true() {
        let registry = OperatorRegistry::new();
        let op = registry
            .register("nop", OperatorCapabilities::PHASE, Arc::new(NoopOperator))
            .unwrap();
        let scope = MemScope::new();
        let inst = op
            .create_instance(&scope, OperatorCapabilities::PHASE, "")
            .unwrap();
        let input = Field::bytes("x", "y").into_ref();
        assert_eq!(inst.execute(&input, None).unwrap(), 1);
    }

    #[test]
    fn missing_capability_is_not_implemented() {
        let registry = OperatorRegistry::new();
        let op = registry
            .register("phase_only", OperatorCapabilities::PHASE, Arc::new(NoopOperator))
            .unwrap();
        let scope = MemScope::new();
        let err = op
            .create_instance(
                &scope,
                OperatorCapabilities::PHASE | OperatorCapabilities::STREAM,
                "",
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::NotImplemented(_)));
    }

    #[test]
    fn reserved_and_duplicate_names_rejected() {
        let registry = OperatorRegistry::new();
        assert!(matches!(
            registry
                .register("@rx", OperatorCapabilities::PHASE, Arc::new(NoopOperator))
                .unwrap_err(),
            CoreError::InvalidArgument(_)
        ));
        registry
            .register("dup", OperatorCapabilities::PHASE, Arc::new(NoopOperator))
            .unwrap();
        assert!(matches!(
            registry
                .register("dup", OperatorCapabilities::PHASE, Arc::new(NoopOperator))
                .unwrap_err(),
            CoreError::InvalidArgument(_)
        ));
    }

    #[test]
    fn destroy_runs_on_scope_release() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Debug)]
        struct Stateful(Arc<AtomicUsize>);
        impl OperatorDef for Stateful {
            fn create(&self, _parameters: &str) -> CoreResult<Option<OpaqueData>> {
                Ok(Some(Arc::new(())))
            }
            fn destroy(&self, _data: OpaqueData) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let destroyed = Arc::new(AtomicUsize::new(0));
        let registry = OperatorRegistry::new();
        let op = registry
            .register(
                "stateful",
                OperatorCapabilities::PHASE,
                Arc::new(Stateful(Arc::clone(&destroyed))),
            )
            .unwrap();
        let scope = MemScope::new();
        let _inst = op
            .create_instance(&scope, OperatorCapabilities::PHASE, "p")
            .unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        drop(scope);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }
}
