// ironbee_rust/src/core/action/mod.rs
// Actions are the side-effect plugin kind: same registry shape as
// operators, no capability set, executed against a rule-execution context
// instead of a value/capture pair.

pub mod builtins;

use crate::core::exception::{CoreError, CoreResult};
use crate::core::mem::{MemScope, OpaqueData};
use crate::core::var::VarStore;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

/// The context an action mutates: the transaction's store plus the
/// blocking/flag state accumulated while a rule fires.
pub struct RuleExec<'a> {
    pub store: &'a mut VarStore,
    rule_id: String,
    blocked: bool,
    flags: Vec<String>,
}

impl<'a> RuleExec<'a> {
    pub fn new(store: &'a mut VarStore, rule_id: impl Into<String>) -> Self {
        Self {
            store,
            rule_id: rule_id.into(),
            blocked: false,
            flags: Vec::new(),
        }
    }

    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    pub fn block(&mut self) {
        self.blocked = true;
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn set_flag(&mut self, name: &str) {
        if !self.has_flag(name) {
            self.flags.push(name.to_string());
        }
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.iter().any(|f| f == name)
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }
}

/// An action implementation. All hooks are optional; the default
/// `execute` succeeds without side effects.
pub trait ActionDef: Debug + Send + Sync {
    fn create(&self, _parameters: &str) -> CoreResult<Option<OpaqueData>> {
        Ok(None)
    }

    fn execute(&self, _inst: &ActionInstance, _exec: &mut RuleExec<'_>) -> CoreResult<()> {
        Ok(())
    }

    fn destroy(&self, _data: OpaqueData) {}
}

#[derive(Debug)]
pub struct Action {
    name: String,
    def: Arc<dyn ActionDef>,
}

impl Action {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind a parameter string; the destroy hook is registered on `scope`.
    pub fn create_instance(
        self: &Arc<Self>,
        scope: &MemScope,
        parameters: &str,
    ) -> CoreResult<ActionInstance> {
        let data = self.def.create(parameters)?;
        if let Some(data) = &data {
            let def = Arc::clone(&self.def);
            let held = Arc::clone(data);
            scope.register_cleanup(move || def.destroy(held));
        }
        Ok(ActionInstance {
            action: Arc::clone(self),
            parameters: parameters.to_string(),
            data,
        })
    }
}

pub struct ActionInstance {
    action: Arc<Action>,
    parameters: String,
    data: Option<OpaqueData>,
}

impl ActionInstance {
    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    pub fn parameters(&self) -> &str {
        &self.parameters
    }

    pub fn data(&self) -> Option<&OpaqueData> {
        self.data.as_ref()
    }

    pub fn execute(&self, exec: &mut RuleExec<'_>) -> CoreResult<()> {
        self.action.def.execute(self, exec)
    }
}

impl Debug for ActionInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionInstance")
            .field("action", &self.action.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Case-sensitive name → action map.
pub struct ActionRegistry {
    map: RwLock<HashMap<String, Arc<Action>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Names starting with `@` belong to the rule DSL and are rejected.
    pub fn register(&self, name: &str, def: Arc<dyn ActionDef>) -> CoreResult<Arc<Action>> {
        if name.starts_with('@') {
            return Err(CoreError::InvalidArgument(format!(
                "action name '{name}' uses the reserved '@' prefix"
            )));
        }
        let mut map = self.map.write().expect("RwLock poisoned");
        if map.contains_key(name) {
            return Err(CoreError::InvalidArgument(format!(
                "action '{name}' already registered"
            )));
        }
        let action = Arc::new(Action {
            name: name.to_string(),
            def,
        });
        map.insert(name.to_string(), Arc::clone(&action));
        tracing::debug!(name, "registered action");
        Ok(action)
    }

    pub fn lookup(&self, name: &str) -> CoreResult<Arc<Action>> {
        self.map
            .read()
            .expect("RwLock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("action '{name}'")))
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

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
