// ironbee_rust/src/core/action/builtins.rs
use super::{ActionDef, ActionInstance, ActionRegistry, RuleExec};
use crate::core::exception::{CoreError, CoreResult};
use crate::core::field::Field;
use crate::core::mem::OpaqueData;
use crate::core::var::{VarExpand, VarTarget};
use std::sync::Arc;

/// `setvar:TARGET=VALUE` — write a value back through a target. The value
/// side is expanded against the current store on every firing.
#[derive(Debug)]
struct SetVarAction;

#[derive(Debug)]
struct SetVarSpec {
    target: String,
    value: String,
}

impl ActionDef for SetVarAction {
    fn create(&self, parameters: &str) -> CoreResult<Option<OpaqueData>> {
        let Some((target, value)) = parameters.split_once('=') else {
            return Err(CoreError::InvalidArgument(format!(
                "setvar parameter '{parameters}' is not TARGET=VALUE"
            )));
        };
        if target.is_empty() {
            return Err(CoreError::InvalidArgument(
                "setvar target is empty".to_string(),
            ));
        }
        Ok(Some(Arc::new(SetVarSpec {
            target: target.to_string(),
            value: value.to_string(),
        })))
    }

    fn execute(&self, inst: &ActionInstance, exec: &mut RuleExec<'_>) -> CoreResult<()> {
        let Some(spec) = inst.data().and_then(|d| d.downcast_ref::<SetVarSpec>()) else {
            return Err(CoreError::Other("setvar missing parsed spec".to_string()));
        };
        let config = Arc::clone(exec.store.config());
        let value = VarExpand::acquire(&config, spec.value.as_bytes())?.execute(exec.store);
        let target = VarTarget::acquire_from_string(&config, spec.target.as_bytes())?;
        target.remove_and_set(exec.store, Field::bytes("", value))
    }
}

/// `setflag:NAME` — raise a named flag on the rule execution.
#[derive(Debug)]
struct SetFlagAction;

impl ActionDef for SetFlagAction {
    fn execute(&self, inst: &ActionInstance, exec: &mut RuleExec<'_>) -> CoreResult<()> {
        if inst.parameters().is_empty() {
            return Err(CoreError::InvalidArgument(
                "setflag requires a flag name".to_string(),
            ));
        }
        let flag = inst.parameters().to_string();
        exec.set_flag(&flag);
        Ok(())
    }
}

/// `block` — mark the transaction for blocking. The enforcement itself
/// belongs to the server adapter.
#[derive(Debug)]
struct BlockAction;

impl ActionDef for BlockAction {
    fn execute(&self, _inst: &ActionInstance, exec: &mut RuleExec<'_>) -> CoreResult<()> {
        exec.block();
        Ok(())
    }
}

/// `log:MESSAGE` — emit the expanded message on the engine's log stream.
#[derive(Debug)]
struct LogAction;

impl ActionDef for LogAction {
    fn execute(&self, inst: &ActionInstance, exec: &mut RuleExec<'_>) -> CoreResult<()> {
        let config = Arc::clone(exec.store.config());
        let message = VarExpand::acquire(&config, inst.parameters().as_bytes())?
            .execute(exec.store);
        tracing::info!(
            rule_id = exec.rule_id(),
            message = %String::from_utf8_lossy(&message),
            "rule log action"
        );
        Ok(())
    }
}

/// Install the builtin action set. Called once at engine construction.
pub fn register_builtins(registry: &ActionRegistry) -> CoreResult<()> {
    registry.register("setvar", Arc::new(SetVarAction))?;
    registry.register("setflag", Arc::new(SetFlagAction))?;
    registry.register("block", Arc::new(BlockAction))?;
    registry.register("log", Arc::new(LogAction))?;
    Ok(())
}
