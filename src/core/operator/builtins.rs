// ironbee_rust/src/core/operator/builtins.rs
use super::{OperatorCapabilities, OperatorDef, OperatorInstance, OperatorRegistry};
use crate::core::capture;
use crate::core::exception::{CoreError, CoreResult};
use crate::core::field::{Field, FieldRef, FieldValue};
use crate::core::mem::OpaqueData;
use regex::Regex;
use std::sync::Arc;

fn to_f64(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Num(v) => Some(*v as f64),
        FieldValue::Float(v) => Some(*v),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

/// Numeric comparison against a parameter parsed at instance creation.
/// Non-numeric input never matches.
#[derive(Debug)]
struct NumericCompareOperator {
    op: CompareOp,
}

#[derive(Debug)]
struct ParsedNumber(f64);

impl OperatorDef for NumericCompareOperator {
    fn create(&self, parameters: &str) -> CoreResult<Option<OpaqueData>> {
        let v: f64 = parameters.trim().parse().map_err(|_| {
            CoreError::InvalidArgument(format!(
                "numeric operator parameter '{parameters}' is not a number"
            ))
        })?;
        Ok(Some(Arc::new(ParsedNumber(v))))
    }

    fn execute(
        &self,
        inst: &OperatorInstance,
        input: &FieldRef,
        _capture: Option<&FieldRef>,
    ) -> CoreResult<i64> {
        let Some(param) = inst.data().and_then(|d| d.downcast_ref::<ParsedNumber>()) else {
            return Err(CoreError::Other(
                "compare operator missing parsed parameter".to_string(),
            ));
        };
        let guard = input.lock().expect("Mutex poisoned");
        let Some(value) = to_f64(&guard.value) else {
            return Ok(0);
        };
        let matched = match self.op {
            CompareOp::Eq => value == param.0,
            CompareOp::Ne => value != param.0,
            CompareOp::Gt => value > param.0,
            CompareOp::Lt => value < param.0,
            CompareOp::Ge => value >= param.0,
            CompareOp::Le => value <= param.0,
        };
        Ok(matched as i64)
    }
}

/// Byte-string equality against the parameter, optionally case folded.
#[derive(Debug)]
struct StrEqOperator {
    fold_case: bool,
}

impl OperatorDef for StrEqOperator {
    fn execute(
        &self,
        inst: &OperatorInstance,
        input: &FieldRef,
        _capture: Option<&FieldRef>,
    ) -> CoreResult<i64> {
        let guard = input.lock().expect("Mutex poisoned");
        let Some(bytes) = guard.as_bytes() else {
            return Ok(0);
        };
        let param = inst.parameters().as_bytes();
        let matched = if self.fold_case {
            bytes.eq_ignore_ascii_case(param)
        } else {
            bytes == param
        };
        Ok(matched as i64)
    }
}

/// Substring search for the parameter in the input bytes.
#[derive(Debug)]
struct ContainsOperator;

impl OperatorDef for ContainsOperator {
    fn execute(
        &self,
        inst: &OperatorInstance,
        input: &FieldRef,
        _capture: Option<&FieldRef>,
    ) -> CoreResult<i64> {
        let guard = input.lock().expect("Mutex poisoned");
        let Some(bytes) = guard.as_bytes() else {
            return Ok(0);
        };
        let needle = inst.parameters().as_bytes();
        if needle.is_empty() {
            return Ok(1);
        }
        let matched = bytes.windows(needle.len()).any(|w| w == needle);
        Ok(matched as i64)
    }
}

/// Set membership: the parameter is a whitespace-separated word list.
#[derive(Debug)]
struct MatchOperator;

#[derive(Debug)]
struct WordSet(Vec<Vec<u8>>);

impl OperatorDef for MatchOperator {
    fn create(&self, parameters: &str) -> CoreResult<Option<OpaqueData>> {
        let words: Vec<Vec<u8>> = parameters
            .split_whitespace()
            .map(|w| w.as_bytes().to_vec())
            .collect();
        if words.is_empty() {
            return Err(CoreError::InvalidArgument(
                "match operator requires at least one word".to_string(),
            ));
        }
        Ok(Some(Arc::new(WordSet(words))))
    }

    fn execute(
        &self,
        inst: &OperatorInstance,
        input: &FieldRef,
        _capture: Option<&FieldRef>,
    ) -> CoreResult<i64> {
        let Some(words) = inst.data().and_then(|d| d.downcast_ref::<WordSet>()) else {
            return Err(CoreError::Other(
                "match operator missing word set".to_string(),
            ));
        };
        let guard = input.lock().expect("Mutex poisoned");
        let Some(bytes) = guard.as_bytes() else {
            return Ok(0);
        };
        Ok(words.0.iter().any(|w| w == bytes) as i64)
    }
}

/// Regular expression match, compiled once per instance. Match groups 0
/// through 9 are written into the capture collection when one is handed
/// in.
#[derive(Debug)]
struct RxOperator;

#[derive(Debug)]
struct CompiledRx(Regex);

impl OperatorDef for RxOperator {
    fn create(&self, parameters: &str) -> CoreResult<Option<OpaqueData>> {
        let re = Regex::new(parameters)
            .map_err(|e| CoreError::InvalidArgument(format!("rx pattern: {e}")))?;
        Ok(Some(Arc::new(CompiledRx(re))))
    }

    fn execute(
        &self,
        inst: &OperatorInstance,
        input: &FieldRef,
        capture: Option<&FieldRef>,
    ) -> CoreResult<i64> {
        let Some(rx) = inst.data().and_then(|d| d.downcast_ref::<CompiledRx>()) else {
            return Err(CoreError::Other("rx operator missing pattern".to_string()));
        };
        let guard = input.lock().expect("Mutex poisoned");
        let Some(bytes) = guard.as_bytes() else {
            return Ok(0);
        };
        let text = String::from_utf8_lossy(bytes);
        let Some(caps) = rx.0.captures(&text) else {
            return Ok(0);
        };
        if let Some(list) = capture {
            for (i, group) in caps.iter().take(10).enumerate() {
                let field = group.map(|m| Field::bytes("", m.as_str().as_bytes().to_vec()));
                capture::set_list_item(list, i, field)?;
            }
        }
        Ok(1)
    }
}

/// IPv4 membership in a list of addresses and CIDR networks, parsed at
/// instance creation. Non-address input never matches.
#[derive(Debug)]
struct IpMatchOperator;

#[derive(Debug)]
struct CidrSet(Vec<(u32, u32)>);

fn parse_cidr(word: &str) -> CoreResult<(u32, u32)> {
    let bad = || CoreError::InvalidArgument(format!("ipmatch entry '{word}' is not ADDR[/PREFIX]"));
    let (addr_part, prefix) = match word.split_once('/') {
        Some((a, p)) => (a, p.parse::<u32>().map_err(|_| bad())?),
        None => (word, 32),
    };
    if prefix > 32 {
        return Err(bad());
    }
    let addr: std::net::Ipv4Addr = addr_part.parse().map_err(|_| bad())?;
    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    Ok((u32::from(addr) & mask, mask))
}

impl OperatorDef for IpMatchOperator {
    fn create(&self, parameters: &str) -> CoreResult<Option<OpaqueData>> {
        let entries: Vec<(u32, u32)> = parameters
            .split_whitespace()
            .map(parse_cidr)
            .collect::<CoreResult<_>>()?;
        if entries.is_empty() {
            return Err(CoreError::InvalidArgument(
                "ipmatch operator requires at least one address".to_string(),
            ));
        }
        Ok(Some(Arc::new(CidrSet(entries))))
    }

    fn execute(
        &self,
        inst: &OperatorInstance,
        input: &FieldRef,
        _capture: Option<&FieldRef>,
    ) -> CoreResult<i64> {
        let Some(set) = inst.data().and_then(|d| d.downcast_ref::<CidrSet>()) else {
            return Err(CoreError::Other("ipmatch missing address set".to_string()));
        };
        let guard = input.lock().expect("Mutex poisoned");
        let Some(bytes) = guard.as_bytes() else {
            return Ok(0);
        };
        let Ok(text) = std::str::from_utf8(bytes) else {
            return Ok(0);
        };
        let Ok(addr) = text.trim().parse::<std::net::Ipv4Addr>() else {
            return Ok(0);
        };
        let ip = u32::from(addr);
        Ok(set.0.iter().any(|(net, mask)| ip & mask == *net) as i64)
    }
}

#[derive(Debug)]
struct TrueOperator;

// The default execute is the always-true no-op.
impl OperatorDef for TrueOperator {}

#[derive(Debug)]
struct FalseOperator;

impl OperatorDef for FalseOperator {
    fn execute(
        &self,
        _inst: &OperatorInstance,
        _input: &FieldRef,
        _capture: Option<&FieldRef>,
    ) -> CoreResult<i64> {
        Ok(0)
    }
}

/// Install the builtin operator set into a registry. Called once per
/// namespace at engine construction.
pub fn register_builtins(registry: &OperatorRegistry) -> CoreResult<()> {
    let both = OperatorCapabilities::PHASE | OperatorCapabilities::STREAM;
    let with_capture = both | OperatorCapabilities::CAPTURE;

    for (name, op) in [
        ("eq", CompareOp::Eq),
        ("ne", CompareOp::Ne),
        ("gt", CompareOp::Gt),
        ("lt", CompareOp::Lt),
        ("ge", CompareOp::Ge),
        ("le", CompareOp::Le),
    ] {
        registry.register(name, both, Arc::new(NumericCompareOperator { op }))?;
    }
    registry.register("streq", both, Arc::new(StrEqOperator { fold_case: false }))?;
    registry.register("istreq", both, Arc::new(StrEqOperator { fold_case: true }))?;
    registry.register("contains", both, Arc::new(ContainsOperator))?;
    registry.register("match", both, Arc::new(MatchOperator))?;
    registry.register("ipmatch", both, Arc::new(IpMatchOperator))?;
    registry.register("rx", with_capture, Arc::new(RxOperator))?;
    registry.register("true", with_capture, Arc::new(TrueOperator))?;
    registry.register("false", with_capture, Arc::new(FalseOperator))?;
    Ok(())
}
