// ironbee_rust/src/core/transformation/builtins.rs
use super::{TransformationDef, TransformationInstance, TransformationRegistry};
use crate::core::exception::{CoreError, CoreResult};
use crate::core::field::{Field, FieldRef, FieldValue};
use std::sync::Arc;

fn is_ascii_space(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == b'\r' || b == b'\n' || b == 0x0b || b == 0x0c
}

#[derive(Debug, Clone, Copy)]
enum StringMap {
    Lowercase,
    Trim,
    TrimLeft,
    TrimRight,
    RemoveWhitespace,
}

/// Byte-level string rewrites. Non-string input is passed through
/// unchanged.
#[derive(Debug)]
struct StringMapTransformation {
    map: StringMap,
}

impl TransformationDef for StringMapTransformation {
    fn execute(&self, _inst: &TransformationInstance, input: &FieldRef) -> CoreResult<FieldRef> {
        let guard = input.lock().expect("Mutex poisoned");
        let Some(bytes) = guard.as_bytes() else {
            return Ok(Arc::clone(input));
        };
        let out: Vec<u8> = match self.map {
            StringMap::Lowercase => bytes.to_ascii_lowercase(),
            StringMap::Trim => {
                let start = bytes.iter().position(|&b| !is_ascii_space(b));
                match start {
                    None => Vec::new(),
                    Some(s) => {
                        let e = bytes.iter().rposition(|&b| !is_ascii_space(b)).unwrap_or(s);
                        bytes[s..=e].to_vec()
                    }
                }
            }
            StringMap::TrimLeft => {
                match bytes.iter().position(|&b| !is_ascii_space(b)) {
                    None => Vec::new(),
                    Some(s) => bytes[s..].to_vec(),
                }
            }
            StringMap::TrimRight => {
                match bytes.iter().rposition(|&b| !is_ascii_space(b)) {
                    None => Vec::new(),
                    Some(e) => bytes[..=e].to_vec(),
                }
            }
            StringMap::RemoveWhitespace => bytes
                .iter()
                .copied()
                .filter(|&b| !is_ascii_space(b))
                .collect(),
        };
        Ok(Field::bytes(guard.name().to_vec(), out).into_ref())
    }
}

/// Byte length of string input as an integer field. Non-string input
/// passes through.
#[derive(Debug)]
struct LengthTransformation;

impl TransformationDef for LengthTransformation {
    fn execute(&self, _inst: &TransformationInstance, input: &FieldRef) -> CoreResult<FieldRef> {
        let guard = input.lock().expect("Mutex poisoned");
        match guard.as_bytes() {
            Some(b) => Ok(Field::num(guard.name().to_vec(), b.len() as i64).into_ref()),
            None => Ok(Arc::clone(input)),
        }
    }
}

/// Element count of a list; scalars count as one.
#[derive(Debug)]
struct CountTransformation;

impl TransformationDef for CountTransformation {
    fn execute(&self, _inst: &TransformationInstance, input: &FieldRef) -> CoreResult<FieldRef> {
        let guard = input.lock().expect("Mutex poisoned");
        let n = match &guard.value {
            FieldValue::List(children) => children.len() as i64,
            _ => 1,
        };
        Ok(Field::num(guard.name().to_vec(), n).into_ref())
    }
}

/// Replace the value with the field's own name bytes.
#[derive(Debug)]
struct NameTransformation;

impl TransformationDef for NameTransformation {
    fn execute(&self, _inst: &TransformationInstance, input: &FieldRef) -> CoreResult<FieldRef> {
        let guard = input.lock().expect("Mutex poisoned");
        let name = guard.name().to_vec();
        Ok(Field::bytes(name.clone(), name).into_ref())
    }
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Percent-decoding with `+`-as-space. Malformed escapes pass through
/// verbatim, matching how permissive HTTP parsers leave them.
#[derive(Debug)]
struct UrlDecodeTransformation;

impl TransformationDef for UrlDecodeTransformation {
    fn execute(&self, _inst: &TransformationInstance, input: &FieldRef) -> CoreResult<FieldRef> {
        let guard = input.lock().expect("Mutex poisoned");
        let Some(bytes) = guard.as_bytes() else {
            return Ok(Arc::clone(input));
        };
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'+' => {
                    out.push(b' ');
                    i += 1;
                }
                b'%' if i + 2 < bytes.len() => {
                    match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                        (Some(hi), Some(lo)) => {
                            out.push(hi << 4 | lo);
                            i += 3;
                        }
                        _ => {
                            out.push(b'%');
                            i += 1;
                        }
                    }
                }
                b => {
                    out.push(b);
                    i += 1;
                }
            }
        }
        Ok(Field::bytes(guard.name().to_vec(), out).into_ref())
    }
}

/// The named and numeric character references attackers lean on. An
/// unterminated or unknown reference passes through verbatim.
#[derive(Debug)]
struct HtmlEntityDecodeTransformation;

const NAMED_ENTITIES: [(&[u8], u8); 5] = [
    (b"amp", b'&'),
    (b"lt", b'<'),
    (b"gt", b'>'),
    (b"quot", b'"'),
    (b"nbsp", b' '),
];

impl TransformationDef for HtmlEntityDecodeTransformation {
    fn execute(&self, _inst: &TransformationInstance, input: &FieldRef) -> CoreResult<FieldRef> {
        let guard = input.lock().expect("Mutex poisoned");
        let Some(bytes) = guard.as_bytes() else {
            return Ok(Arc::clone(input));
        };
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'&' {
                out.push(bytes[i]);
                i += 1;
                continue;
            }
            let Some(end) = bytes[i..].iter().position(|&b| b == b';') else {
                out.extend_from_slice(&bytes[i..]);
                break;
            };
            let body = &bytes[i + 1..i + end];
            let decoded = if let Some(digits) = body.strip_prefix(b"#x").or_else(|| body.strip_prefix(b"#X")) {
                u32::from_str_radix(&String::from_utf8_lossy(digits), 16).ok()
            } else if let Some(digits) = body.strip_prefix(b"#") {
                String::from_utf8_lossy(digits).parse::<u32>().ok()
            } else {
                NAMED_ENTITIES
                    .iter()
                    .find(|(name, _)| *name == body)
                    .map(|(_, b)| u32::from(*b))
            };
            match decoded.and_then(char::from_u32) {
                Some(c) => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    i += end + 1;
                }
                None => {
                    out.push(b'&');
                    i += 1;
                }
            }
        }
        Ok(Field::bytes(guard.name().to_vec(), out).into_ref())
    }
}

#[derive(Debug, Clone, Copy)]
enum RoundMode {
    Floor,
    Ceil,
    Round,
}

/// Float-to-integer rounding. Integer input passes through; other types
/// are an argument error.
#[derive(Debug)]
struct RoundingTransformation {
    mode: RoundMode,
}

impl TransformationDef for RoundingTransformation {
    fn execute(&self, _inst: &TransformationInstance, input: &FieldRef) -> CoreResult<FieldRef> {
        let guard = input.lock().expect("Mutex poisoned");
        match &guard.value {
            FieldValue::Num(_) => Ok(Arc::clone(input)),
            FieldValue::Float(v) => {
                let rounded = match self.mode {
                    RoundMode::Floor => v.floor(),
                    RoundMode::Ceil => v.ceil(),
                    RoundMode::Round => v.round(),
                };
                Ok(Field::num(guard.name().to_vec(), rounded as i64).into_ref())
            }
            _ => Err(CoreError::InvalidArgument(format!(
                "rounding of non-numeric field '{}'",
                String::from_utf8_lossy(guard.name())
            ))),
        }
    }
}

/// Install the builtin transformation set. Called once at engine
/// construction.
pub fn register_builtins(registry: &TransformationRegistry) -> CoreResult<()> {
    for (name, map) in [
        ("lowercase", StringMap::Lowercase),
        ("trim", StringMap::Trim),
        ("trimLeft", StringMap::TrimLeft),
        ("trimRight", StringMap::TrimRight),
        ("removeWhitespace", StringMap::RemoveWhitespace),
    ] {
        registry.register(name, false, Arc::new(StringMapTransformation { map }))?;
    }
    registry.register("urlDecode", false, Arc::new(UrlDecodeTransformation))?;
    registry.register("htmlEntityDecode", false, Arc::new(HtmlEntityDecodeTransformation))?;
    registry.register("length", false, Arc::new(LengthTransformation))?;
    registry.register("count", true, Arc::new(CountTransformation))?;
    registry.register("name", false, Arc::new(NameTransformation))?;
    registry.register("floor", false, Arc::new(RoundingTransformation { mode: RoundMode::Floor }))?;
    registry.register("ceil", false, Arc::new(RoundingTransformation { mode: RoundMode::Ceil }))?;
    registry.register("round", false, Arc::new(RoundingTransformation { mode: RoundMode::Round }))?;
    Ok(())
}
