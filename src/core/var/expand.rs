// ironbee_rust/src/core/var/expand.rs
use crate::core::field::{FieldRef, FieldValue};
use crate::core::var::config::VarConfig;
use crate::core::var::target::VarTarget;
use std::sync::Arc;

use crate::core::exception::CoreResult;

/// A parsed `%{...}` template, ready for repeated execution.
///
/// The input is decomposed into a flat sequence of chunks, each a literal
/// prefix plus an optional target. `%{` opens a placeholder, the first
/// following `}` closes it; an unmatched `%{` is literal. Placeholders are
/// not nested: the contents use the target grammar `NAME[:FILTER]`.
#[derive(Debug, Clone)]
pub struct VarExpand {
    chunks: Vec<ExpandChunk>,
}

#[derive(Debug, Clone)]
struct ExpandChunk {
    prefix: Vec<u8>,
    target: Option<VarTarget>,
}

fn find_open(haystack: &[u8]) -> Option<usize> {
    haystack.windows(2).position(|w| w == b"%{")
}

impl VarExpand {
    /// Parse `input` against `config`. Empty input yields a single
    /// zero-length chunk.
    pub fn acquire(config: &Arc<VarConfig>, input: &[u8]) -> CoreResult<Self> {
        let mut chunks = Vec::new();
        let mut rest = input;
        loop {
            let Some(open) = find_open(rest) else {
                chunks.push(ExpandChunk {
                    prefix: rest.to_vec(),
                    target: None,
                });
                break;
            };
            let body = &rest[open + 2..];
            let Some(close) = body.iter().position(|&b| b == b'}') else {
                // No closing brace: the remainder is literal.
                chunks.push(ExpandChunk {
                    prefix: rest.to_vec(),
                    target: None,
                });
                break;
            };
            let target = VarTarget::acquire_from_string(config, &body[..close])?;
            chunks.push(ExpandChunk {
                prefix: rest[..open].to_vec(),
                target: Some(target),
            });
            rest = &body[close + 1..];
            if rest.is_empty() {
                break;
            }
        }
        Ok(Self { chunks })
    }

    /// True iff at least one well-formed `%{...}` occurs in `input`.
    /// Callers use this to skip expansion work entirely.
    pub fn test(input: &[u8]) -> bool {
        match find_open(input) {
            Some(open) => input[open + 2..].contains(&b'}'),
            None => false,
        }
    }

    pub fn target_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.target.is_some()).count()
    }

    /// Evaluate against `store`.
    ///
    /// Target values are stringified per type; a list of results is joined
    /// with `", "`. Lookup failures substitute the literal `ERROR` rather
    /// than failing the whole expansion.
    pub fn execute(&self, store: &crate::core::var::VarStore) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.prefix);
            let Some(target) = &chunk.target else {
                continue;
            };
            match target.get(store) {
                Ok(fields) => {
                    for (i, field) in fields.iter().enumerate() {
                        if i > 0 {
                            out.extend_from_slice(b", ");
                        }
                        stringify(field, &mut out);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        target_name = %String::from_utf8_lossy(target.source_name()),
                        error = %e,
                        "expansion target failed"
                    );
                    out.extend_from_slice(b"ERROR");
                }
            }
        }
        out
    }
}

fn stringify(field: &FieldRef, out: &mut Vec<u8>) {
    let guard = field.lock().expect("Mutex poisoned");
    match &guard.value {
        FieldValue::Bytes(b) => out.extend_from_slice(b),
        FieldValue::Str(s) => out.extend_from_slice(s.as_bytes()),
        // Unsigned decimal print, preserved byte-for-byte for negatives.
        FieldValue::Num(n) => out.extend_from_slice(format!("{}", *n as u64).as_bytes()),
        FieldValue::Float(v) => out.extend_from_slice(format!("{v:.6}").as_bytes()),
        FieldValue::Time(_) | FieldValue::List(_) | FieldValue::Dynamic(_) => {
            out.extend_from_slice(b"UNSUPPORTED")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::exception::CoreError;
    use crate::core::field::Field;
    use crate::core::phase::Phase;
    use crate::core::var::{VarConfig, VarStore};

    fn store_with_method() -> (Arc<VarConfig>, VarStore) {
        let config = VarConfig::new();
        let source = config
            .register(b"REQUEST_METHOD", Phase::RequestHeader, Phase::None)
            .unwrap();
        let mut store = VarStore::new(&config);
        source
            .set(&mut store, Field::bytes("REQUEST_METHOD", "GET"))
            .unwrap();
        (config, store)
    }

    #[test]
    fn literal_input_passes_through() {
        let (config, store) = store_with_method();
        let expand = VarExpand::acquire(&config, b"plain text, no placeholders").unwrap();
        assert_eq!(expand.execute(&store), b"plain text, no placeholders");
        assert_eq!(expand.target_count(), 0);
    }

    #[test]
    fn empty_input_yields_single_empty_chunk() {
        let (config, store) = store_with_method();
        let expand = VarExpand::acquire(&config, b"").unwrap();
        assert_eq!(expand.chunks.len(), 1);
        assert_eq!(expand.execute(&store), b"");
    }

    #[test]
    fn simple_placeholder_expands() {
        let (config, store) = store_with_method();
        let expand = VarExpand::acquire(&config, b"m=%{REQUEST_METHOD}").unwrap();
        let out = expand.execute(&store);
        assert_eq!(out, b"m=GET");
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn unmatched_open_is_literal() {
        let (config, store) = store_with_method();
        let expand = VarExpand::acquire(&config, b"m=%{REQUEST_METHOD").unwrap();
        assert_eq!(expand.execute(&store), b"m=%{REQUEST_METHOD");
        assert_eq!(expand.target_count(), 0);
    }

    #[test]
    fn list_values_join_with_comma_space() {
        let config = VarConfig::new();
        let args = config
            .register(b"ARGS", Phase::Request, Phase::None)
            .unwrap();
        let mut store = VarStore::new(&config);
        args.append(&mut store, Field::bytes("a", "1")).unwrap();
        args.append(&mut store, Field::bytes("b", "2")).unwrap();
        let expand = VarExpand::acquire(&config, b"[%{ARGS}]").unwrap();
        assert_eq!(expand.execute(&store), b"[1, 2]");
    }

    #[test]
    fn numeric_and_float_stringification() {
        let config = VarConfig::new();
        let n = config.register(b"N", Phase::Request, Phase::None).unwrap();
        let f = config.register(b"F", Phase::Request, Phase::None).unwrap();
        let neg = config.register(b"NEG", Phase::Request, Phase::None).unwrap();
        let mut store = VarStore::new(&config);
        n.set(&mut store, Field::num("N", 42)).unwrap();
        f.set(&mut store, Field::float("F", 1.5)).unwrap();
        neg.set(&mut store, Field::num("NEG", -1)).unwrap();
        let expand = VarExpand::acquire(&config, b"%{N}/%{F}").unwrap();
        assert_eq!(expand.execute(&store), b"42/1.500000");
        let expand = VarExpand::acquire(&config, b"%{NEG}").unwrap();
        assert_eq!(expand.execute(&store), b"18446744073709551615");
    }

    #[test]
    fn unsupported_and_error_substitution() {
        let config = VarConfig::new();
        let t = config.register(b"T", Phase::Request, Phase::None).unwrap();
        let mut store = VarStore::new(&config);
        t.set(
            &mut store,
            Field::time("T", chrono::Utc::now()),
        )
        .unwrap();
        let expand = VarExpand::acquire(&config, b"%{T}|%{UNSET_VAR}").unwrap();
        assert_eq!(expand.execute(&store), b"UNSUPPORTED|ERROR");
    }

    #[test]
    fn expand_test_detects_well_formed_placeholders() {
        assert!(VarExpand::test(b"x%{A}y"));
        assert!(VarExpand::test(b"%{A:f}"));
        assert!(!VarExpand::test(b"plain"));
        assert!(!VarExpand::test(b"%{unclosed"));
        assert!(!VarExpand::test(b"closed} %{open"));
    }

    #[test]
    fn malformed_target_inside_placeholder_fails_acquire() {
        let config = VarConfig::new();
        let err = VarExpand::acquire(&config, b"x%{:filter}").unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }
}
