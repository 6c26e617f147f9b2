// ironbee_rust/src/core/util/mod.rs

use std::hash::{Hash, Hasher};

/// Case-insensitive byte comparison, length-exact.
pub fn names_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.eq_ignore_ascii_case(b)
}

/// Hash-map key over a name whose lookup is ASCII-case-insensitive.
///
/// The original bytes are kept verbatim; only hashing and equality fold
/// case. Var names are raw bytes, not UTF-8.
#[derive(Debug, Clone, Eq)]
pub struct NameKey {
    bytes: Vec<u8>,
}

impl NameKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq for NameKey {
    fn eq(&self, other: &Self) -> bool {
        names_eq(&self.bytes, &other.bytes)
    }
}

impl Hash for NameKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in &self.bytes {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_usize(self.bytes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn name_key_folds_case() {
        let mut m = HashMap::new();
        m.insert(NameKey::new(&b"Request_Method"[..]), 1);
        assert_eq!(m.get(&NameKey::new(&b"REQUEST_METHOD"[..])), Some(&1));
        assert_eq!(m.get(&NameKey::new(&b"request_method"[..])), Some(&1));
        assert_eq!(m.get(&NameKey::new(&b"request_methods"[..])), None);
    }

    #[test]
    fn name_key_keeps_original_bytes() {
        let k = NameKey::new(&b"ArGs"[..]);
        assert_eq!(k.bytes(), b"ArGs");
    }

    #[test]
    fn names_eq_is_length_exact() {
        assert!(names_eq(b"user", b"USER"));
        assert!(!names_eq(b"user", b"users"));
        assert!(!names_eq(b"", b"a"));
    }
}
