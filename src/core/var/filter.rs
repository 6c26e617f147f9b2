// ironbee_rust/src/core/var/filter.rs
use crate::core::exception::{CoreError, CoreResult};
use crate::core::field::{FieldRef, FieldValue};
use crate::core::util::names_eq;

/// A path selector over a list field's children.
///
/// Matching is case-insensitive, byte-length-exact equality on child
/// names. Dynamic fields receive the raw filter string as their sub-key
/// and produce their own result list.
#[derive(Debug, Clone)]
pub struct VarFilter {
    filter_string: Vec<u8>,
}

impl VarFilter {
    pub fn new(filter_string: impl Into<Vec<u8>>) -> Self {
        Self {
            filter_string: filter_string.into(),
        }
    }

    pub fn filter_string(&self) -> &[u8] {
        &self.filter_string
    }

    /// Read path: select matching children. The result aliases the
    /// original fields.
    pub fn apply(&self, field: &FieldRef) -> CoreResult<Vec<FieldRef>> {
        let guard = field.lock().expect("Mutex poisoned");
        match &guard.value {
            FieldValue::Dynamic(getter) => getter.get(&self.filter_string).map_err(|e| {
                CoreError::Other(format!(
                    "dynamic field '{}' failed: {e}",
                    String::from_utf8_lossy(guard.name())
                ))
            }),
            FieldValue::List(children) => Ok(children
                .iter()
                .filter(|c| {
                    names_eq(c.lock().expect("Mutex poisoned").name(), &self.filter_string)
                })
                .cloned()
                .collect()),
            _ => Err(CoreError::InvalidArgument(format!(
                "filter over non-list field '{}'",
                String::from_utf8_lossy(guard.name())
            ))),
        }
    }

    /// Write path: detach matching children.
    ///
    /// With `collect` the removed children are returned in list order.
    /// Removing from a dynamic or non-list field is an argument error;
    /// removing nothing is `NotFound`.
    pub fn remove(&self, field: &FieldRef, collect: bool) -> CoreResult<Vec<FieldRef>> {
        let mut guard = field.lock().expect("Mutex poisoned");
        let name = String::from_utf8_lossy(guard.name()).into_owned();
        let children = match &mut guard.value {
            FieldValue::List(children) => children,
            _ => {
                return Err(CoreError::InvalidArgument(format!(
                    "remove from non-list field '{name}'"
                )))
            }
        };

        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(children.len());
        for child in children.drain(..) {
            let matched =
                names_eq(child.lock().expect("Mutex poisoned").name(), &self.filter_string);
            if matched {
                removed.push(child);
            } else {
                kept.push(child);
            }
        }
        *children = kept;

        if removed.is_empty() {
            return Err(CoreError::NotFound(format!(
                "no child of '{name}' matches filter"
            )));
        }
        if collect {
            Ok(removed)
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::{DynamicList, Field};
    use std::sync::Arc;

    fn args_list() -> FieldRef {
        Field::list(
            "ARGS",
            vec![
                Field::bytes("user", "alice").into_ref(),
                Field::bytes("USER", "bob").into_ref(),
                Field::bytes("pass", "x").into_ref(),
            ],
        )
        .into_ref()
    }

    #[test]
    fn apply_selects_matching_children_case_insensitively() {
        let list = args_list();
        let got = VarFilter::new(&b"User"[..]).apply(&list).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].lock().unwrap().as_bytes(), Some(&b"alice"[..]));
        assert_eq!(got[1].lock().unwrap().as_bytes(), Some(&b"bob"[..]));
    }

    #[test]
    fn apply_result_aliases_the_original_fields() {
        let list = args_list();
        let got = VarFilter::new(&b"pass"[..]).apply(&list).unwrap();
        let original = list.lock().unwrap().as_list().unwrap()[2].clone();
        assert!(Arc::ptr_eq(&got[0], &original));
    }

    #[test]
    fn apply_on_non_list_is_invalid() {
        let scalar = Field::num("N", 1).into_ref();
        assert!(matches!(
            VarFilter::new(&b"x"[..]).apply(&scalar).unwrap_err(),
            CoreError::InvalidArgument(_)
        ));
    }

    #[test]
    fn apply_delegates_to_dynamic_getter() {
        struct Echo;
        impl DynamicList for Echo {
            fn get(&self, subkey: &[u8]) -> CoreResult<Vec<FieldRef>> {
                Ok(vec![Field::bytes(subkey.to_vec(), b"dyn".to_vec()).into_ref()])
            }
        }
        let dynamic = Field::dynamic("GEO", Arc::new(Echo)).into_ref();
        let got = VarFilter::new(&b"country"[..]).apply(&dynamic).unwrap();
        assert_eq!(got[0].lock().unwrap().name(), b"country");
    }

    #[test]
    fn dynamic_getter_failure_maps_to_other() {
        struct Failing;
        impl DynamicList for Failing {
            fn get(&self, _subkey: &[u8]) -> CoreResult<Vec<FieldRef>> {
                Err(CoreError::Other("backend gone".to_string()))
            }
        }
        let dynamic = Field::dynamic("GEO", Arc::new(Failing)).into_ref();
        assert!(matches!(
            VarFilter::new(&b"country"[..]).apply(&dynamic).unwrap_err(),
            CoreError::Other(_)
        ));
    }

    #[test]
    fn remove_detaches_matches_in_order() {
        let list = args_list();
        let removed = VarFilter::new(&b"user"[..]).remove(&list, true).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].lock().unwrap().as_bytes(), Some(&b"alice"[..]));
        assert_eq!(removed[1].lock().unwrap().as_bytes(), Some(&b"bob"[..]));
        assert_eq!(list.lock().unwrap().as_list().unwrap().len(), 1);
    }

    #[test]
    fn remove_without_match_is_not_found_and_list_unchanged() {
        let list = args_list();
        let err = VarFilter::new(&b"missing"[..]).remove(&list, true).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(list.lock().unwrap().as_list().unwrap().len(), 3);
    }

    #[test]
    fn remove_rejects_dynamic_fields() {
        struct Echo;
        impl DynamicList for Echo {
            fn get(&self, _subkey: &[u8]) -> CoreResult<Vec<FieldRef>> {
                Ok(Vec::new())
            }
        }
        let dynamic = Field::dynamic("GEO", Arc::new(Echo)).into_ref();
        assert!(matches!(
            VarFilter::new(&b"x"[..]).remove(&dynamic, false).unwrap_err(),
            CoreError::InvalidArgument(_)
        ));
    }
}
