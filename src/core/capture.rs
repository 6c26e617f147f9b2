// ironbee_rust/src/core/capture.rs
use crate::core::exception::{CoreError, CoreResult};
use crate::core::field::{Field, FieldRef, FieldType};
use crate::core::util::names_eq;
use crate::core::var::{VarSource, VarStore};
use std::sync::Arc;

const SLOT_NAMES: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];

/// Write a match group into slot `n` of a capture list, replacing any
/// sibling with the same slot name. `None` just clears the slot. Only the
/// low ten indices are addressable.
pub fn set_list_item(list: &FieldRef, n: usize, field: Option<Field>) -> CoreResult<()> {
    if n >= SLOT_NAMES.len() {
        return Err(CoreError::InvalidArgument(format!(
            "capture slot {n} out of range"
        )));
    }
    let slot = SLOT_NAMES[n];
    let mut guard = list.lock().expect("Mutex poisoned");
    let children = guard.as_list_mut().ok_or_else(|| {
        CoreError::Incompatible("capture collection is not a list".to_string())
    })?;
    children.retain(|c| !names_eq(c.lock().expect("Mutex poisoned").name(), slot.as_bytes()));
    if let Some(mut f) = field {
        f.rename(slot.as_bytes().to_vec());
        children.push(f.into_ref());
    }
    Ok(())
}

/// The bounded indexed sub-store for operator match results.
///
/// Backed by a var source named by the installation's capture collection
/// (default `CAPTURE`), holding at most ten children named `"0"`…`"9"`.
#[derive(Debug)]
pub struct Capture {
    source: Arc<VarSource>,
    collection: String,
}

impl Capture {
    pub const DEFAULT_COLLECTION: &'static str = "CAPTURE";

    /// Bind to (and if necessary materialize) the capture collection in
    /// `store`.
    pub fn acquire(store: &mut VarStore, collection: Option<&str>) -> CoreResult<Self> {
        let name = collection.unwrap_or(Self::DEFAULT_COLLECTION).to_string();
        let source = store.config().acquire(name.as_bytes());
        match source.get(store) {
            Ok(existing) => {
                if existing.lock().expect("Mutex poisoned").as_list().is_none() {
                    return Err(CoreError::Incompatible(format!(
                        "capture collection '{name}' exists as a non-list"
                    )));
                }
            }
            Err(CoreError::NotFound(_)) => {
                source.initialize(store, FieldType::List)?;
            }
            Err(e) => return Err(e),
        }
        Ok(Self {
            source,
            collection: name,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Slot name for index `n`; out-of-range indices print as `??`.
    pub fn name(n: usize) -> &'static str {
        SLOT_NAMES.get(n).copied().unwrap_or("??")
    }

    /// `<collection>:<digit>` form used in rule diagnostics.
    pub fn fullname(&self, n: usize) -> String {
        format!("{}:{}", self.collection, Self::name(n))
    }

    pub fn field(&self, store: &VarStore) -> CoreResult<FieldRef> {
        self.source.get(store)
    }

    pub fn clear(&self, store: &mut VarStore) -> CoreResult<()> {
        let list = self.field(store)?;
        let mut guard = list.lock().expect("Mutex poisoned");
        match guard.as_list_mut() {
            Some(children) => {
                children.clear();
                Ok(())
            }
            None => Err(CoreError::Incompatible(
                "capture collection is not a list".to_string(),
            )),
        }
    }

    pub fn set_item(&self, store: &mut VarStore, n: usize, field: Option<Field>) -> CoreResult<()> {
        let list = self.field(store)?;
        set_list_item(&list, n, field)
    }

    /// Append a field under its own name, outside the numbered slots.
    /// Used for named match groups.
    pub fn add_item(&self, store: &mut VarStore, field: Field) -> CoreResult<()> {
        let list = self.field(store)?;
        let mut guard = list.lock().expect("Mutex poisoned");
        let children = guard.as_list_mut().ok_or_else(|| {
            CoreError::Incompatible("capture collection is not a list".to_string())
        })?;
        children.push(field.into_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::var::VarConfig;

    fn store() -> (Arc<VarConfig>, VarStore) {
        let config = VarConfig::new();
        let store = VarStore::new(&config);
        (config, store)
    }

    #[test]
    fn set_item_replaces_same_slot() {
        let (_config, mut s) = store();
        let capture = Capture::acquire(&mut s, None).unwrap();
        capture.clear(&mut s).unwrap();
        capture
            .set_item(&mut s, 3, Some(Field::bytes("m", "abc")))
            .unwrap();
        capture
            .set_item(&mut s, 3, Some(Field::bytes("m", "xyz")))
            .unwrap();
        let list = capture.field(&s).unwrap();
        let guard = list.lock().unwrap();
        let children = guard.as_list().unwrap();
        assert_eq!(children.len(), 1);
        let child = children[0].lock().unwrap();
        assert_eq!(child.name(), b"3");
        assert_eq!(child.as_bytes(), Some(&b"xyz"[..]));
    }

    #[test]
    fn slot_nine_is_valid_slot_ten_is_not() {
        let (_config, mut s) = store();
        let capture = Capture::acquire(&mut s, None).unwrap();
        capture
            .set_item(&mut s, 9, Some(Field::bytes("m", "ok")))
            .unwrap();
        let err = capture
            .set_item(&mut s, 10, Some(Field::bytes("m", "no")))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn clear_empties_the_list() {
        let (_config, mut s) = store();
        let capture = Capture::acquire(&mut s, None).unwrap();
        capture
            .set_item(&mut s, 0, Some(Field::bytes("m", "v")))
            .unwrap();
        capture.clear(&mut s).unwrap();
        let list = capture.field(&s).unwrap();
        assert_eq!(list.lock().unwrap().as_list().unwrap().len(), 0);
    }

    #[test]
    fn names_and_fullnames() {
        let (_config, mut s) = store();
        let capture = Capture::acquire(&mut s, Some("MATCH")).unwrap();
        assert_eq!(Capture::name(0), "0");
        assert_eq!(Capture::name(9), "9");
        assert_eq!(Capture::name(12), "??");
        assert_eq!(capture.fullname(4), "MATCH:4");
        assert_eq!(capture.fullname(11), "MATCH:??");
    }

    #[test]
    fn add_item_appends_under_the_original_name() {
        let (_config, mut s) = store();
        let capture = Capture::acquire(&mut s, None).unwrap();
        capture
            .set_item(&mut s, 0, Some(Field::bytes("m", "v")))
            .unwrap();
        capture.add_item(&mut s, Field::bytes("year", "2024")).unwrap();
        let list = capture.field(&s).unwrap();
        let guard = list.lock().unwrap();
        let children = guard.as_list().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].lock().unwrap().name(), b"year");
    }

    #[test]
    fn custom_collection_is_independent() {
        let (_config, mut s) = store();
        let a = Capture::acquire(&mut s, None).unwrap();
        let b = Capture::acquire(&mut s, Some("MATCH")).unwrap();
        a.set_item(&mut s, 0, Some(Field::bytes("m", "a"))).unwrap();
        let list = b.field(&s).unwrap();
        assert_eq!(list.lock().unwrap().as_list().unwrap().len(), 0);
    }
}
