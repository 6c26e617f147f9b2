// ironbee_rust/src/core/var/target.rs
use crate::core::exception::{CoreError, CoreResult};
use crate::core::field::{Field, FieldRef, FieldType, FieldValue};
use crate::core::var::config::VarConfig;
use crate::core::var::expand::VarExpand;
use crate::core::var::filter::VarFilter;
use crate::core::var::source::VarSource;
use crate::core::var::store::VarStore;
use std::sync::Arc;

/// The evaluable unit named by the user-level target grammar:
/// a source plus at most one of a static filter or an expand.
///
/// With an expand the effective filter is rebuilt on every evaluation by
/// executing the expand against the current store. With neither, the
/// source's value is wrapped in a one-element list on read.
/// `acquire_from_string` only ever produces the expand form; the static
/// filter form remains available to programmatic callers.
#[derive(Debug, Clone)]
pub struct VarTarget {
    source: Arc<VarSource>,
    expand: Option<VarExpand>,
    filter: Option<VarFilter>,
}

impl VarTarget {
    pub fn new(
        source: Arc<VarSource>,
        expand: Option<VarExpand>,
        filter: Option<VarFilter>,
    ) -> CoreResult<Self> {
        if expand.is_some() && filter.is_some() {
            return Err(CoreError::InvalidArgument(
                "target carries both an expand and a static filter".to_string(),
            ));
        }
        Ok(Self {
            source,
            expand,
            filter,
        })
    }

    /// Parse `NAME[:FILTER]`. The name runs to the first `:` and must be
    /// non-empty; a trailing `:` with an empty filter is the trivial
    /// target. The filter part may itself contain `%{...}`.
    pub fn acquire_from_string(config: &Arc<VarConfig>, s: &[u8]) -> CoreResult<Self> {
        let colon = s.iter().position(|&b| b == b':');
        let (name, filter_part) = match colon {
            Some(i) => (&s[..i], Some(&s[i + 1..])),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(CoreError::InvalidArgument(
                "target name is empty".to_string(),
            ));
        }
        let source = config.acquire(name);
        match filter_part {
            None => Self::new(source, None, None),
            Some(fp) if fp.is_empty() => Self::new(source, None, None),
            Some(fp) => {
                let expand = VarExpand::acquire(config, fp)?;
                Self::new(source, Some(expand), None)
            }
        }
    }

    pub fn source(&self) -> &Arc<VarSource> {
        &self.source
    }

    /// The name before the first `:` of the originating target string.
    pub fn source_name(&self) -> &[u8] {
        self.source.name()
    }

    fn resolved_filter(&self, store: &VarStore) -> Option<VarFilter> {
        match &self.expand {
            Some(expand) => Some(VarFilter::new(expand.execute(store))),
            None => self.filter.clone(),
        }
    }

    /// Freeze any expand into a static filter against the current store.
    /// Used to evaluate the filter once and reuse it across a
    /// remove-then-set sequence.
    pub fn expanded(&self, store: &VarStore) -> Self {
        match &self.expand {
            Some(expand) => Self {
                source: Arc::clone(&self.source),
                expand: None,
                filter: Some(VarFilter::new(expand.execute(store))),
            },
            None => self.clone(),
        }
    }

    /// Evaluate: filtered children, a list's own children, or the scalar
    /// wrapped in a one-element list.
    pub fn get(&self, store: &VarStore) -> CoreResult<Vec<FieldRef>> {
        let field = self.source.get(store)?;
        match self.resolved_filter(store) {
            Some(filter) => filter.apply(&field),
            None => {
                let guard = field.lock().expect("Mutex poisoned");
                match &guard.value {
                    FieldValue::List(children) => Ok(children.clone()),
                    FieldValue::Dynamic(getter) => getter.get(&[]).map_err(|e| {
                        CoreError::Other(format!(
                            "dynamic field '{}' failed: {e}",
                            String::from_utf8_lossy(guard.name())
                        ))
                    }),
                    _ => Ok(vec![Arc::clone(&field)]),
                }
            }
        }
    }

    /// The type a `get` would produce: `List` whenever a filter or expand
    /// is present, the underlying field's type otherwise.
    pub fn ftype(&self, store: &VarStore) -> CoreResult<FieldType> {
        if self.expand.is_some() || self.filter.is_some() {
            return Ok(FieldType::List);
        }
        let field = self.source.get(store)?;
        let t = field.lock().expect("Mutex poisoned").ftype();
        Ok(t)
    }

    /// Write through the target. Without a filter this is a plain source
    /// set; with one, the supplied field is relabeled with the filter
    /// string and pushed onto the source's list.
    pub fn set(&self, store: &mut VarStore, field: Field) -> CoreResult<()> {
        let Some(filter) = self.resolved_filter(store) else {
            self.source.set(store, field)?;
            return Ok(());
        };
        let list = match self.source.get(store) {
            Ok(list) => list,
            Err(CoreError::NotFound(_)) => self.source.initialize(store, FieldType::List)?,
            Err(e) => return Err(e),
        };
        let mut guard = list.lock().expect("Mutex poisoned");
        if guard.is_dynamic() {
            return Err(CoreError::InvalidArgument(format!(
                "set through filter on dynamic field '{}'",
                String::from_utf8_lossy(guard.name())
            )));
        }
        let source_name = String::from_utf8_lossy(self.source.name()).into_owned();
        let children = guard.as_list_mut().ok_or_else(|| {
            CoreError::InvalidArgument(format!(
                "set through filter on non-list field '{source_name}'"
            ))
        })?;
        let mut field = field;
        field.rename(filter.filter_string().to_vec());
        children.push(field.into_ref());
        Ok(())
    }

    /// Detach what `get` would return. Without a filter, the whole slot is
    /// unset and the detached field returned.
    pub fn remove(&self, store: &mut VarStore) -> CoreResult<Vec<FieldRef>> {
        match self.resolved_filter(store) {
            Some(filter) => {
                let field = self.source.get(store)?;
                filter.remove(&field, true)
            }
            None => {
                let field = self.source.get(store)?;
                self.source.unset(store)?;
                Ok(vec![field])
            }
        }
    }

    /// Remove-then-set with the filter evaluated exactly once. A removal
    /// that matches nothing is tolerated.
    pub fn remove_and_set(&self, store: &mut VarStore, field: Field) -> CoreResult<()> {
        let frozen = self.expanded(store);
        match frozen.remove(store) {
            Ok(_) | Err(CoreError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        frozen.set(store, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::phase::Phase;

    fn fixture() -> (Arc<VarConfig>, VarStore) {
        let config = VarConfig::new();
        let method = config
            .register(b"REQUEST_METHOD", Phase::RequestHeader, Phase::None)
            .unwrap();
        let args = config
            .register(b"ARGS", Phase::Request, Phase::None)
            .unwrap();
        let mut store = VarStore::new(&config);
        method
            .set(&mut store, Field::bytes("REQUEST_METHOD", "GET"))
            .unwrap();
        args.append(&mut store, Field::bytes("user", "alice")).unwrap();
        args.append(&mut store, Field::bytes("user", "bob")).unwrap();
        args.append(&mut store, Field::bytes("pass", "x")).unwrap();
        (config, store)
    }

    #[test]
    fn scalar_target_wraps_in_one_element_list() {
        let (config, store) = fixture();
        let target = VarTarget::acquire_from_string(&config, b"REQUEST_METHOD").unwrap();
        let got = target.get(&store).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].lock().unwrap().as_bytes(), Some(&b"GET"[..]));
        assert_eq!(target.ftype(&store).unwrap(), FieldType::Bytes);
    }

    #[test]
    fn filtered_target_selects_children_in_append_order() {
        let (config, store) = fixture();
        let target = VarTarget::acquire_from_string(&config, b"ARGS:user").unwrap();
        let got = target.get(&store).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].lock().unwrap().as_bytes(), Some(&b"alice"[..]));
        assert_eq!(got[1].lock().unwrap().as_bytes(), Some(&b"bob"[..]));
        assert_eq!(target.ftype(&store).unwrap(), FieldType::List);
    }

    #[test]
    fn expanded_filter_reads_the_current_store() {
        let (config, mut store) = fixture();
        let which = config.acquire(b"WHICH");
        which
            .set(&mut store, Field::bytes("WHICH", "user"))
            .unwrap();
        let target = VarTarget::acquire_from_string(&config, b"ARGS:%{WHICH}").unwrap();
        assert_eq!(target.get(&store).unwrap().len(), 2);
        which
            .set(&mut store, Field::bytes("WHICH", "pass"))
            .unwrap();
        assert_eq!(target.get(&store).unwrap().len(), 1);
    }

    #[test]
    fn empty_name_is_invalid() {
        let config = VarConfig::new();
        let err = VarTarget::acquire_from_string(&config, b":filter").unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn trailing_colon_is_the_trivial_target() {
        let (config, store) = fixture();
        let target = VarTarget::acquire_from_string(&config, b"REQUEST_METHOD:").unwrap();
        let got = target.get(&store).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(target.ftype(&store).unwrap(), FieldType::Bytes);
    }

    #[test]
    fn both_expand_and_filter_rejected() {
        let config = VarConfig::new();
        let source = config.acquire(b"X");
        let expand = VarExpand::acquire(&config, b"f").unwrap();
        let err =
            VarTarget::new(source, Some(expand), Some(VarFilter::new(&b"f"[..]))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn set_without_filter_overwrites_the_slot() {
        let (config, mut store) = fixture();
        let target = VarTarget::acquire_from_string(&config, b"REQUEST_METHOD").unwrap();
        target
            .set(&mut store, Field::bytes("x", "POST"))
            .unwrap();
        let got = target.get(&store).unwrap();
        assert_eq!(got[0].lock().unwrap().as_bytes(), Some(&b"POST"[..]));
        assert_eq!(got[0].lock().unwrap().name(), b"REQUEST_METHOD");
    }

    #[test]
    fn set_with_filter_relabels_and_appends() {
        let (config, mut store) = fixture();
        let target = VarTarget::acquire_from_string(&config, b"ARGS:user").unwrap();
        target.set(&mut store, Field::bytes("x", "carol")).unwrap();
        let got = target.get(&store).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[2].lock().unwrap().name(), b"user");
        assert_eq!(got[2].lock().unwrap().as_bytes(), Some(&b"carol"[..]));
    }

    #[test]
    fn set_with_filter_materializes_missing_list() {
        let (config, mut store) = fixture();
        let target = VarTarget::acquire_from_string(&config, b"HEADERS:host").unwrap();
        target
            .set(&mut store, Field::bytes("x", "example.com"))
            .unwrap();
        assert_eq!(target.get(&store).unwrap().len(), 1);
    }

    #[test]
    fn remove_without_filter_unsets_the_slot() {
        let (config, mut store) = fixture();
        let target = VarTarget::acquire_from_string(&config, b"REQUEST_METHOD").unwrap();
        let removed = target.remove(&mut store).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(matches!(
            target.get(&store).unwrap_err(),
            CoreError::NotFound(_)
        ));
    }

    #[test]
    fn remove_and_set_replaces_matches() {
        let (config, mut store) = fixture();
        let target = VarTarget::acquire_from_string(&config, b"ARGS:user").unwrap();
        target
            .remove_and_set(&mut store, Field::bytes("x", "carol"))
            .unwrap();
        let got = target.get(&store).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].lock().unwrap().as_bytes(), Some(&b"carol"[..]));
    }

    #[test]
    fn remove_and_set_tolerates_absent_matches() {
        let (config, mut store) = fixture();
        let target = VarTarget::acquire_from_string(&config, b"ARGS:missing").unwrap();
        target.remove_and_set(&mut store, Field::bytes("x", "v")).unwrap();
        assert_eq!(target.get(&store).unwrap().len(), 1);
    }

    #[test]
    fn acquire_twice_evaluates_identically() {
        let (config, store) = fixture();
        let a = VarTarget::acquire_from_string(&config, b"ARGS:user").unwrap();
        let b = VarTarget::acquire_from_string(&config, b"ARGS:user").unwrap();
        let left: Vec<_> = a
            .get(&store)
            .unwrap()
            .iter()
            .map(|f| f.lock().unwrap().as_bytes().unwrap().to_vec())
            .collect();
        let right: Vec<_> = b
            .get(&store)
            .unwrap()
            .iter()
            .map(|f| f.lock().unwrap().as_bytes().unwrap().to_vec())
            .collect();
        assert_eq!(left, right);
    }

    #[test]
    fn source_name_round_trips_the_prefix() {
        let config = VarConfig::new();
        let target = VarTarget::acquire_from_string(&config, b"ARGS:user").unwrap();
        assert_eq!(target.source_name(), b"ARGS");
    }
}
