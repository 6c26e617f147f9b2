// ironbee_rust/src/core/var/source.rs
use crate::core::exception::{CoreError, CoreResult};
use crate::core::field::{Field, FieldRef, FieldType};
use crate::core::phase::Phase;
use crate::core::util::NameKey;
use crate::core::var::store::VarStore;
use uuid::Uuid;

/// A handle to one named slot.
///
/// Registered sources carry a dense index into every store built from
/// their config; ad-hoc sources resolve through the store's name hash
/// only. The phases identify the earliest and latest points at which the
/// slot's value is stable (`Phase::None` as final phase means open-ended).
#[derive(Debug)]
pub struct VarSource {
    config_id: Uuid,
    name: Vec<u8>,
    initial_phase: Phase,
    final_phase: Phase,
    index: Option<usize>,
}

impl VarSource {
    pub(crate) fn new_indexed(
        config_id: Uuid,
        name: Vec<u8>,
        initial_phase: Phase,
        final_phase: Phase,
        index: usize,
    ) -> Self {
        Self {
            config_id,
            name,
            initial_phase,
            final_phase,
            index: Some(index),
        }
    }

    pub(crate) fn new_unindexed(config_id: Uuid, name: Vec<u8>) -> Self {
        Self {
            config_id,
            name,
            initial_phase: Phase::None,
            final_phase: Phase::None,
            index: None,
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn initial_phase(&self) -> Phase {
        self.initial_phase
    }

    pub fn final_phase(&self) -> Phase {
        self.final_phase
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    fn check_store(&self, store: &VarStore) -> CoreResult<()> {
        if store.config().id() != self.config_id {
            return Err(CoreError::InvalidArgument(format!(
                "source '{}' paired with a store from another config",
                String::from_utf8_lossy(&self.name)
            )));
        }
        Ok(())
    }

    /// Fetch this source's field. Indexed sources cost one array lookup.
    pub fn get(&self, store: &VarStore) -> CoreResult<FieldRef> {
        self.check_store(store)?;
        let missing = || CoreError::NotFound(String::from_utf8_lossy(&self.name).into_owned());
        match self.index {
            Some(i) => store.slot(i).ok_or_else(missing),
            None => store.named(&self.name).ok_or_else(missing),
        }
    }

    /// Install a field in this slot.
    ///
    /// The field's name is rewritten to this source's canonical bytes;
    /// this is the only place a field's name mutates. Indexed sources
    /// update the hash and the dense array together.
    pub fn set(&self, store: &mut VarStore, field: Field) -> CoreResult<FieldRef> {
        self.check_store(store)?;
        let mut field = field;
        field.rename(self.name.clone());
        let fref = field.into_ref();
        store.install(
            NameKey::new(self.name.clone()),
            self.index,
            Some(fref.clone()),
        );
        Ok(fref)
    }

    /// Empty the slot; the inverse of `set`.
    pub fn unset(&self, store: &mut VarStore) -> CoreResult<()> {
        self.check_store(store)?;
        store.install(NameKey::new(self.name.clone()), self.index, None);
        Ok(())
    }

    /// Materialize the slot with a typed default value.
    pub fn initialize(&self, store: &mut VarStore, ftype: FieldType) -> CoreResult<FieldRef> {
        self.set(store, Field::default_of(self.name.clone(), ftype))
    }

    /// Push a child onto this slot's list, materializing an empty list on
    /// first use. An existing non-list slot is incompatible.
    pub fn append(&self, store: &mut VarStore, child: Field) -> CoreResult<()> {
        let list = match self.get(store) {
            Ok(f) => f,
            Err(CoreError::NotFound(_)) => self.initialize(store, FieldType::List)?,
            Err(e) => return Err(e),
        };
        let mut guard = list.lock().expect("Mutex poisoned");
        match guard.as_list_mut() {
            Some(children) => {
                children.push(child.into_ref());
                Ok(())
            }
            None => Err(CoreError::Incompatible(format!(
                "append to non-list slot '{}'",
                String::from_utf8_lossy(&self.name)
            ))),
        }
    }
}
