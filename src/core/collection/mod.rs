// SPDX-License-Identifier: MIT OR Apache-2.0

//! Managed Collections
//!
//! Named lists whose backing data is produced and persisted by pluggable
//! handlers. Handlers are probed in registration order at selection time;
//! the first to accept owns the collection.

pub mod handlers;

use crate::core::exception::{CoreError, CoreResult};
use crate::core::field::{FieldRef, FieldType};
use crate::core::mem::OpaqueData;
use crate::core::var::VarStore;
use std::fmt::Debug;
use std::sync::Arc;

pub trait CollectionHandler: Debug + Send + Sync {
    /// Handler kind, for diagnostics.
    fn kind(&self) -> &str;

    /// Probe whether this handler backs `name` with the given parameters.
    /// Accept by returning handler data; decline with `None`.
    fn selection(&self, name: &str, params: &[String]) -> CoreResult<Option<OpaqueData>>;

    /// Fill the freshly created list field at transaction start.
    fn populate(&self, name: &str, data: &OpaqueData, list: &FieldRef) -> CoreResult<()>;

    /// Write the list's final state back at transaction end.
    fn persist(&self, name: &str, data: &OpaqueData, list: &FieldRef) -> CoreResult<()>;
}

/// A named list bound to the handler that accepted it.
pub struct ManagedCollection {
    name: String,
    handler: Arc<dyn CollectionHandler>,
    data: OpaqueData,
}

impl ManagedCollection {
    /// Probe `handlers` in order; the first acceptance wins.
    pub fn select(
        handlers: &[Arc<dyn CollectionHandler>],
        name: &str,
        params: &[String],
    ) -> CoreResult<Self> {
        for handler in handlers {
            if let Some(data) = handler.selection(name, params)? {
                tracing::debug!(name, kind = handler.kind(), "collection handler selected");
                return Ok(Self {
                    name: name.to_string(),
                    handler: Arc::clone(handler),
                    data,
                });
            }
        }
        Err(CoreError::NotFound(format!(
            "no collection handler accepts '{name}'"
        )))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler_kind(&self) -> &str {
        self.handler.kind()
    }

    /// Materialize the named list in `store` and fill it. The returned
    /// instance is recorded on the transaction for later persistence.
    pub fn populate(self: &Arc<Self>, store: &mut VarStore) -> CoreResult<ManagedCollectionInstance> {
        let source = store.config().acquire(self.name.as_bytes());
        let list = source.initialize(store, FieldType::List)?;
        self.handler.populate(&self.name, &self.data, &list)?;
        Ok(ManagedCollectionInstance {
            collection: Arc::clone(self),
            field: list,
        })
    }
}

impl Debug for ManagedCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedCollection")
            .field("name", &self.name)
            .field("handler", &self.handler.kind())
            .finish()
    }
}

/// A populated collection recorded on one transaction.
#[derive(Debug)]
pub struct ManagedCollectionInstance {
    collection: Arc<ManagedCollection>,
    field: FieldRef,
}

impl ManagedCollectionInstance {
    pub fn collection(&self) -> &Arc<ManagedCollection> {
        &self.collection
    }

    pub fn field(&self) -> &FieldRef {
        &self.field
    }

    pub fn persist(&self) -> CoreResult<()> {
        self.collection.handler.persist(
            &self.collection.name,
            &self.collection.data,
            &self.field,
        )
    }
}

/// Persist every recorded instance in recording order. Iteration
/// continues past failures; the first error is returned.
pub fn persist_all(instances: &[ManagedCollectionInstance]) -> CoreResult<()> {
    let mut first_error = None;
    for inst in instances {
        if let Err(e) = inst.persist() {
            tracing::warn!(
                collection = inst.collection.name(),
                error = %e,
                "collection persist failed"
            );
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
