//! Engine Configuration
//!
//! Declarative knobs for the rule execution core: the capture collection
//! name, the vars pre-registered into the schema's fast indexed path, and
//! the managed collections selected at engine start. Loadable from YAML
//! or built programmatically.

use crate::core::capture::Capture;
use crate::core::exception::{CoreError, CoreResult};
use crate::core::phase::Phase;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the capture collection (`CAPTURE:0` ... `CAPTURE:9`).
    pub capture_collection: String,

    /// Sources registered into the indexed fast path before any
    /// transaction store exists.
    pub vars: Vec<VarDeclaration>,

    /// Managed collections selected at engine construction and populated
    /// into every transaction.
    pub collections: Vec<CollectionConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capture_collection: Capture::DEFAULT_COLLECTION.to_string(),
            vars: Vec::new(),
            collections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDeclaration {
    pub name: String,
    #[serde(default)]
    pub initial_phase: Phase,
    #[serde(default)]
    pub final_phase: Phase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> CoreResult<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| CoreError::Other(format!("engine config parse error: {e}")))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Other(format!("engine config read error at {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }
}
