// Shared helpers for the integration suites.
#![allow(dead_code)]

use ironbee_rust::core::config::{EngineConfig, VarDeclaration};
use ironbee_rust::core::engine::Engine;
use ironbee_rust::core::field::FieldRef;
use ironbee_rust::core::phase::Phase;
use std::sync::Arc;

/// An engine with the vars a typical HTTP deployment pre-registers.
pub fn http_engine() -> Arc<Engine> {
    let config = EngineConfig {
        vars: vec![
            VarDeclaration {
                name: "REQUEST_METHOD".to_string(),
                initial_phase: Phase::RequestHeader,
                final_phase: Phase::None,
            },
            VarDeclaration {
                name: "REQUEST_URI".to_string(),
                initial_phase: Phase::RequestHeader,
                final_phase: Phase::None,
            },
            VarDeclaration {
                name: "ARGS".to_string(),
                initial_phase: Phase::Request,
                final_phase: Phase::None,
            },
        ],
        ..EngineConfig::default()
    };
    Engine::with_config(config).expect("engine construction")
}

pub fn field_bytes(field: &FieldRef) -> Vec<u8> {
    field
        .lock()
        .unwrap()
        .as_bytes()
        .expect("string-like field")
        .to_vec()
}

pub fn list_bytes(fields: &[FieldRef]) -> Vec<Vec<u8>> {
    fields.iter().map(field_bytes).collect()
}
