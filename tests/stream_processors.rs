// Stream processor registry driven the way a body-processing pipeline
// orchestrator uses it: look up the chain for a content type, instantiate
// per transaction, push bytes through.

use ironbee_rust::core::engine::Engine;
use ironbee_rust::core::exception::{CoreError, CoreResult};
use ironbee_rust::core::mem::OpaqueData;
use ironbee_rust::core::stream::{StreamProcessorDef, StreamProcessorInstance};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct LowercaseBody;

impl StreamProcessorDef for LowercaseBody {
    fn execute(
        &self,
        _inst: &StreamProcessorInstance,
        input: &[u8],
        output: &mut Vec<u8>,
    ) -> CoreResult<()> {
        output.extend(input.iter().map(u8::to_ascii_lowercase));
        Ok(())
    }
}

#[derive(Debug)]
struct ByteCounter;

impl StreamProcessorDef for ByteCounter {
    fn create(&self) -> CoreResult<Option<OpaqueData>> {
        Ok(Some(Arc::new(Mutex::new(0usize))))
    }

    fn execute(
        &self,
        inst: &StreamProcessorInstance,
        input: &[u8],
        output: &mut Vec<u8>,
    ) -> CoreResult<()> {
        let counter = inst
            .data()
            .and_then(|d| d.downcast_ref::<Mutex<usize>>())
            .ok_or_else(|| CoreError::Other("counter state missing".to_string()))?;
        *counter.lock().unwrap() += input.len();
        output.extend_from_slice(input);
        Ok(())
    }
}

#[test]
fn chain_for_a_type_runs_in_registration_order() {
    let engine = Engine::new().unwrap();
    let registry = engine.stream_processors();
    registry
        .register("count", &["text/html", "text/plain"], Arc::new(ByteCounter))
        .unwrap();
    registry
        .register("lower", &["text/html"], Arc::new(LowercaseBody))
        .unwrap();

    let names = registry.names_for_type("text/html");
    assert_eq!(names, vec!["count".to_string(), "lower".to_string()]);

    // Instantiate the chain for one transaction and pipe a body chunk
    // through it.
    let tx = engine.new_transaction();
    let chain: Vec<_> = names
        .iter()
        .map(|n| registry.create_instance(n, tx.scope()).unwrap())
        .collect();

    let mut data = b"Hello WORLD".to_vec();
    for stage in &chain {
        let mut out = Vec::new();
        stage.execute(&data, &mut out).unwrap();
        data = out;
    }
    assert_eq!(data, b"hello world");

    let counted = *chain[0]
        .data()
        .unwrap()
        .downcast_ref::<Mutex<usize>>()
        .unwrap()
        .lock()
        .unwrap();
    assert_eq!(counted, 11);
}

#[test]
fn per_transaction_state_is_independent() {
    let engine = Engine::new().unwrap();
    engine
        .stream_processors()
        .register("count", &["application/octet-stream"], Arc::new(ByteCounter))
        .unwrap();

    let tx_a = engine.new_transaction();
    let tx_b = engine.new_transaction();
    let a = engine
        .stream_processors()
        .create_instance("count", tx_a.scope())
        .unwrap();
    let b = engine
        .stream_processors()
        .create_instance("count", tx_b.scope())
        .unwrap();

    let mut sink = Vec::new();
    a.execute(b"12345", &mut sink).unwrap();

    let count_of = |inst: &StreamProcessorInstance| {
        *inst
            .data()
            .unwrap()
            .downcast_ref::<Mutex<usize>>()
            .unwrap()
            .lock()
            .unwrap()
    };
    assert_eq!(count_of(&a), 5);
    assert_eq!(count_of(&b), 0);
}

#[test]
fn unknown_names_and_duplicates() {
    let engine = Engine::new().unwrap();
    let registry = engine.stream_processors();
    registry.register("only", &[], Arc::new(LowercaseBody)).unwrap();

    assert!(matches!(
        registry.register("only", &[], Arc::new(LowercaseBody)).unwrap_err(),
        CoreError::InvalidArgument(_)
    ));

    let tx = engine.new_transaction();
    assert!(matches!(
        registry.create_instance("absent", tx.scope()).unwrap_err(),
        CoreError::NotFound(_)
    ));
    assert!(registry.names_for_type("video/mp4").is_empty());
}
