use std::io::Write;
use std::rc::Rc;
use std::sync::Once;

use multio::dummy::{Call, Operation};
use multio::{Config, DummyBackend, Error, Fields, Multio, Precision};
use serde_json::json;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn multio(options: serde_json::Value) -> (Rc<DummyBackend>, Multio<DummyBackend>) {
    init_tracing();
    let backend = Rc::new(DummyBackend::new());
    let config = Config::from_value(&options).unwrap();
    let mio = Multio::with_backend(backend.clone(), Some(config)).unwrap();
    (backend, mio)
}

#[test]
fn test_write_field_then_flush() {
    let (backend, mut mio) = multio(json!({}));

    mio.create_metadata(None).unwrap();
    mio.write_field(&[1.0f64, 2.0, 3.0]).unwrap();

    match backend.calls().last() {
        Some(Call::WriteField { len, precision, .. }) => {
            assert_eq!(*len, 3);
            assert_eq!(*precision, Precision::Double);
        }
        other => panic!("Unexpected call {:?}", other),
    }

    mio.flush().unwrap();
    assert_eq!(
        backend.calls().last().map(Call::operation),
        Some(Operation::Flush)
    );
}

#[test]
fn test_missing_config_before_native_call() {
    init_tracing();
    let backend = Rc::new(DummyBackend::new());

    assert!(matches!(
        Multio::with_backend(backend.clone(), None),
        Err(Error::MissingConfig)
    ));
    assert!(backend.calls().is_empty());
    assert_eq!(backend.live_resources(), 0);
}

#[test]
fn test_flush_and_notify_need_metadata() {
    let (_, mut mio) = multio(json!({}));

    assert!(matches!(mio.flush(), Err(Error::NoMetadata)));
    assert!(matches!(mio.notify(), Err(Error::NoMetadata)));

    mio.create_metadata(None).unwrap();
    assert!(mio.flush().is_ok());
    assert!(mio.notify().is_ok());
}

#[test]
fn test_double_close() {
    let (_, mut mio) = multio(json!({}));

    mio.open_connections().unwrap();
    assert!(mio.close_connections().is_ok());
    assert!(mio.close_connections().is_ok());
}

#[test]
fn test_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "plans:").unwrap();
    writeln!(file, "  - name: passthrough").unwrap();

    let (backend, _mio) = multio(json!({
        "config_file": file.path(),
        "parent_comm": 91,
    }));

    match &backend.calls()[0] {
        Call::NewConfiguration { file: Some(path), .. } => assert_eq!(path, file.path()),
        other => panic!("Unexpected call {:?}", other),
    }
}

#[test]
fn test_invalid_config() {
    init_tracing();

    assert!(matches!(
        Config::from_value(&json!({"server": "tcp://localhost"})),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        Multio::from_value(Some(&json!(["not", "a", "mapping"]))),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_write_cycle() {
    let (backend, mut mio) = multio(json!({"config_path": "/opt/multio"}));
    mio.open_connections().unwrap();

    let domain: Vec<i32> = (0..64).collect();
    let fields = Fields::new()
        .with("name", "grid")
        .with("category", "ocean-domain-map");
    mio.create_metadata(Some(fields)).unwrap();
    mio.write_domain(&domain).unwrap();

    let mask = vec![1.0f32; 64];
    let fields = Fields::new().with("name", "T").with("category", "ocean-mask");
    mio.create_metadata(Some(fields)).unwrap();
    mio.write_mask(&mask).unwrap();

    for step in 0..3 {
        let fields = Fields::from_value(&json!({
            "name": "sst",
            "step": step,
            "domain": "grid",
        }))
        .unwrap();
        mio.create_metadata(Some(fields)).unwrap();
        if mio.field_accepted(true).unwrap() {
            let values: Vec<f32> = (0..64).map(|i| i as f32 * 0.5).collect();
            mio.write_field(&values).unwrap();
        }
        mio.notify().unwrap();
    }

    mio.flush().unwrap();
    mio.close_connections().unwrap();
    drop(mio);

    let calls = backend.calls();
    let writes = calls
        .iter()
        .filter(|call| call.operation() == Operation::WriteField)
        .count();
    assert_eq!(writes, 3);
    assert_eq!(backend.live_resources(), 0);
}
