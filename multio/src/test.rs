use std::path::PathBuf;
use std::rc::Rc;

use serde_json::json;
use static_assertions::{assert_impl_all, assert_not_impl_any};

use crate::dummy::{Call, DummyHandle, Operation, ResourceId, DUMMY_VERSION};
use crate::*;

fn setup() -> (Rc<DummyBackend>, Multio<DummyBackend>) {
    let backend = Rc::new(DummyBackend::new());
    let mio = Multio::with_backend(backend.clone(), Some(Config::new())).unwrap();
    (backend, mio)
}

fn count(backend: &DummyBackend, operation: Operation) -> usize {
    backend
        .calls()
        .iter()
        .filter(|call| call.operation() == operation)
        .count()
}

#[test]
fn test_error_is_sync_send() {
    assert_impl_all!(Error: Send, Sync);
    assert_not_impl_any!(Multio<DummyBackend>: Send, Sync);
}

#[test]
fn test_handles_are_unique() {
    assert_not_impl_any!(DummyHandle: Clone, Copy);
}

#[cfg(feature = "native")]
#[test]
fn test_native_handles_are_unique() {
    use crate::native::{NativeConfig, NativeMetadata, NativeSession};

    assert_not_impl_any!(NativeConfig: Clone, Copy);
    assert_not_impl_any!(NativeSession: Clone, Copy);
    assert_not_impl_any!(NativeMetadata: Clone, Copy);
}

#[test]
fn test_release_consumes_handle() {
    let backend = DummyBackend::new();

    let cc = backend.new_configuration(None).unwrap();
    let mio = backend.new_handle(&cc).unwrap();
    let md = backend.new_metadata(&mio).unwrap();
    let ids = (cc.id(), mio.id(), md.id());

    backend.delete_metadata(md).unwrap();
    backend.delete_handle(mio).unwrap();
    backend.delete_configuration(cc).unwrap();

    assert_eq!(ids, (ResourceId(1), ResourceId(2), ResourceId(3)));
    assert_eq!(backend.live_resources(), 0);
}

#[test]
fn test_missing_config() {
    let backend = Rc::new(DummyBackend::new());

    let e = Multio::with_backend(backend.clone(), None);
    assert!(matches!(e, Err(Error::MissingConfig)));
    assert!(backend.calls().is_empty());

    assert!(matches!(Multio::new(None), Err(Error::MissingConfig)));
    assert!(matches!(Multio::from_value(None), Err(Error::MissingConfig)));
}

#[test]
fn test_construction_order() {
    let (backend, mio) = setup();

    assert_eq!(
        backend.calls(),
        vec![
            Call::NewConfiguration {
                id: ResourceId(1),
                file: None
            },
            Call::NewHandle {
                id: ResourceId(2),
                config: ResourceId(1)
            },
        ]
    );
    assert_eq!(mio.connection_state(), ConnectionState::Idle);
    assert!(mio.metadata().is_none());
}

#[test]
fn test_no_metadata() {
    let (backend, mio) = setup();

    assert!(matches!(mio.flush(), Err(Error::NoMetadata)));
    assert!(matches!(mio.notify(), Err(Error::NoMetadata)));
    assert!(matches!(mio.write_domain(&[1, 2]), Err(Error::NoMetadata)));
    assert!(matches!(mio.write_mask(&[1.0f32]), Err(Error::NoMetadata)));
    assert!(matches!(mio.write_field(&[1.0f64]), Err(Error::NoMetadata)));
    assert!(matches!(mio.field_accepted(true), Err(Error::NoMetadata)));

    // Only the construction calls went through.
    assert_eq!(backend.calls().len(), 2);
}

#[test]
fn test_metadata_ready() {
    let (backend, mut mio) = setup();

    mio.create_metadata(None).unwrap();
    mio.flush().unwrap();
    mio.notify().unwrap();

    let calls = backend.calls();
    assert_eq!(
        calls[2],
        Call::NewMetadata {
            id: ResourceId(3),
            session: ResourceId(2)
        }
    );
    assert_eq!(
        calls[3],
        Call::Flush {
            session: ResourceId(2),
            metadata: ResourceId(3)
        }
    );
    assert_eq!(
        calls[4],
        Call::Notify {
            session: ResourceId(2),
            metadata: ResourceId(3)
        }
    );
}

#[test]
fn test_forwarded_lengths() {
    let (backend, mut mio) = setup();
    mio.create_metadata(None).unwrap();
    backend.clear_calls();

    let domain: Vec<i32> = (0..17).collect();
    let single: Vec<f32> = vec![0.5; 17];
    let double: Vec<f64> = vec![0.25; 17];

    for n in [0usize, 1, 17] {
        mio.write_domain(&domain[..n]).unwrap();
        mio.write_mask(&single[..n]).unwrap();
        mio.write_mask(&double[..n]).unwrap();
        mio.write_field(&single[..n]).unwrap();
        mio.write_field(&double[..n]).unwrap();
    }

    let (session, metadata) = (ResourceId(2), ResourceId(3));
    let mut expected = Vec::new();
    for len in [0usize, 1, 17] {
        expected.push(Call::WriteDomain {
            session,
            metadata,
            len,
        });
        expected.push(Call::WriteMask {
            session,
            metadata,
            len,
            precision: Precision::Single,
        });
        expected.push(Call::WriteMask {
            session,
            metadata,
            len,
            precision: Precision::Double,
        });
        expected.push(Call::WriteField {
            session,
            metadata,
            len,
            precision: Precision::Single,
        });
        expected.push(Call::WriteField {
            session,
            metadata,
            len,
            precision: Precision::Double,
        });
    }
    assert_eq!(backend.calls(), expected);
}

#[test]
fn test_connections() {
    let (backend, mut mio) = setup();

    mio.open_connections().unwrap();
    assert_eq!(mio.connection_state(), ConnectionState::Open);
    assert!(matches!(mio.open_connections(), Err(Error::AlreadyOpen)));
    assert_eq!(count(&backend, Operation::OpenConnections), 1);

    mio.close_connections().unwrap();
    mio.close_connections().unwrap();
    assert_eq!(mio.connection_state(), ConnectionState::Closed);
    assert_eq!(count(&backend, Operation::CloseConnections), 1);

    mio.open_connections().unwrap();
    assert_eq!(count(&backend, Operation::OpenConnections), 2);
}

#[test]
fn test_transfer_needs_connections() {
    let (backend, mut mio) = setup();
    mio.create_metadata(None).unwrap();

    // Writing before an explicit open is allowed.
    mio.write_field(&[1.0f32, 2.0]).unwrap();

    mio.close_connections().unwrap();
    assert!(matches!(mio.flush(), Err(Error::ConnectionsClosed)));
    assert!(matches!(mio.notify(), Err(Error::ConnectionsClosed)));
    assert!(matches!(
        mio.write_field(&[1.0f32]),
        Err(Error::ConnectionsClosed)
    ));
    assert!(matches!(
        mio.write_encoded(b"GRIB"),
        Err(Error::ConnectionsClosed)
    ));
    assert!(matches!(
        mio.field_accepted(false),
        Err(Error::ConnectionsClosed)
    ));
    assert_eq!(count(&backend, Operation::Flush), 0);

    mio.open_connections().unwrap();
    mio.flush().unwrap();
}

#[test]
fn test_native_failures() {
    let (backend, mut mio) = setup();
    mio.create_metadata(None).unwrap();

    backend.fail(Operation::Flush);
    match mio.flush() {
        Err(Error::Flush(e)) => assert_eq!(e.status, NativeStatus::GeneralException),
        other => panic!("Unexpected result {:?}", other),
    }
    backend.recover(Operation::Flush);
    mio.flush().unwrap();

    backend.fail(Operation::Notify);
    assert!(matches!(mio.notify(), Err(Error::Notify(_))));

    backend.fail(Operation::WriteDomain);
    backend.fail(Operation::WriteMask);
    backend.fail(Operation::WriteField);
    backend.fail(Operation::WriteEncoded);
    assert!(matches!(
        mio.write_domain(&[1]),
        Err(Error::Write {
            kind: WriteKind::Domain,
            ..
        })
    ));
    assert!(matches!(
        mio.write_mask(&[1.0f64]),
        Err(Error::Write {
            kind: WriteKind::Mask,
            ..
        })
    ));
    assert!(matches!(
        mio.write_field(&[1.0f64]),
        Err(Error::Write {
            kind: WriteKind::Field,
            ..
        })
    ));
    assert!(matches!(
        mio.write_encoded(&[0u8; 8]),
        Err(Error::Write {
            kind: WriteKind::Encoded,
            ..
        })
    ));

    backend.fail(Operation::StartServer);
    assert!(matches!(mio.start_server(), Err(Error::ServerStart(_))));
    assert!(!mio.session().configuration().server_started());

    backend.fail(Operation::OpenConnections);
    assert!(matches!(mio.open_connections(), Err(Error::Connection(_))));
    assert_eq!(mio.connection_state(), ConnectionState::Idle);

    backend.fail(Operation::NewMetadata);
    assert!(matches!(
        mio.create_metadata(None),
        Err(Error::MetadataCreate(_))
    ));
    // The previous metadata survives a failed replacement.
    assert!(mio.metadata().is_some());

    backend.fail(Operation::Version);
    assert!(matches!(mio.version(), Err(Error::Version(_))));
}

#[test]
fn test_failures_keep_state() {
    let (backend, mut mio) = setup();
    mio.open_connections().unwrap();

    backend.fail(Operation::CloseConnections);
    assert!(matches!(mio.close_connections(), Err(Error::Connection(_))));
    assert_eq!(mio.connection_state(), ConnectionState::Open);

    backend.fail(Operation::ConfigSetPath);
    assert!(matches!(
        mio.set_conf_path("/srv/plans"),
        Err(Error::ConfigCreate(_))
    ));
    assert_eq!(mio.session().configuration().conf_path(), None);

    mio.create_metadata(None).unwrap();
    backend.fail(Operation::CopyMetadata);
    let metadata = mio.metadata().unwrap();
    assert!(matches!(metadata.try_clone(), Err(Error::MetadataCreate(_))));
    assert_eq!(backend.live_resources(), 3);

    backend.fail(Operation::FieldAccepted);
    match mio.field_accepted(true) {
        Err(e @ Error::FieldAccepted(_)) => {
            assert_eq!(e.native().map(|e| e.status), Some(NativeStatus::GeneralException))
        }
        other => panic!("Unexpected result {:?}", other),
    }

    backend.fail(Operation::VcsVersion);
    assert!(matches!(mio.vcs_version(), Err(Error::Version(_))));
    assert_eq!(mio.version().unwrap(), DUMMY_VERSION);
}

#[test]
fn test_failed_field_releases_metadata() {
    let (backend, mut mio) = setup();

    backend.fail(Operation::MetadataSet);
    assert!(matches!(
        mio.create_metadata(Some(Fields::new().with("step", 6))),
        Err(Error::MetadataCreate(_))
    ));

    assert!(mio.metadata().is_none());
    assert!(backend
        .calls()
        .contains(&Call::DeleteMetadata { id: ResourceId(3) }));
    // Only the configuration and the session are left.
    assert_eq!(backend.live_resources(), 2);
}

#[test]
fn test_construction_failures() {
    let backend = Rc::new(DummyBackend::new());

    backend.fail(Operation::NewConfiguration);
    assert!(matches!(
        Multio::with_backend(backend.clone(), Some(Config::new())),
        Err(Error::ConfigCreate(_))
    ));
    backend.recover(Operation::NewConfiguration);

    backend.fail(Operation::NewHandle);
    let e = Multio::with_backend(backend.clone(), Some(Config::new())).err();
    assert!(matches!(e, Some(Error::SessionCreate(_))));
    assert!(e.unwrap().native().is_some());
    backend.recover(Operation::NewHandle);

    backend.fail(Operation::MpiParentComm);
    assert!(matches!(
        Multio::with_backend(backend.clone(), Some(Config::new().with_parent_comm(1))),
        Err(Error::ConfigCreate(_))
    ));

    // Every configuration allocated on the way was released again.
    assert_eq!(backend.live_resources(), 0);
}

#[test]
fn test_config_options_forwarded() {
    let backend = Rc::new(DummyBackend::new());
    let config = Config::new()
        .with_config_path("/opt/multio/share")
        .with_allow_world_default_comm(true)
        .with_parent_comm(12);
    let mut mio = Multio::with_backend(backend.clone(), Some(config)).unwrap();

    let id = ResourceId(1);
    assert_eq!(
        backend.calls(),
        vec![
            Call::NewConfiguration { id, file: None },
            Call::ConfigSetPath {
                id,
                path: PathBuf::from("/opt/multio/share")
            },
            Call::MpiAllowWorldDefaultComm { id, allow: true },
            Call::MpiParentComm {
                id,
                parent_comm: 12
            },
            Call::NewHandle {
                id: ResourceId(2),
                config: id
            },
        ]
    );

    backend.clear_calls();
    mio.set_conf_path("/srv/plans").unwrap();
    mio.start_server().unwrap();
    assert_eq!(
        backend.calls(),
        vec![
            Call::ConfigSetPath {
                id,
                path: PathBuf::from("/srv/plans")
            },
            Call::StartServer { id },
        ]
    );
    let configuration = mio.session().configuration();
    assert_eq!(
        configuration.conf_path(),
        Some(std::path::Path::new("/srv/plans"))
    );
    assert!(configuration.server_started());

    assert!(matches!(
        mio.set_conf_path(""),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_metadata_fields() {
    let (backend, mut mio) = setup();

    let fields = Fields::from_value(&json!({
        "name": "msl",
        "level": 0,
        "levels": [1, 2],
    }))
    .unwrap();
    mio.create_metadata(Some(fields.clone())).unwrap();

    let metadata = mio.metadata().unwrap();
    assert_eq!(metadata.fields(), &fields);
    assert_eq!(backend.metadata_fields(ResourceId(3)), Some(fields.clone()));
    assert_eq!(count(&backend, Operation::MetadataSet), 3);

    let copy = metadata.try_clone().unwrap();
    assert_eq!(copy.fields(), &fields);
    assert_eq!(backend.metadata_fields(ResourceId(4)), Some(fields));
    drop(copy);
    assert_eq!(backend.metadata_fields(ResourceId(4)), None);
}

#[test]
fn test_metadata_replacement_releases_previous() {
    let (backend, mut mio) = setup();

    mio.create_metadata(None).unwrap();
    mio.create_metadata(Some(Fields::new().with("step", 6))).unwrap();

    let calls = backend.calls();
    assert!(calls.contains(&Call::DeleteMetadata { id: ResourceId(3) }));
    assert_eq!(backend.metadata_fields(ResourceId(3)), None);
    assert!(backend.metadata_fields(ResourceId(4)).is_some());

    mio.flush().unwrap();
    assert_eq!(
        backend.calls().last(),
        Some(&Call::Flush {
            session: ResourceId(2),
            metadata: ResourceId(4)
        })
    );
}

#[test]
fn test_release_order() {
    let (backend, mut mio) = setup();
    mio.create_metadata(None).unwrap();
    backend.clear_calls();

    drop(mio);

    assert_eq!(
        backend.calls(),
        vec![
            Call::DeleteMetadata { id: ResourceId(3) },
            Call::DeleteHandle { id: ResourceId(2) },
            Call::DeleteConfiguration { id: ResourceId(1) },
        ]
    );
    assert_eq!(backend.live_resources(), 0);
}

#[test]
fn test_field_accepted() {
    let (backend, mut mio) = setup();
    mio.create_metadata(None).unwrap();

    assert!(mio.field_accepted(true).unwrap());
    assert!(!mio.field_accepted(false).unwrap());
    assert_eq!(
        backend.calls().last(),
        Some(&Call::FieldAccepted {
            session: ResourceId(2),
            metadata: ResourceId(3),
            accepted: false
        })
    );
}

#[test]
fn test_write_encoded_without_metadata() {
    let (backend, mio) = setup();

    mio.write_encoded(b"GRIB....7777").unwrap();
    assert_eq!(
        backend.calls().last(),
        Some(&Call::WriteEncoded {
            session: ResourceId(2),
            len: 12
        })
    );
}

#[test]
fn test_version() {
    let (_, mio) = setup();
    assert_eq!(mio.version().unwrap(), DUMMY_VERSION);
    assert_eq!(mio.vcs_version().unwrap(), DUMMY_VERSION);
}
