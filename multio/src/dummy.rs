//! An in-process backend that accepts every call.
//!
//! This mirrors building the C API with `MULTIO_DUMMY_API`: nothing is
//! written anywhere, every call succeeds and the version is reported as
//! `MULTIO DUMMY API`. Unlike the C dummy, every forwarded call is recorded,
//! handles are tracked so double releases are caught, and single operations
//! can be made to fail, which makes it the stub the tests run against.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::backend::{Backend, Precision, Values};
use crate::error::{NativeError, NativeResult, NativeStatus};
use crate::metadata::{Fields, MetadataValue};

pub const DUMMY_VERSION: &str = "MULTIO DUMMY API";

/// Identifier of a resource in the dummy's resource table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ResourceId(pub u64);

/// A handle owned by one wrapper, like the native pointers it stands in for.
#[derive(PartialEq, Eq, Debug)]
pub struct DummyHandle(ResourceId);

impl DummyHandle {
    pub fn id(&self) -> ResourceId {
        self.0
    }
}

/// Native entry points, used to select which call should fail.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Operation {
    Version,
    VcsVersion,
    NewConfiguration,
    DeleteConfiguration,
    ConfigSetPath,
    MpiAllowWorldDefaultComm,
    MpiParentComm,
    StartServer,
    NewHandle,
    DeleteHandle,
    OpenConnections,
    CloseConnections,
    NewMetadata,
    CopyMetadata,
    DeleteMetadata,
    MetadataSet,
    Flush,
    Notify,
    WriteDomain,
    WriteMask,
    WriteField,
    WriteEncoded,
    FieldAccepted,
}

/// A call that reached the backend, with the arguments it carried.
#[derive(Clone, PartialEq, Debug)]
pub enum Call {
    Version,
    VcsVersion,
    NewConfiguration { id: ResourceId, file: Option<PathBuf> },
    DeleteConfiguration { id: ResourceId },
    ConfigSetPath { id: ResourceId, path: PathBuf },
    MpiAllowWorldDefaultComm { id: ResourceId, allow: bool },
    MpiParentComm { id: ResourceId, parent_comm: i32 },
    StartServer { id: ResourceId },
    NewHandle { id: ResourceId, config: ResourceId },
    DeleteHandle { id: ResourceId },
    OpenConnections { id: ResourceId },
    CloseConnections { id: ResourceId },
    NewMetadata { id: ResourceId, session: ResourceId },
    CopyMetadata { id: ResourceId, from: ResourceId },
    DeleteMetadata { id: ResourceId },
    MetadataSet { id: ResourceId, key: String, value: MetadataValue },
    Flush { session: ResourceId, metadata: ResourceId },
    Notify { session: ResourceId, metadata: ResourceId },
    WriteDomain { session: ResourceId, metadata: ResourceId, len: usize },
    WriteMask { session: ResourceId, metadata: ResourceId, len: usize, precision: Precision },
    WriteField { session: ResourceId, metadata: ResourceId, len: usize, precision: Precision },
    WriteEncoded { session: ResourceId, len: usize },
    FieldAccepted { session: ResourceId, metadata: ResourceId, accepted: bool },
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::Version => Operation::Version,
            Call::VcsVersion => Operation::VcsVersion,
            Call::NewConfiguration { .. } => Operation::NewConfiguration,
            Call::DeleteConfiguration { .. } => Operation::DeleteConfiguration,
            Call::ConfigSetPath { .. } => Operation::ConfigSetPath,
            Call::MpiAllowWorldDefaultComm { .. } => Operation::MpiAllowWorldDefaultComm,
            Call::MpiParentComm { .. } => Operation::MpiParentComm,
            Call::StartServer { .. } => Operation::StartServer,
            Call::NewHandle { .. } => Operation::NewHandle,
            Call::DeleteHandle { .. } => Operation::DeleteHandle,
            Call::OpenConnections { .. } => Operation::OpenConnections,
            Call::CloseConnections { .. } => Operation::CloseConnections,
            Call::NewMetadata { .. } => Operation::NewMetadata,
            Call::CopyMetadata { .. } => Operation::CopyMetadata,
            Call::DeleteMetadata { .. } => Operation::DeleteMetadata,
            Call::MetadataSet { .. } => Operation::MetadataSet,
            Call::Flush { .. } => Operation::Flush,
            Call::Notify { .. } => Operation::Notify,
            Call::WriteDomain { .. } => Operation::WriteDomain,
            Call::WriteMask { .. } => Operation::WriteMask,
            Call::WriteField { .. } => Operation::WriteField,
            Call::WriteEncoded { .. } => Operation::WriteEncoded,
            Call::FieldAccepted { .. } => Operation::FieldAccepted,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
enum Resource {
    Configuration,
    Session,
    Metadata(Fields),
}

#[derive(Default)]
struct State {
    next_id: u64,
    resources: BTreeMap<ResourceId, Resource>,
    calls: Vec<Call>,
    failures: HashSet<Operation>,
}

#[derive(Default)]
pub struct DummyBackend {
    state: RefCell<State>,
}

impl DummyBackend {
    pub fn new() -> DummyBackend {
        DummyBackend::default()
    }

    /// Counterpart of the native library initialisation; never fails.
    pub fn initialise() -> NativeResult<DummyBackend> {
        Ok(DummyBackend::new())
    }

    /// Makes every subsequent call of `operation` report a general exception.
    pub fn fail(&self, operation: Operation) {
        self.state.borrow_mut().failures.insert(operation);
    }

    pub fn recover(&self, operation: Operation) {
        self.state.borrow_mut().failures.remove(&operation);
    }

    /// Every call forwarded so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Number of configurations, sessions and metadata objects not yet released.
    pub fn live_resources(&self) -> usize {
        self.state.borrow().resources.len()
    }

    /// Fields set on a live metadata object.
    pub fn metadata_fields(&self, id: ResourceId) -> Option<Fields> {
        match self.state.borrow().resources.get(&id) {
            Some(Resource::Metadata(fields)) => Some(fields.clone()),
            _ => None,
        }
    }

    fn record(&self, call: Call) -> NativeResult<()> {
        let mut state = self.state.borrow_mut();
        let operation = call.operation();
        state.calls.push(call);
        if state.failures.contains(&operation) {
            return Err(NativeError::new(
                NativeStatus::GeneralException,
                format!("{:?} failed", operation),
            ));
        }
        Ok(())
    }

    fn allocate(&self, resource: Resource) -> ResourceId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = ResourceId(state.next_id);
        state.resources.insert(id, resource);
        id
    }

    fn peek_id(&self) -> ResourceId {
        ResourceId(self.state.borrow().next_id + 1)
    }

    fn expect(&self, id: ResourceId, kind: &str) -> NativeResult<()> {
        let state = self.state.borrow();
        let found = match state.resources.get(&id) {
            Some(Resource::Configuration) => kind == "configuration",
            Some(Resource::Session) => kind == "session",
            Some(Resource::Metadata(_)) => kind == "metadata",
            None => false,
        };
        if found {
            Ok(())
        } else {
            Err(NativeError::new(
                NativeStatus::EckitException,
                format!("no live {} with id {}", kind, id.0),
            ))
        }
    }

    fn release(&self, id: ResourceId, kind: &str) -> NativeResult<()> {
        self.expect(id, kind)?;
        self.state.borrow_mut().resources.remove(&id);
        Ok(())
    }
}

impl Backend for DummyBackend {
    type Config = DummyHandle;
    type Session = DummyHandle;
    type Metadata = DummyHandle;

    fn version(&self) -> NativeResult<String> {
        self.record(Call::Version)?;
        Ok(DUMMY_VERSION.into())
    }

    fn vcs_version(&self) -> NativeResult<String> {
        self.record(Call::VcsVersion)?;
        Ok(DUMMY_VERSION.into())
    }

    fn new_configuration(&self, file: Option<&Path>) -> NativeResult<DummyHandle> {
        self.record(Call::NewConfiguration {
            id: self.peek_id(),
            file: file.map(Path::to_path_buf),
        })?;
        Ok(DummyHandle(self.allocate(Resource::Configuration)))
    }

    fn delete_configuration(&self, cc: DummyHandle) -> NativeResult<()> {
        self.record(Call::DeleteConfiguration { id: cc.0 })?;
        self.release(cc.0, "configuration")
    }

    fn config_set_path(&self, cc: &DummyHandle, path: &Path) -> NativeResult<()> {
        self.record(Call::ConfigSetPath {
            id: cc.0,
            path: path.to_path_buf(),
        })?;
        self.expect(cc.0, "configuration")
    }

    fn mpi_allow_world_default_comm(&self, cc: &DummyHandle, allow: bool) -> NativeResult<()> {
        self.record(Call::MpiAllowWorldDefaultComm { id: cc.0, allow })?;
        self.expect(cc.0, "configuration")
    }

    fn mpi_parent_comm(&self, cc: &DummyHandle, parent_comm: i32) -> NativeResult<()> {
        self.record(Call::MpiParentComm {
            id: cc.0,
            parent_comm,
        })?;
        self.expect(cc.0, "configuration")
    }

    fn start_server(&self, cc: &DummyHandle) -> NativeResult<()> {
        self.record(Call::StartServer { id: cc.0 })?;
        self.expect(cc.0, "configuration")
    }

    fn new_handle(&self, cc: &DummyHandle) -> NativeResult<DummyHandle> {
        self.record(Call::NewHandle {
            id: self.peek_id(),
            config: cc.0,
        })?;
        self.expect(cc.0, "configuration")?;
        Ok(DummyHandle(self.allocate(Resource::Session)))
    }

    fn delete_handle(&self, mio: DummyHandle) -> NativeResult<()> {
        self.record(Call::DeleteHandle { id: mio.0 })?;
        self.release(mio.0, "session")
    }

    fn open_connections(&self, mio: &DummyHandle) -> NativeResult<()> {
        self.record(Call::OpenConnections { id: mio.0 })?;
        self.expect(mio.0, "session")
    }

    fn close_connections(&self, mio: &DummyHandle) -> NativeResult<()> {
        self.record(Call::CloseConnections { id: mio.0 })?;
        self.expect(mio.0, "session")
    }

    fn new_metadata(&self, mio: &DummyHandle) -> NativeResult<DummyHandle> {
        self.record(Call::NewMetadata {
            id: self.peek_id(),
            session: mio.0,
        })?;
        self.expect(mio.0, "session")?;
        Ok(DummyHandle(self.allocate(Resource::Metadata(Fields::new()))))
    }

    fn copy_metadata(&self, md: &DummyHandle) -> NativeResult<DummyHandle> {
        self.record(Call::CopyMetadata {
            id: self.peek_id(),
            from: md.0,
        })?;
        let fields = self.metadata_fields(md.0).ok_or_else(|| {
            NativeError::new(
                NativeStatus::EckitException,
                format!("no live metadata with id {}", md.id().0),
            )
        })?;
        Ok(DummyHandle(self.allocate(Resource::Metadata(fields))))
    }

    fn delete_metadata(&self, md: DummyHandle) -> NativeResult<()> {
        self.record(Call::DeleteMetadata { id: md.0 })?;
        self.release(md.0, "metadata")
    }

    fn metadata_set(
        &self,
        md: &DummyHandle,
        key: &str,
        value: &MetadataValue,
    ) -> NativeResult<()> {
        self.record(Call::MetadataSet {
            id: md.0,
            key: key.into(),
            value: value.clone(),
        })?;
        self.expect(md.0, "metadata")?;
        let mut state = self.state.borrow_mut();
        if let Some(Resource::Metadata(fields)) = state.resources.get_mut(&md.0) {
            fields.insert(key.into(), value.clone());
        }
        Ok(())
    }

    fn flush(&self, mio: &DummyHandle, md: &DummyHandle) -> NativeResult<()> {
        self.record(Call::Flush {
            session: mio.0,
            metadata: md.0,
        })?;
        self.expect(mio.0, "session")?;
        self.expect(md.0, "metadata")
    }

    fn notify(&self, mio: &DummyHandle, md: &DummyHandle) -> NativeResult<()> {
        self.record(Call::Notify {
            session: mio.0,
            metadata: md.0,
        })?;
        self.expect(mio.0, "session")?;
        self.expect(md.0, "metadata")
    }

    fn write_domain(
        &self,
        mio: &DummyHandle,
        md: &DummyHandle,
        data: &[i32],
    ) -> NativeResult<()> {
        self.record(Call::WriteDomain {
            session: mio.0,
            metadata: md.0,
            len: data.len(),
        })?;
        self.expect(mio.0, "session")?;
        self.expect(md.0, "metadata")
    }

    fn write_mask(
        &self,
        mio: &DummyHandle,
        md: &DummyHandle,
        data: Values<'_>,
    ) -> NativeResult<()> {
        self.record(Call::WriteMask {
            session: mio.0,
            metadata: md.0,
            len: data.len(),
            precision: data.precision(),
        })?;
        self.expect(mio.0, "session")?;
        self.expect(md.0, "metadata")
    }

    fn write_field(
        &self,
        mio: &DummyHandle,
        md: &DummyHandle,
        data: Values<'_>,
    ) -> NativeResult<()> {
        self.record(Call::WriteField {
            session: mio.0,
            metadata: md.0,
            len: data.len(),
            precision: data.precision(),
        })?;
        self.expect(mio.0, "session")?;
        self.expect(md.0, "metadata")
    }

    fn write_encoded(&self, mio: &DummyHandle, data: &[u8]) -> NativeResult<()> {
        self.record(Call::WriteEncoded {
            session: mio.0,
            len: data.len(),
        })?;
        self.expect(mio.0, "session")
    }

    fn field_accepted(
        &self,
        mio: &DummyHandle,
        md: &DummyHandle,
        accepted: bool,
    ) -> NativeResult<bool> {
        self.record(Call::FieldAccepted {
            session: mio.0,
            metadata: md.0,
            accepted,
        })?;
        self.expect(mio.0, "session")?;
        self.expect(md.0, "metadata")?;
        Ok(accepted)
    }
}
