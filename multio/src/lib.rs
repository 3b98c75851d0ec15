//! Safe handles for the [Multio](https://github.com/ecmwf/multio) I/O library.
//!
//! Multio routes model output (fields, masks and domain descriptions) through
//! configurable plans to servers and sinks. This crate owns the native
//! configuration, session and metadata objects, releases them when dropped and
//! forwards data with the length taken from the slice itself.
//!
//! The usual entry point is [`Multio`]:
//!
//! ```
//! use multio::{Fields, Multio};
//! use serde_json::json;
//!
//! let mut mio = Multio::from_value(Some(&json!({}))).unwrap();
//! mio.open_connections().unwrap();
//!
//! mio.create_metadata(Some(Fields::new().with("name", "2t").with("step", 6)))
//!     .unwrap();
//! mio.write_field(&[1.0f64, 2.0, 3.0]).unwrap();
//! mio.flush().unwrap();
//!
//! mio.close_connections().unwrap();
//! ```
//!
//! Without the `native` feature the [`DummyBackend`] is used, which accepts
//! every call, like the C library built with `MULTIO_DUMMY_API`. With the
//! `native` feature the calls go to `libmultio-api`; point `MULTIO_LIB_DIR`
//! at its directory when it is not on the default linker path.

use std::path::Path;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

pub mod backend;
pub mod config;
pub mod dummy;
mod error;
pub mod metadata;
#[cfg(feature = "native")]
pub mod native;
pub mod session;

#[cfg(test)]
mod test;

pub use crate::backend::{Backend, Element, Precision, Values};
pub use crate::config::{Config, Configuration};
pub use crate::dummy::DummyBackend;
pub use crate::error::{Error, NativeError, NativeResult, NativeStatus, Result, WriteKind};
pub use crate::metadata::{Fields, Metadata, MetadataValue};
#[cfg(feature = "native")]
pub use crate::native::NativeBackend;
pub use crate::session::{ConnectionState, Session};

#[cfg(feature = "native")]
pub type DefaultBackend = NativeBackend;
#[cfg(not(feature = "native"))]
pub type DefaultBackend = DummyBackend;

/// A configured session plus the metadata describing the next write.
///
/// Data transfer needs metadata: call [`create_metadata`](Multio::create_metadata)
/// before `flush`, `notify`, `write_*` or `field_accepted`, otherwise they fail
/// with [`Error::NoMetadata`].
pub struct Multio<B: Backend = DefaultBackend> {
    // Declared first so it is released before the session.
    metadata: Option<Metadata<B>>,
    session: Session<B>,
}

impl Multio<DefaultBackend> {
    pub fn new(config: Option<Config>) -> Result<Self> {
        let config = config.ok_or(Error::MissingConfig)?;
        let backend = DefaultBackend::initialise().map_err(Error::Initialise)?;
        Multio::with_backend(Rc::new(backend), Some(config))
    }

    /// Builds the facade from an options mapping, see [`Config::from_value`].
    pub fn from_value(options: Option<&Value>) -> Result<Self> {
        let options = options.ok_or(Error::MissingConfig)?;
        Multio::new(Some(Config::from_value(options)?))
    }
}

impl<B: Backend> Multio<B> {
    pub fn with_backend(backend: Rc<B>, config: Option<Config>) -> Result<Self> {
        let config = config.ok_or(Error::MissingConfig)?;
        let configuration = Configuration::create(backend, &config)?;
        let session = Session::create(configuration)?;
        debug!("multio ready");
        Ok(Multio {
            metadata: None,
            session,
        })
    }

    pub fn version(&self) -> Result<String> {
        self.session.backend().version().map_err(Error::Version)
    }

    pub fn vcs_version(&self) -> Result<String> {
        self.session.backend().vcs_version().map_err(Error::Version)
    }

    pub fn set_conf_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.session.configuration_mut().set_conf_path(path)
    }

    pub fn start_server(&mut self) -> Result<()> {
        self.session.configuration_mut().start_server()
    }

    /// Replaces the current metadata, releasing the previous one.
    pub fn create_metadata(&mut self, fields: Option<Fields>) -> Result<()> {
        let metadata = Metadata::create(&self.session, fields.as_ref())?;
        self.metadata = Some(metadata);
        Ok(())
    }

    pub fn open_connections(&mut self) -> Result<()> {
        self.session.open_connections()
    }

    pub fn close_connections(&mut self) -> Result<()> {
        self.session.close_connections()
    }

    pub fn flush(&self) -> Result<()> {
        let metadata = self.metadata.as_ref().ok_or(Error::NoMetadata)?;
        self.session.flush(metadata)
    }

    pub fn notify(&self) -> Result<()> {
        let metadata = self.metadata.as_ref().ok_or(Error::NoMetadata)?;
        self.session.notify(metadata)
    }

    pub fn write_domain(&self, data: &[i32]) -> Result<()> {
        let metadata = self.metadata.as_ref().ok_or(Error::NoMetadata)?;
        self.session.write_domain(metadata, data)
    }

    pub fn write_mask<T: Element>(&self, data: &[T]) -> Result<()> {
        let metadata = self.metadata.as_ref().ok_or(Error::NoMetadata)?;
        self.session.write_mask(metadata, data)
    }

    pub fn write_field<T: Element>(&self, data: &[T]) -> Result<()> {
        let metadata = self.metadata.as_ref().ok_or(Error::NoMetadata)?;
        self.session.write_field(metadata, data)
    }

    /// Writes an already encoded GRIB message; needs no metadata.
    pub fn write_encoded(&self, data: &[u8]) -> Result<()> {
        self.session.write_encoded(data)
    }

    /// Returns whether the library accepts the field described by the current
    /// metadata; `accepted` is the value reported when the library does not decide.
    pub fn field_accepted(&self, accepted: bool) -> Result<bool> {
        let metadata = self.metadata.as_ref().ok_or(Error::NoMetadata)?;
        self.session.field_accepted(metadata, accepted)
    }

    pub fn metadata(&self) -> Option<&Metadata<B>> {
        self.metadata.as_ref()
    }

    pub fn session(&self) -> &Session<B> {
        &self.session
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }
}
