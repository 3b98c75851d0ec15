//! A native session handle and the calls that move data through it.

use std::mem::ManuallyDrop;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::backend::{Backend, Element};
use crate::config::Configuration;
use crate::error::{Error, Result, WriteKind};
use crate::metadata::Metadata;

/// Connectivity of a session, as far as this side of the boundary knows.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConnectionState {
    /// Created, connections never toggled explicitly.
    Idle,
    Open,
    Closed,
}

/// An owned native session.
///
/// The session takes ownership of the [`Configuration`] it was created from
/// and releases it after the native session itself.
pub struct Session<B: Backend> {
    backend: Rc<B>,
    raw: ManuallyDrop<B::Session>,
    state: ConnectionState,
    configuration: Configuration<B>,
}

impl<B: Backend> Session<B> {
    pub fn create(configuration: Configuration<B>) -> Result<Self> {
        let backend = configuration.backend().clone();
        let raw = backend
            .new_handle(configuration.raw())
            .map_err(Error::SessionCreate)?;

        debug!("created session");
        Ok(Session {
            backend,
            raw: ManuallyDrop::new(raw),
            state: ConnectionState::Idle,
            configuration,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn configuration(&self) -> &Configuration<B> {
        &self.configuration
    }

    pub fn configuration_mut(&mut self) -> &mut Configuration<B> {
        &mut self.configuration
    }

    /// Opens the transport connections. Opening an open session is an error.
    pub fn open_connections(&mut self) -> Result<()> {
        if self.state == ConnectionState::Open {
            return Err(Error::AlreadyOpen);
        }
        self.backend
            .open_connections(&self.raw)
            .map_err(Error::Connection)?;
        self.state = ConnectionState::Open;
        debug!("connections opened");
        Ok(())
    }

    /// Closes the transport connections. Closing a closed session does nothing.
    pub fn close_connections(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.backend
            .close_connections(&self.raw)
            .map_err(Error::Connection)?;
        self.state = ConnectionState::Closed;
        debug!("connections closed");
        Ok(())
    }

    pub fn flush(&self, metadata: &Metadata<B>) -> Result<()> {
        self.check_transfer()?;
        trace!("flush");
        self.backend
            .flush(&self.raw, metadata.raw())
            .map_err(Error::Flush)
    }

    pub fn notify(&self, metadata: &Metadata<B>) -> Result<()> {
        self.check_transfer()?;
        trace!("notify");
        self.backend
            .notify(&self.raw, metadata.raw())
            .map_err(Error::Notify)
    }

    pub fn write_domain(&self, metadata: &Metadata<B>, data: &[i32]) -> Result<()> {
        self.check_buffer(data.len())?;
        trace!("write_domain: {} elements", data.len());
        self.backend
            .write_domain(&self.raw, metadata.raw(), data)
            .map_err(|source| Error::Write {
                kind: WriteKind::Domain,
                source,
            })
    }

    pub fn write_mask<T: Element>(&self, metadata: &Metadata<B>, data: &[T]) -> Result<()> {
        self.check_buffer(data.len())?;
        let values = T::values(data);
        trace!("write_mask: {} {:?} elements", values.len(), values.precision());
        self.backend
            .write_mask(&self.raw, metadata.raw(), values)
            .map_err(|source| Error::Write {
                kind: WriteKind::Mask,
                source,
            })
    }

    pub fn write_field<T: Element>(&self, metadata: &Metadata<B>, data: &[T]) -> Result<()> {
        self.check_buffer(data.len())?;
        let values = T::values(data);
        trace!("write_field: {} {:?} elements", values.len(), values.precision());
        self.backend
            .write_field(&self.raw, metadata.raw(), values)
            .map_err(|source| Error::Write {
                kind: WriteKind::Field,
                source,
            })
    }

    /// Hands an already encoded GRIB message to the library.
    pub fn write_encoded(&self, data: &[u8]) -> Result<()> {
        self.check_buffer(data.len())?;
        trace!("write_encoded: {} bytes", data.len());
        self.backend
            .write_encoded(&self.raw, data)
            .map_err(|source| Error::Write {
                kind: WriteKind::Encoded,
                source,
            })
    }

    pub fn field_accepted(&self, metadata: &Metadata<B>, accepted: bool) -> Result<bool> {
        self.check_transfer()?;
        self.backend
            .field_accepted(&self.raw, metadata.raw(), accepted)
            .map_err(Error::FieldAccepted)
    }

    pub(crate) fn backend(&self) -> &Rc<B> {
        &self.backend
    }

    pub(crate) fn raw(&self) -> &B::Session {
        &self.raw
    }

    fn check_transfer(&self) -> Result<()> {
        match self.state {
            ConnectionState::Closed => Err(Error::ConnectionsClosed),
            _ => Ok(()),
        }
    }

    fn check_buffer(&self, len: usize) -> Result<()> {
        self.check_transfer()?;
        if i32::try_from(len).is_err() {
            return Err(Error::BufferTooLarge { len });
        }
        Ok(())
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        // SAFETY: `raw` is not touched again after this.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        if let Err(e) = self.backend.delete_handle(raw) {
            warn!("failed to release session: {}", e);
        }
    }
}
