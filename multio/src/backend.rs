//! The boundary between the safe handles and the library doing the actual I/O.
//!
//! A [`Backend`] is a one-to-one rendition of the Multio C API: every method
//! corresponds to one native entry point and reports the native status as a
//! [`NativeError`]. Backends hand out raw handle values for configurations,
//! sessions and metadata; the owning wrappers in this crate decide when to
//! release them. Releasing a handle consumes it, so a handle can neither be
//! released twice nor used after its release.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use crate::error::{NativeError, NativeResult, NativeStatus};
use crate::metadata::MetadataValue;

/// Floating point precision of a mask or field buffer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Precision {
    Single,
    Double,
}

/// A borrowed buffer of mask or field values.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Values<'a> {
    Single(&'a [f32]),
    Double(&'a [f64]),
}

impl<'a> Values<'a> {
    pub fn len(&self) -> usize {
        match self {
            Values::Single(data) => data.len(),
            Values::Double(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn precision(&self) -> Precision {
        match self {
            Values::Single(_) => Precision::Single,
            Values::Double(_) => Precision::Double,
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Element types accepted by the mask and field write calls.
pub trait Element: sealed::Sealed + Copy {
    fn values(data: &[Self]) -> Values<'_>;
}

impl Element for f32 {
    fn values(data: &[f32]) -> Values<'_> {
        Values::Single(data)
    }
}

impl Element for f64 {
    fn values(data: &[f64]) -> Values<'_> {
        Values::Double(data)
    }
}

pub trait Backend {
    type Config;
    type Session;
    type Metadata;

    fn version(&self) -> NativeResult<String>;
    fn vcs_version(&self) -> NativeResult<String>;

    /// Allocates a configuration, read from `file` when given.
    fn new_configuration(&self, file: Option<&Path>) -> NativeResult<Self::Config>;
    fn delete_configuration(&self, cc: Self::Config) -> NativeResult<()>;
    fn config_set_path(&self, cc: &Self::Config, path: &Path) -> NativeResult<()>;
    fn mpi_allow_world_default_comm(&self, cc: &Self::Config, allow: bool) -> NativeResult<()>;
    fn mpi_parent_comm(&self, cc: &Self::Config, parent_comm: i32) -> NativeResult<()>;
    fn start_server(&self, cc: &Self::Config) -> NativeResult<()>;

    /// Allocates a session. The configuration's contents move into the
    /// session, but `cc` itself still has to be released afterwards.
    fn new_handle(&self, cc: &Self::Config) -> NativeResult<Self::Session>;
    fn delete_handle(&self, mio: Self::Session) -> NativeResult<()>;
    fn open_connections(&self, mio: &Self::Session) -> NativeResult<()>;
    fn close_connections(&self, mio: &Self::Session) -> NativeResult<()>;

    fn new_metadata(&self, mio: &Self::Session) -> NativeResult<Self::Metadata>;
    fn copy_metadata(&self, md: &Self::Metadata) -> NativeResult<Self::Metadata>;
    fn delete_metadata(&self, md: Self::Metadata) -> NativeResult<()>;
    fn metadata_set(&self, md: &Self::Metadata, key: &str, value: &MetadataValue)
        -> NativeResult<()>;

    fn flush(&self, mio: &Self::Session, md: &Self::Metadata) -> NativeResult<()>;
    fn notify(&self, mio: &Self::Session, md: &Self::Metadata) -> NativeResult<()>;

    // Buffers longer than a C `int` can count are rejected, see `c_len`.
    fn write_domain(&self, mio: &Self::Session, md: &Self::Metadata, data: &[i32])
        -> NativeResult<()>;
    fn write_mask(&self, mio: &Self::Session, md: &Self::Metadata, data: Values<'_>)
        -> NativeResult<()>;
    fn write_field(&self, mio: &Self::Session, md: &Self::Metadata, data: Values<'_>)
        -> NativeResult<()>;
    fn write_encoded(&self, mio: &Self::Session, data: &[u8]) -> NativeResult<()>;

    /// Passes `accepted` through the native in/out flag and returns what the
    /// library left in it.
    fn field_accepted(
        &self,
        mio: &Self::Session,
        md: &Self::Metadata,
        accepted: bool,
    ) -> NativeResult<bool>;
}

/// Converts a buffer length to the `int` element count the C API takes.
pub fn c_len(len: usize) -> NativeResult<i32> {
    i32::try_from(len).map_err(|_| {
        NativeError::new(
            NativeStatus::GeneralException,
            format!("buffer of {} elements exceeds the native size limit", len),
        )
    })
}

/// Runs a library initialisation until it has succeeded once.
///
/// A failed attempt leaves the guard unset, so the next caller retries.
#[cfg_attr(not(feature = "native"), allow(dead_code))]
pub(crate) struct InitOnce {
    done: Mutex<bool>,
}

#[cfg_attr(not(feature = "native"), allow(dead_code))]
impl InitOnce {
    pub(crate) const fn new() -> InitOnce {
        InitOnce {
            done: Mutex::new(false),
        }
    }

    pub(crate) fn run<F>(&self, init: F) -> NativeResult<()>
    where
        F: FnOnce() -> NativeResult<()>,
    {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        if !*done {
            init()?;
            *done = true;
        }
        Ok(())
    }
}
