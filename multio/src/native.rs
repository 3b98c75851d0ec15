//! The backend calling into `libmultio-api`.

use std::ffi::{CStr, CString};
use std::path::Path;
use std::ptr::{self, NonNull};

use libc::{c_char, c_int, c_void};
use multio_sys as sys;
use tracing::debug;

use crate::backend::{c_len, Backend, InitOnce, Values};
use crate::error::{NativeError, NativeResult, NativeStatus};
use crate::metadata::MetadataValue;

static INITIALISED: InitOnce = InitOnce::new();

// Each handle is the only owner of its native object. They are neither
// `Clone` nor `Copy` and are consumed by the matching `delete_*` call.
pub struct NativeConfig(NonNull<sys::multio_configuration_t>);
pub struct NativeSession(NonNull<sys::multio_handle_t>);
pub struct NativeMetadata(NonNull<sys::multio_metadata_t>);

/// Forwards every call to the Multio C API.
pub struct NativeBackend {
    _private: (),
}

impl NativeBackend {
    /// Initialises the library once per process. A failed initialisation
    /// is attempted again by the next call.
    pub fn initialise() -> NativeResult<NativeBackend> {
        INITIALISED.run(|| {
            debug!("initialising multio");
            check(unsafe { sys::multio_initialise() })
        })?;
        Ok(NativeBackend { _private: () })
    }
}

fn last_error(code: c_int) -> String {
    let message = unsafe { sys::multio_error_string(code) };
    if message.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(message) }
        .to_string_lossy()
        .into_owned()
}

fn check(code: c_int) -> NativeResult<()> {
    match NativeStatus::from_code(code) {
        None => Ok(()),
        Some(status) => Err(NativeError::new(status, last_error(code))),
    }
}

fn invalid_argument<S: Into<String>>(message: S) -> NativeError {
    NativeError::new(NativeStatus::GeneralException, message)
}

fn cstring(s: &str) -> NativeResult<CString> {
    CString::new(s).map_err(|_| invalid_argument(format!("'{}' contains a NUL byte", s)))
}

fn path_cstring(path: &Path) -> NativeResult<CString> {
    match path.to_str() {
        Some(s) => cstring(s),
        None => Err(invalid_argument(format!(
            "'{}' is not valid UTF-8",
            path.display()
        ))),
    }
}

type VersionQuery = unsafe extern "C" fn(*mut *const c_char) -> c_int;

fn version_string(query: VersionQuery) -> NativeResult<String> {
    let mut version: *const c_char = ptr::null();
    check(unsafe { query(&mut version) })?;
    if version.is_null() {
        return Err(invalid_argument("library returned no version"));
    }
    Ok(unsafe { CStr::from_ptr(version) }
        .to_string_lossy()
        .into_owned())
}

fn non_null<T>(raw: *mut T, what: &str) -> NativeResult<NonNull<T>> {
    NonNull::new(raw).ok_or_else(|| {
        NativeError::new(
            NativeStatus::UnknownException,
            format!("library returned a null {}", what),
        )
    })
}

impl Backend for NativeBackend {
    type Config = NativeConfig;
    type Session = NativeSession;
    type Metadata = NativeMetadata;

    fn version(&self) -> NativeResult<String> {
        version_string(sys::multio_version)
    }

    fn vcs_version(&self) -> NativeResult<String> {
        version_string(sys::multio_vcs_version)
    }

    fn new_configuration(&self, file: Option<&Path>) -> NativeResult<NativeConfig> {
        let mut cc = ptr::null_mut();
        match file {
            Some(file) => {
                let file = path_cstring(file)?;
                check(unsafe {
                    sys::multio_new_configuration_from_filename(&mut cc, file.as_ptr())
                })?
            }
            None => check(unsafe { sys::multio_new_configuration(&mut cc) })?,
        }
        non_null(cc, "configuration").map(NativeConfig)
    }

    fn delete_configuration(&self, cc: NativeConfig) -> NativeResult<()> {
        check(unsafe { sys::multio_delete_configuration(cc.0.as_ptr()) })
    }

    fn config_set_path(&self, cc: &NativeConfig, path: &Path) -> NativeResult<()> {
        let path = path_cstring(path)?;
        check(unsafe { sys::multio_config_set_path(cc.0.as_ptr(), path.as_ptr()) })
    }

    fn mpi_allow_world_default_comm(&self, cc: &NativeConfig, allow: bool) -> NativeResult<()> {
        check(unsafe { sys::multio_mpi_allow_world_default_comm(cc.0.as_ptr(), allow) })
    }

    fn mpi_parent_comm(&self, cc: &NativeConfig, parent_comm: i32) -> NativeResult<()> {
        check(unsafe { sys::multio_mpi_parent_comm(cc.0.as_ptr(), parent_comm) })
    }

    fn start_server(&self, cc: &NativeConfig) -> NativeResult<()> {
        check(unsafe { sys::multio_start_server(cc.0.as_ptr()) })
    }

    fn new_handle(&self, cc: &NativeConfig) -> NativeResult<NativeSession> {
        let mut mio = ptr::null_mut();
        check(unsafe { sys::multio_new_handle(&mut mio, cc.0.as_ptr()) })?;
        non_null(mio, "session").map(NativeSession)
    }

    fn delete_handle(&self, mio: NativeSession) -> NativeResult<()> {
        check(unsafe { sys::multio_delete_handle(mio.0.as_ptr()) })
    }

    fn open_connections(&self, mio: &NativeSession) -> NativeResult<()> {
        check(unsafe { sys::multio_open_connections(mio.0.as_ptr()) })
    }

    fn close_connections(&self, mio: &NativeSession) -> NativeResult<()> {
        check(unsafe { sys::multio_close_connections(mio.0.as_ptr()) })
    }

    fn new_metadata(&self, mio: &NativeSession) -> NativeResult<NativeMetadata> {
        let mut md = ptr::null_mut();
        check(unsafe { sys::multio_new_metadata(&mut md, mio.0.as_ptr()) })?;
        non_null(md, "metadata").map(NativeMetadata)
    }

    fn copy_metadata(&self, md: &NativeMetadata) -> NativeResult<NativeMetadata> {
        let mut copy = ptr::null_mut();
        check(unsafe { sys::multio_copy_metadata(&mut copy, md.0.as_ptr()) })?;
        non_null(copy, "metadata").map(NativeMetadata)
    }

    fn delete_metadata(&self, md: NativeMetadata) -> NativeResult<()> {
        check(unsafe { sys::multio_delete_metadata(md.0.as_ptr()) })
    }

    fn metadata_set(
        &self,
        md: &NativeMetadata,
        key: &str,
        value: &MetadataValue,
    ) -> NativeResult<()> {
        let md = md.0.as_ptr();
        let c_key = cstring(key)?;
        let key = c_key.as_ptr();
        let code = match value {
            MetadataValue::Bool(v) => unsafe { sys::multio_metadata_set_bool(md, key, *v) },
            MetadataValue::Int(v) => unsafe { sys::multio_metadata_set_int64(md, key, *v) },
            MetadataValue::Float(v) => unsafe { sys::multio_metadata_set_float(md, key, *v) },
            MetadataValue::Double(v) => unsafe { sys::multio_metadata_set_double(md, key, *v) },
            MetadataValue::String(v) => {
                let v = cstring(v)?;
                unsafe { sys::multio_metadata_set_string(md, key, v.as_ptr()) }
            }
            // The library copies the array and never writes through the pointer.
            MetadataValue::IntArray(v) => unsafe {
                sys::multio_metadata_set_int64_array(md, key, v.as_ptr() as *mut i64, v.len())
            },
            MetadataValue::DoubleArray(v) => unsafe {
                sys::multio_metadata_set_double_array(md, key, v.as_ptr() as *mut f64, v.len())
            },
        };
        check(code)
    }

    fn flush(&self, mio: &NativeSession, md: &NativeMetadata) -> NativeResult<()> {
        check(unsafe { sys::multio_flush(mio.0.as_ptr(), md.0.as_ptr()) })
    }

    fn notify(&self, mio: &NativeSession, md: &NativeMetadata) -> NativeResult<()> {
        check(unsafe { sys::multio_notify(mio.0.as_ptr(), md.0.as_ptr()) })
    }

    fn write_domain(
        &self,
        mio: &NativeSession,
        md: &NativeMetadata,
        data: &[i32],
    ) -> NativeResult<()> {
        let len = c_len(data.len())?;
        // The domain buffer is copied before dispatch, never written.
        check(unsafe {
            sys::multio_write_domain(
                mio.0.as_ptr(),
                md.0.as_ptr(),
                data.as_ptr() as *mut c_int,
                len,
            )
        })
    }

    fn write_mask(
        &self,
        mio: &NativeSession,
        md: &NativeMetadata,
        data: Values<'_>,
    ) -> NativeResult<()> {
        let (mio, md) = (mio.0.as_ptr(), md.0.as_ptr());
        let len = c_len(data.len())?;
        check(match data {
            Values::Single(v) => unsafe {
                sys::multio_write_mask_float(mio, md, v.as_ptr(), len)
            },
            Values::Double(v) => unsafe {
                sys::multio_write_mask_double(mio, md, v.as_ptr(), len)
            },
        })
    }

    fn write_field(
        &self,
        mio: &NativeSession,
        md: &NativeMetadata,
        data: Values<'_>,
    ) -> NativeResult<()> {
        let (mio, md) = (mio.0.as_ptr(), md.0.as_ptr());
        let len = c_len(data.len())?;
        check(match data {
            Values::Single(v) => unsafe {
                sys::multio_write_field_float(mio, md, v.as_ptr(), len)
            },
            Values::Double(v) => unsafe {
                sys::multio_write_field_double(mio, md, v.as_ptr(), len)
            },
        })
    }

    fn write_encoded(&self, mio: &NativeSession, data: &[u8]) -> NativeResult<()> {
        let len = c_len(data.len())?;
        check(unsafe {
            sys::multio_write_grib_encoded(mio.0.as_ptr(), data.as_ptr() as *mut c_void, len)
        })
    }

    fn field_accepted(
        &self,
        mio: &NativeSession,
        md: &NativeMetadata,
        accepted: bool,
    ) -> NativeResult<bool> {
        let mut accepted = accepted;
        check(unsafe {
            sys::multio_field_accepted(mio.0.as_ptr(), md.0.as_ptr(), &mut accepted)
        })?;
        Ok(accepted)
    }
}
