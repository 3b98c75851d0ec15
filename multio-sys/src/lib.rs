//! Raw declarations of the Multio C API (`multio_c.h`).
//!
//! Every function returns one of the `MULTIO_*` status codes. Nothing in here
//! is safe to call directly; use the `multio` crate instead.

#![allow(non_camel_case_types)]

use libc::{c_char, c_int, c_void};

pub const MULTIO_SUCCESS: c_int = 0;
pub const MULTIO_ERROR_ECKIT_EXCEPTION: c_int = 1;
pub const MULTIO_ERROR_GENERAL_EXCEPTION: c_int = 2;
pub const MULTIO_ERROR_UNKNOWN_EXCEPTION: c_int = 3;

#[repr(C)]
pub struct multio_configuration_t {
    _private: [u8; 0],
}

#[repr(C)]
pub struct multio_handle_t {
    _private: [u8; 0],
}

#[repr(C)]
pub struct multio_metadata_t {
    _private: [u8; 0],
}

#[link(name = "multio-api")]
extern "C" {
    pub fn multio_initialise() -> c_int;
    pub fn multio_version(version: *mut *const c_char) -> c_int;
    pub fn multio_vcs_version(sha1: *mut *const c_char) -> c_int;
    pub fn multio_error_string(err: c_int) -> *const c_char;

    pub fn multio_new_configuration(cc: *mut *mut multio_configuration_t) -> c_int;
    pub fn multio_new_configuration_from_filename(
        cc: *mut *mut multio_configuration_t,
        conf_file_name: *const c_char,
    ) -> c_int;
    pub fn multio_delete_configuration(cc: *mut multio_configuration_t) -> c_int;
    pub fn multio_config_set_path(
        cc: *mut multio_configuration_t,
        configuration_path: *const c_char,
    ) -> c_int;
    pub fn multio_mpi_allow_world_default_comm(
        cc: *mut multio_configuration_t,
        allow: bool,
    ) -> c_int;
    pub fn multio_mpi_parent_comm(cc: *mut multio_configuration_t, parent_comm: c_int) -> c_int;

    pub fn multio_new_handle(
        mio: *mut *mut multio_handle_t,
        cc: *mut multio_configuration_t,
    ) -> c_int;
    pub fn multio_delete_handle(mio: *mut multio_handle_t) -> c_int;
    pub fn multio_start_server(cc: *mut multio_configuration_t) -> c_int;
    pub fn multio_open_connections(mio: *mut multio_handle_t) -> c_int;
    pub fn multio_close_connections(mio: *mut multio_handle_t) -> c_int;

    pub fn multio_flush(mio: *mut multio_handle_t, md: *mut multio_metadata_t) -> c_int;
    pub fn multio_notify(mio: *mut multio_handle_t, md: *mut multio_metadata_t) -> c_int;

    pub fn multio_write_domain(
        mio: *mut multio_handle_t,
        md: *mut multio_metadata_t,
        data: *mut c_int,
        size: c_int,
    ) -> c_int;
    pub fn multio_write_mask_float(
        mio: *mut multio_handle_t,
        md: *mut multio_metadata_t,
        data: *const f32,
        size: c_int,
    ) -> c_int;
    pub fn multio_write_mask_double(
        mio: *mut multio_handle_t,
        md: *mut multio_metadata_t,
        data: *const f64,
        size: c_int,
    ) -> c_int;
    pub fn multio_write_field_float(
        mio: *mut multio_handle_t,
        md: *mut multio_metadata_t,
        data: *const f32,
        size: c_int,
    ) -> c_int;
    pub fn multio_write_field_double(
        mio: *mut multio_handle_t,
        md: *mut multio_metadata_t,
        data: *const f64,
        size: c_int,
    ) -> c_int;
    pub fn multio_write_grib_encoded(
        mio: *mut multio_handle_t,
        gribdata: *mut c_void,
        gribsize: c_int,
    ) -> c_int;

    pub fn multio_new_metadata(
        md: *mut *mut multio_metadata_t,
        mio: *mut multio_handle_t,
    ) -> c_int;
    pub fn multio_copy_metadata(
        md: *mut *mut multio_metadata_t,
        md_from: *mut multio_metadata_t,
    ) -> c_int;
    pub fn multio_delete_metadata(md: *mut multio_metadata_t) -> c_int;

    pub fn multio_metadata_set_bool(
        md: *mut multio_metadata_t,
        key: *const c_char,
        value: bool,
    ) -> c_int;
    pub fn multio_metadata_set_int64(
        md: *mut multio_metadata_t,
        key: *const c_char,
        value: i64,
    ) -> c_int;
    pub fn multio_metadata_set_float(
        md: *mut multio_metadata_t,
        key: *const c_char,
        value: f32,
    ) -> c_int;
    pub fn multio_metadata_set_double(
        md: *mut multio_metadata_t,
        key: *const c_char,
        value: f64,
    ) -> c_int;
    pub fn multio_metadata_set_string(
        md: *mut multio_metadata_t,
        key: *const c_char,
        value: *const c_char,
    ) -> c_int;
    pub fn multio_metadata_set_int64_array(
        md: *mut multio_metadata_t,
        key: *const c_char,
        value: *mut i64,
        count: libc::size_t,
    ) -> c_int;
    pub fn multio_metadata_set_double_array(
        md: *mut multio_metadata_t,
        key: *const c_char,
        value: *mut f64,
        count: libc::size_t,
    ) -> c_int;

    pub fn multio_field_accepted(
        mio: *mut multio_handle_t,
        md: *const multio_metadata_t,
        accepted: *mut bool,
    ) -> c_int;
}
