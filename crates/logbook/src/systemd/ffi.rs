//! Raw bindings to the `sd_journal` API of libsystemd

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};

/// Opaque journal handle
#[repr(C)]
pub struct sd_journal {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct sd_id128_t {
    pub bytes: [u8; 16],
}

#[repr(C)]
pub struct iovec {
    pub iov_base: *const c_void,
    pub iov_len: usize,
}

pub const SD_JOURNAL_LOCAL_ONLY: c_int = 1 << 0;
pub const SD_JOURNAL_RUNTIME_ONLY: c_int = 1 << 1;
pub const SD_JOURNAL_SYSTEM: c_int = 1 << 2;
pub const SD_JOURNAL_CURRENT_USER: c_int = 1 << 3;

pub const SD_JOURNAL_NOP: c_int = 0;
pub const SD_JOURNAL_APPEND: c_int = 1;
pub const SD_JOURNAL_INVALIDATE: c_int = 2;

#[link(name = "systemd")]
extern "C" {
    pub fn sd_journal_open(ret: *mut *mut sd_journal, flags: c_int) -> c_int;
    pub fn sd_journal_close(j: *mut sd_journal);

    pub fn sd_journal_seek_head(j: *mut sd_journal) -> c_int;
    pub fn sd_journal_seek_tail(j: *mut sd_journal) -> c_int;
    pub fn sd_journal_seek_realtime_usec(j: *mut sd_journal, usec: u64) -> c_int;
    pub fn sd_journal_seek_cursor(j: *mut sd_journal, cursor: *const c_char) -> c_int;

    pub fn sd_journal_next(j: *mut sd_journal) -> c_int;
    pub fn sd_journal_previous(j: *mut sd_journal) -> c_int;
    pub fn sd_journal_next_skip(j: *mut sd_journal, skip: u64) -> c_int;
    pub fn sd_journal_previous_skip(j: *mut sd_journal, skip: u64) -> c_int;

    pub fn sd_journal_get_cursor(j: *mut sd_journal, cursor: *mut *mut c_char) -> c_int;
    pub fn sd_journal_test_cursor(j: *mut sd_journal, cursor: *const c_char) -> c_int;

    pub fn sd_journal_get_data(
        j: *mut sd_journal,
        field: *const c_char,
        data: *mut *const c_void,
        length: *mut usize,
    ) -> c_int;
    pub fn sd_journal_restart_data(j: *mut sd_journal);
    pub fn sd_journal_enumerate_data(
        j: *mut sd_journal,
        data: *mut *const c_void,
        length: *mut usize,
    ) -> c_int;
    pub fn sd_journal_set_data_threshold(j: *mut sd_journal, size: usize) -> c_int;

    pub fn sd_journal_get_realtime_usec(j: *mut sd_journal, usec: *mut u64) -> c_int;
    pub fn sd_journal_get_monotonic_usec(
        j: *mut sd_journal,
        usec: *mut u64,
        boot_id: *mut sd_id128_t,
    ) -> c_int;

    pub fn sd_journal_wait(j: *mut sd_journal, timeout_usec: u64) -> c_int;

    pub fn sd_journal_add_match(j: *mut sd_journal, data: *const c_void, size: usize) -> c_int;
    pub fn sd_journal_add_conjunction(j: *mut sd_journal) -> c_int;
    pub fn sd_journal_add_disjunction(j: *mut sd_journal) -> c_int;
    pub fn sd_journal_flush_matches(j: *mut sd_journal);

    pub fn sd_journal_query_unique(j: *mut sd_journal, field: *const c_char) -> c_int;
    pub fn sd_journal_enumerate_unique(
        j: *mut sd_journal,
        data: *mut *const c_void,
        length: *mut usize,
    ) -> c_int;
    pub fn sd_journal_restart_unique(j: *mut sd_journal);

    pub fn sd_journal_get_usage(j: *mut sd_journal, bytes: *mut u64) -> c_int;
    pub fn sd_journal_get_catalog(j: *mut sd_journal, text: *mut *mut c_char) -> c_int;

    pub fn sd_journal_sendv(iov: *const iovec, n: c_int) -> c_int;
}

extern "C" {
    pub fn free(ptr: *mut c_void);
}
