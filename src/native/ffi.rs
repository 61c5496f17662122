//! Bindings to the engine's C interface.
//!
//! Handles cross the boundary as opaque pointers and are carried on the Rust
//! side as `usize` values inside the [`super`] handle newtypes.
#![allow(unsafe_code)]

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::ptr;
#[cfg(feature = "network")]
use std::sync::atomic::{AtomicI32, Ordering};

use super::{
    BindValue, ConnHandle, DbHandle, KvReply, NativeApi, NativeStatus, ResultHandle,
    SessionTarget, StmtHandle,
};
use crate::types::{Backend, DataMode};

type Handle = *mut c_void;

#[repr(C)]
struct RawKvReply {
    kind: c_int,
    len: usize,
    text: *mut c_char,
}

#[cfg(feature = "native")]
mod local_sys {
    use super::{Handle, c_char, c_int, c_void};

    #[link(name = "intarkdb")]
    unsafe extern "C" {
        #[link_name = "intarkdb_open"]
        pub fn open(path: *const c_char, db: *mut Handle) -> c_int;
        #[link_name = "intarkdb_close"]
        pub fn close(db: *mut Handle);
        #[link_name = "intarkdb_connect"]
        pub fn connect(db: Handle, conn: *mut Handle) -> c_int;
        #[link_name = "intarkdb_connect_kv"]
        pub fn connect_kv(db: Handle, conn: *mut Handle) -> c_int;
        #[link_name = "intarkdb_disconnect"]
        pub fn disconnect(conn: *mut Handle);
        #[link_name = "intarkdb_disconnect_kv"]
        pub fn disconnect_kv(conn: *mut Handle);
        #[link_name = "intarkdb_query"]
        pub fn query(conn: Handle, sql: *const c_char, result: Handle) -> c_int;

        #[link_name = "intarkdb_init_result"]
        pub fn init_result() -> Handle;
        #[link_name = "intarkdb_destroy_result"]
        pub fn destroy_result(result: Handle);
        #[link_name = "intarkdb_result_msg"]
        pub fn result_msg(result: Handle) -> *const c_char;
        #[link_name = "intarkdb_row_count"]
        pub fn row_count(result: Handle) -> i64;
        #[link_name = "intarkdb_column_count"]
        pub fn column_count(result: Handle) -> i64;
        #[link_name = "intarkdb_column_name"]
        pub fn column_name(result: Handle, col: i64) -> *const c_char;
        #[link_name = "intarkdb_column_type"]
        pub fn column_type(result: Handle, col: i64) -> i32;
        #[link_name = "intarkdb_value_varchar"]
        pub fn value_varchar(result: Handle, row: i64, col: i64) -> *const c_char;
        #[link_name = "intarkdb_value_uint32"]
        pub fn value_uint32(result: Handle, row: i64, col: i64) -> u32;
        #[link_name = "intarkdb_value_uint64"]
        pub fn value_uint64(result: Handle, row: i64, col: i64) -> u64;
        #[link_name = "intarkdb_value_double"]
        pub fn value_double(result: Handle, row: i64, col: i64) -> f64;

        #[link_name = "intarkdb_prepare"]
        pub fn prepare(conn: Handle, sql: *const c_char, stmt: *mut Handle) -> c_int;
        #[link_name = "intarkdb_prepare_errmsg"]
        pub fn prepare_errmsg(stmt: Handle) -> *const c_char;
        #[link_name = "intarkdb_execute_prepared"]
        pub fn execute_prepared(stmt: Handle, result: Handle) -> c_int;
        #[link_name = "intarkdb_destroy_prepare"]
        pub fn destroy_prepare(stmt: *mut Handle);
        #[link_name = "intarkdb_bind_int8"]
        pub fn bind_int8(stmt: Handle, idx: u32, val: i8) -> c_int;
        #[link_name = "intarkdb_bind_int16"]
        pub fn bind_int16(stmt: Handle, idx: u32, val: i16) -> c_int;
        #[link_name = "intarkdb_bind_int32"]
        pub fn bind_int32(stmt: Handle, idx: u32, val: i32) -> c_int;
        #[link_name = "intarkdb_bind_int64"]
        pub fn bind_int64(stmt: Handle, idx: u32, val: i64) -> c_int;
        #[link_name = "intarkdb_bind_boolean"]
        pub fn bind_boolean(stmt: Handle, idx: u32, val: bool) -> c_int;
        #[link_name = "intarkdb_bind_double"]
        pub fn bind_double(stmt: Handle, idx: u32, val: f64) -> c_int;
        #[link_name = "intarkdb_bind_varchar"]
        pub fn bind_varchar(stmt: Handle, idx: u32, val: *const c_char) -> c_int;
        #[link_name = "intarkdb_bind_null"]
        pub fn bind_null(stmt: Handle, idx: u32) -> c_int;

        #[link_name = "intarkdb_open_table_kv"]
        pub fn open_table_kv(conn: Handle, name: *const c_char) -> c_int;
        #[link_name = "intarkdb_open_memtable_kv"]
        pub fn open_memtable_kv(conn: Handle, name: *const c_char) -> c_int;
        #[link_name = "intarkdb_set"]
        pub fn set(conn: Handle, key: *const c_char, val: *const c_char) -> *mut c_void;
        #[link_name = "intarkdb_get"]
        pub fn get(conn: Handle, key: *const c_char) -> *mut c_void;
        #[link_name = "intarkdb_del"]
        pub fn del(conn: Handle, key: *const c_char) -> *mut c_void;
        #[link_name = "intarkdb_multi"]
        pub fn multi(conn: Handle) -> c_int;
        #[link_name = "intarkdb_exec"]
        pub fn exec(conn: Handle) -> c_int;
        #[link_name = "intarkdb_discard"]
        pub fn discard(conn: Handle) -> c_int;
    }
}

#[cfg(feature = "network")]
mod network_sys {
    use super::{Handle, c_char, c_int};

    #[link(name = "network_client_dynamic")]
    unsafe extern "C" {
        #[link_name = "intarkdb_client_connect"]
        pub fn connect(
            host: *const c_char,
            port: c_int,
            database: *const c_char,
            user: *const c_char,
            password: *const c_char,
            conn: *mut Handle,
        ) -> c_int;
        #[link_name = "intarkdb_client_disconnect"]
        pub fn disconnect(conn: *mut Handle) -> c_int;
        #[link_name = "intarkdb_client_query"]
        pub fn query(conn: Handle, sql: *const c_char, result: Handle) -> c_int;

        #[link_name = "intarkdb_client_init_result"]
        pub fn init_result() -> Handle;
        #[link_name = "intarkdb_client_destroy_result"]
        pub fn destroy_result(result: Handle);
        #[link_name = "intarkdb_client_result_msg"]
        pub fn result_msg(result: Handle) -> *const c_char;
        #[link_name = "intarkdb_client_row_count"]
        pub fn row_count(result: Handle) -> i64;
        #[link_name = "intarkdb_client_column_count"]
        pub fn column_count(result: Handle) -> i64;
        #[link_name = "intarkdb_client_column_name"]
        pub fn column_name(result: Handle, col: i64) -> *const c_char;
        #[link_name = "intarkdb_client_column_type"]
        pub fn column_type(result: Handle, col: i64) -> i32;
        #[link_name = "intarkdb_client_value_varchar"]
        pub fn value_varchar(result: Handle, row: i64, col: i64) -> *const c_char;
        #[link_name = "intarkdb_client_value_uint32"]
        pub fn value_uint32(result: Handle, row: i64, col: i64) -> u32;
        #[link_name = "intarkdb_client_value_uint64"]
        pub fn value_uint64(result: Handle, row: i64, col: i64) -> u64;
        #[link_name = "intarkdb_client_value_double"]
        pub fn value_double(result: Handle, row: i64, col: i64) -> f64;

        #[link_name = "intarkdb_client_prepare"]
        pub fn prepare(conn: Handle, sql: *const c_char, stmt: *mut Handle, stmt_id: c_int)
        -> c_int;
        #[link_name = "intarkdb_client_prepare_errmsg"]
        pub fn prepare_errmsg(stmt: Handle) -> *const c_char;
        #[link_name = "intarkdb_client_execute_prepared"]
        pub fn execute_prepared(stmt: Handle, result: Handle) -> c_int;
        #[link_name = "intarkdb_client_destroy_prepare"]
        pub fn destroy_prepare(stmt: *mut Handle);
        #[link_name = "intarkdb_client_bind_int8"]
        pub fn bind_int8(stmt: Handle, idx: u32, val: i8) -> c_int;
        #[link_name = "intarkdb_client_bind_int16"]
        pub fn bind_int16(stmt: Handle, idx: u32, val: i16) -> c_int;
        #[link_name = "intarkdb_client_bind_int32"]
        pub fn bind_int32(stmt: Handle, idx: u32, val: i32) -> c_int;
        #[link_name = "intarkdb_client_bind_int64"]
        pub fn bind_int64(stmt: Handle, idx: u32, val: i64) -> c_int;
        #[link_name = "intarkdb_client_bind_boolean"]
        pub fn bind_boolean(stmt: Handle, idx: u32, val: i8) -> c_int;
        #[link_name = "intarkdb_client_bind_double"]
        pub fn bind_double(stmt: Handle, idx: u32, val: f64) -> c_int;
        #[link_name = "intarkdb_client_bind_varchar"]
        pub fn bind_varchar(stmt: Handle, idx: u32, val: *const c_char) -> c_int;
        #[link_name = "intarkdb_client_bind_null"]
        pub fn bind_null(stmt: Handle, idx: u32) -> c_int;
    }
}

fn to_ptr(raw: usize) -> Handle {
    raw as Handle
}

fn c_text(value: &str) -> Option<CString> {
    match CString::new(value) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!("string passed to the engine contains a NUL byte: {e}");
            None
        }
    }
}

/// Copy a C string owned by the engine.
///
/// # Safety
/// `text` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
unsafe fn owned_text(text: *const c_char) -> Option<String> {
    if text.is_null() {
        None
    } else {
        // SAFETY: non-null and NUL-terminated per the caller's contract.
        Some(unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned())
    }
}

/// # Safety
/// `reply` must be null or point to a reply produced by the engine's KV calls.
unsafe fn kv_reply(reply: *mut c_void) -> KvReply {
    if reply.is_null() {
        return KvReply {
            status: NativeStatus::Error,
            text: None,
        };
    }
    // SAFETY: the engine returns a pointer to its connection-owned reply struct.
    let raw = unsafe { &*(reply as *const RawKvReply) };
    KvReply {
        status: NativeStatus::from_code(raw.kind),
        // SAFETY: `text` is null or NUL-terminated, owned by the reply.
        text: unsafe { owned_text(raw.text) },
    }
}

/// Accessors whose signatures are identical across the two libraries.
macro_rules! shared_surface {
    ($sys:ident) => {
        fn query(&self, conn: ConnHandle, sql: &str, result: Option<ResultHandle>) -> NativeStatus {
            let Some(sql) = c_text(sql) else {
                return NativeStatus::Error;
            };
            let result = result.map_or(ptr::null_mut(), |r| to_ptr(r.as_raw()));
            // SAFETY: `conn` came from this library's connect; `sql` outlives the call.
            let code = unsafe { $sys::query(to_ptr(conn.as_raw()), sql.as_ptr(), result) };
            NativeStatus::from_code(code)
        }

        fn init_result(&self) -> Option<ResultHandle> {
            // SAFETY: no arguments; a null return signals allocation failure.
            let result = unsafe { $sys::init_result() };
            (!result.is_null()).then(|| ResultHandle::from_raw(result as usize))
        }

        fn destroy_result(&self, result: ResultHandle) {
            // SAFETY: `result` came from init_result and is destroyed once by the cursor.
            unsafe { $sys::destroy_result(to_ptr(result.as_raw())) }
        }

        fn result_msg(&self, result: ResultHandle) -> Option<String> {
            // SAFETY: `result` is live; the message is owned by the result set.
            unsafe { owned_text($sys::result_msg(to_ptr(result.as_raw()))) }
        }

        fn row_count(&self, result: ResultHandle) -> i64 {
            // SAFETY: `result` is live.
            unsafe { $sys::row_count(to_ptr(result.as_raw())) }
        }

        fn column_count(&self, result: ResultHandle) -> i64 {
            // SAFETY: `result` is live.
            unsafe { $sys::column_count(to_ptr(result.as_raw())) }
        }

        fn column_name(&self, result: ResultHandle, col: i64) -> Option<String> {
            // SAFETY: `result` is live and `col` is below its column count.
            unsafe { owned_text($sys::column_name(to_ptr(result.as_raw()), col)) }
        }

        fn column_type(&self, result: ResultHandle, col: i64) -> i32 {
            // SAFETY: `result` is live and `col` is below its column count.
            unsafe { $sys::column_type(to_ptr(result.as_raw()), col) }
        }

        fn value_text(&self, result: ResultHandle, row: i64, col: i64) -> Option<String> {
            // SAFETY: `result` is live and (row, col) is in range.
            unsafe { owned_text($sys::value_varchar(to_ptr(result.as_raw()), row, col)) }
        }

        fn value_u32(&self, result: ResultHandle, row: i64, col: i64) -> u32 {
            // SAFETY: `result` is live and (row, col) is in range.
            unsafe { $sys::value_uint32(to_ptr(result.as_raw()), row, col) }
        }

        fn value_u64(&self, result: ResultHandle, row: i64, col: i64) -> u64 {
            // SAFETY: `result` is live and (row, col) is in range.
            unsafe { $sys::value_uint64(to_ptr(result.as_raw()), row, col) }
        }

        fn value_f64(&self, result: ResultHandle, row: i64, col: i64) -> f64 {
            // SAFETY: `result` is live and (row, col) is in range.
            unsafe { $sys::value_double(to_ptr(result.as_raw()), row, col) }
        }

        fn prepare_errmsg(&self, stmt: StmtHandle) -> Option<String> {
            // SAFETY: `stmt` came from prepare and has not been destroyed.
            unsafe { owned_text($sys::prepare_errmsg(to_ptr(stmt.as_raw()))) }
        }

        fn execute_prepared(&self, stmt: StmtHandle, result: ResultHandle) -> NativeStatus {
            // SAFETY: both handles are live.
            let code =
                unsafe { $sys::execute_prepared(to_ptr(stmt.as_raw()), to_ptr(result.as_raw())) };
            NativeStatus::from_code(code)
        }

        fn destroy_prepare(&self, stmt: StmtHandle) {
            let mut handle = to_ptr(stmt.as_raw());
            // SAFETY: `stmt` is live and destroyed exactly once by the cursor.
            unsafe { $sys::destroy_prepare(&mut handle) }
        }
    };
}

/// The in-process engine (`libintarkdb`).
#[cfg(feature = "native")]
#[derive(Debug, Default)]
pub struct LocalLibrary;

#[cfg(feature = "native")]
impl NativeApi for LocalLibrary {
    shared_surface!(local_sys);

    fn backend(&self) -> Backend {
        Backend::Local
    }

    fn open(&self, path: &str) -> Result<DbHandle, NativeStatus> {
        let path = c_text(path).ok_or(NativeStatus::Error)?;
        let mut db: Handle = ptr::null_mut();
        // SAFETY: `path` outlives the call and `db` is a valid out-pointer.
        let status = NativeStatus::from_code(unsafe { local_sys::open(path.as_ptr(), &mut db) });
        if status.is_success() && !db.is_null() {
            Ok(DbHandle::from_raw(db as usize))
        } else {
            Err(status)
        }
    }

    fn close(&self, db: DbHandle) {
        let mut handle = to_ptr(db.as_raw());
        // SAFETY: `db` came from open and the registry closes it once.
        unsafe { local_sys::close(&mut handle) }
    }

    fn connect(&self, target: SessionTarget<'_>) -> Result<ConnHandle, NativeStatus> {
        let SessionTarget::Local { db, mode } = target else {
            return Err(NativeStatus::Error);
        };
        let mut conn: Handle = ptr::null_mut();
        // SAFETY: `db` is an open database and `conn` is a valid out-pointer.
        let code = unsafe {
            match mode {
                DataMode::Sql => local_sys::connect(to_ptr(db.as_raw()), &mut conn),
                DataMode::Kv => local_sys::connect_kv(to_ptr(db.as_raw()), &mut conn),
            }
        };
        let status = NativeStatus::from_code(code);
        if status.is_success() && !conn.is_null() {
            Ok(ConnHandle::from_raw(conn as usize))
        } else {
            Err(status)
        }
    }

    fn disconnect(&self, conn: ConnHandle, mode: DataMode) {
        let mut handle = to_ptr(conn.as_raw());
        // SAFETY: `conn` came from connect in the same mode and is released once.
        unsafe {
            match mode {
                DataMode::Sql => local_sys::disconnect(&mut handle),
                DataMode::Kv => local_sys::disconnect_kv(&mut handle),
            }
        }
    }

    fn prepare(&self, conn: ConnHandle, sql: &str) -> (NativeStatus, Option<StmtHandle>) {
        let Some(sql) = c_text(sql) else {
            return (NativeStatus::Error, None);
        };
        let mut stmt: Handle = ptr::null_mut();
        // SAFETY: `conn` is live, `sql` outlives the call, `stmt` is a valid out-pointer.
        let code = unsafe { local_sys::prepare(to_ptr(conn.as_raw()), sql.as_ptr(), &mut stmt) };
        let stmt = (!stmt.is_null()).then(|| StmtHandle::from_raw(stmt as usize));
        (NativeStatus::from_code(code), stmt)
    }

    fn bind(&self, stmt: StmtHandle, index: u32, value: BindValue<'_>) -> NativeStatus {
        let stmt = to_ptr(stmt.as_raw());
        // SAFETY: `stmt` is a live prepared statement; text outlives the call.
        let code = unsafe {
            match value {
                BindValue::Int8(v) => local_sys::bind_int8(stmt, index, v),
                BindValue::Int16(v) => local_sys::bind_int16(stmt, index, v),
                BindValue::Int32(v) => local_sys::bind_int32(stmt, index, v),
                BindValue::Int64(v) => local_sys::bind_int64(stmt, index, v),
                BindValue::Boolean(v) => local_sys::bind_boolean(stmt, index, v),
                BindValue::Double(v) => local_sys::bind_double(stmt, index, v),
                BindValue::Varchar(v) => match c_text(v) {
                    Some(text) => local_sys::bind_varchar(stmt, index, text.as_ptr()),
                    None => NativeStatus::Error.code(),
                },
                BindValue::Null => local_sys::bind_null(stmt, index),
            }
        };
        NativeStatus::from_code(code)
    }

    fn open_table(&self, conn: ConnHandle, name: &str, is_memory: bool) -> NativeStatus {
        let Some(name) = c_text(name) else {
            return NativeStatus::Error;
        };
        let conn = to_ptr(conn.as_raw());
        // SAFETY: `conn` is a live KV session; `name` outlives the call.
        let code = unsafe {
            if is_memory {
                local_sys::open_memtable_kv(conn, name.as_ptr())
            } else {
                local_sys::open_table_kv(conn, name.as_ptr())
            }
        };
        NativeStatus::from_code(code)
    }

    fn kv_set(&self, conn: ConnHandle, key: &str, value: &str) -> KvReply {
        let (Some(key), Some(value)) = (c_text(key), c_text(value)) else {
            return KvReply {
                status: NativeStatus::Error,
                text: None,
            };
        };
        // SAFETY: `conn` is a live KV session; strings outlive the call.
        unsafe { kv_reply(local_sys::set(to_ptr(conn.as_raw()), key.as_ptr(), value.as_ptr())) }
    }

    fn kv_get(&self, conn: ConnHandle, key: &str) -> KvReply {
        let Some(key) = c_text(key) else {
            return KvReply {
                status: NativeStatus::Error,
                text: None,
            };
        };
        // SAFETY: `conn` is a live KV session; `key` outlives the call.
        unsafe { kv_reply(local_sys::get(to_ptr(conn.as_raw()), key.as_ptr())) }
    }

    fn kv_del(&self, conn: ConnHandle, key: &str) -> KvReply {
        let Some(key) = c_text(key) else {
            return KvReply {
                status: NativeStatus::Error,
                text: None,
            };
        };
        // SAFETY: `conn` is a live KV session; `key` outlives the call.
        unsafe { kv_reply(local_sys::del(to_ptr(conn.as_raw()), key.as_ptr())) }
    }

    fn multi(&self, conn: ConnHandle) -> NativeStatus {
        // SAFETY: `conn` is a live KV session.
        NativeStatus::from_code(unsafe { local_sys::multi(to_ptr(conn.as_raw())) })
    }

    fn exec(&self, conn: ConnHandle) -> NativeStatus {
        // SAFETY: `conn` is a live KV session.
        NativeStatus::from_code(unsafe { local_sys::exec(to_ptr(conn.as_raw())) })
    }

    fn discard(&self, conn: ConnHandle) -> NativeStatus {
        // SAFETY: `conn` is a live KV session.
        NativeStatus::from_code(unsafe { local_sys::discard(to_ptr(conn.as_raw())) })
    }
}

/// The networked client (`libnetwork_client_dynamic`).
///
/// The client library has no database open/close or KV entry points; those
/// calls report [`NativeStatus::Error`] without touching the library.
#[cfg(feature = "network")]
#[derive(Debug)]
pub struct NetworkLibrary {
    next_stmt_id: AtomicI32,
}

#[cfg(feature = "network")]
impl Default for NetworkLibrary {
    fn default() -> Self {
        Self {
            next_stmt_id: AtomicI32::new(1),
        }
    }
}

#[cfg(feature = "network")]
impl NetworkLibrary {
    fn unsupported_reply() -> KvReply {
        KvReply {
            status: NativeStatus::Error,
            text: None,
        }
    }
}

#[cfg(feature = "network")]
impl NativeApi for NetworkLibrary {
    shared_surface!(network_sys);

    fn backend(&self) -> Backend {
        Backend::Networked
    }

    fn open(&self, _path: &str) -> Result<DbHandle, NativeStatus> {
        Err(NativeStatus::Error)
    }

    fn close(&self, _db: DbHandle) {}

    fn connect(&self, target: SessionTarget<'_>) -> Result<ConnHandle, NativeStatus> {
        let SessionTarget::Networked { database, params } = target else {
            return Err(NativeStatus::Error);
        };
        let (Some(host), Some(database), Some(user), Some(password)) = (
            c_text(&params.host),
            c_text(database),
            c_text(&params.user),
            c_text(&params.password),
        ) else {
            return Err(NativeStatus::Error);
        };
        let mut conn: Handle = ptr::null_mut();
        // SAFETY: all strings outlive the call and `conn` is a valid out-pointer.
        let code = unsafe {
            network_sys::connect(
                host.as_ptr(),
                c_int::from(params.port),
                database.as_ptr(),
                user.as_ptr(),
                password.as_ptr(),
                &mut conn,
            )
        };
        let status = NativeStatus::from_code(code);
        if status.is_success() && !conn.is_null() {
            Ok(ConnHandle::from_raw(conn as usize))
        } else {
            Err(status)
        }
    }

    fn disconnect(&self, conn: ConnHandle, _mode: DataMode) {
        let mut handle = to_ptr(conn.as_raw());
        // SAFETY: `conn` came from connect and is released once.
        let code = unsafe { network_sys::disconnect(&mut handle) };
        if code != 0 {
            tracing::warn!("networked disconnect returned status {code}");
        }
    }

    fn prepare(&self, conn: ConnHandle, sql: &str) -> (NativeStatus, Option<StmtHandle>) {
        let Some(sql) = c_text(sql) else {
            return (NativeStatus::Error, None);
        };
        let stmt_id = self.next_stmt_id.fetch_add(1, Ordering::Relaxed);
        let mut stmt: Handle = ptr::null_mut();
        // SAFETY: `conn` is live, `sql` outlives the call, `stmt` is a valid out-pointer.
        let code = unsafe {
            network_sys::prepare(to_ptr(conn.as_raw()), sql.as_ptr(), &mut stmt, stmt_id)
        };
        let stmt = (!stmt.is_null()).then(|| StmtHandle::from_raw(stmt as usize));
        (NativeStatus::from_code(code), stmt)
    }

    fn bind(&self, stmt: StmtHandle, index: u32, value: BindValue<'_>) -> NativeStatus {
        let stmt = to_ptr(stmt.as_raw());
        // SAFETY: `stmt` is a live prepared statement; text outlives the call.
        let code = unsafe {
            match value {
                BindValue::Int8(v) => network_sys::bind_int8(stmt, index, v),
                BindValue::Int16(v) => network_sys::bind_int16(stmt, index, v),
                BindValue::Int32(v) => network_sys::bind_int32(stmt, index, v),
                BindValue::Int64(v) => network_sys::bind_int64(stmt, index, v),
                BindValue::Boolean(v) => network_sys::bind_boolean(stmt, index, i8::from(v)),
                BindValue::Double(v) => network_sys::bind_double(stmt, index, v),
                BindValue::Varchar(v) => match c_text(v) {
                    Some(text) => network_sys::bind_varchar(stmt, index, text.as_ptr()),
                    None => NativeStatus::Error.code(),
                },
                BindValue::Null => network_sys::bind_null(stmt, index),
            }
        };
        NativeStatus::from_code(code)
    }

    fn open_table(&self, _conn: ConnHandle, _name: &str, _is_memory: bool) -> NativeStatus {
        NativeStatus::Error
    }

    fn kv_set(&self, _conn: ConnHandle, _key: &str, _value: &str) -> KvReply {
        Self::unsupported_reply()
    }

    fn kv_get(&self, _conn: ConnHandle, _key: &str) -> KvReply {
        Self::unsupported_reply()
    }

    fn kv_del(&self, _conn: ConnHandle, _key: &str) -> KvReply {
        Self::unsupported_reply()
    }

    fn multi(&self, _conn: ConnHandle) -> NativeStatus {
        NativeStatus::Error
    }

    fn exec(&self, _conn: ConnHandle) -> NativeStatus {
        NativeStatus::Error
    }

    fn discard(&self, _conn: ConnHandle) -> NativeStatus {
        NativeStatus::Error
    }
}
