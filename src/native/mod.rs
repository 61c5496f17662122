//! The fixed call surface exposed by the engine.
//!
//! [`NativeApi`] is the seam between the session layer and the engine. The
//! local (`intarkdb_*`) and networked (`intarkdb_client_*`) entry points are
//! two implementations of it; a connection picks one at connect time and keeps
//! it for its whole lifetime.

#[cfg(any(feature = "native", feature = "network"))]
mod ffi;

#[cfg(feature = "native")]
pub use ffi::LocalLibrary;
#[cfg(feature = "network")]
pub use ffi::NetworkLibrary;

use crate::config::NetworkParams;
use crate::types::{Backend, DataMode};

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(usize);

        impl $name {
            /// Wrap a raw handle value produced by a [`NativeApi`] implementation.
            #[must_use]
            pub fn from_raw(raw: usize) -> Self {
                Self(raw)
            }

            #[must_use]
            pub fn as_raw(self) -> usize {
                self.0
            }
        }
    };
}

opaque_handle!(
    /// Opened native database.
    DbHandle
);
opaque_handle!(
    /// Native session (connection) handle.
    ConnHandle
);
opaque_handle!(
    /// Native prepared statement.
    StmtHandle
);
opaque_handle!(
    /// Native result set.
    ResultHandle
);

/// Status returned by engine entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeStatus {
    Success,
    Error,
    TimedOut,
    Other(i32),
}

impl NativeStatus {
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => NativeStatus::Success,
            -1 => NativeStatus::Error,
            1 => NativeStatus::TimedOut,
            other => NativeStatus::Other(other),
        }
    }

    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            NativeStatus::Success => 0,
            NativeStatus::Error => -1,
            NativeStatus::TimedOut => 1,
            NativeStatus::Other(code) => code,
        }
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        self == NativeStatus::Success
    }
}

/// A value ready for one of the engine's `bind_<kind>` entry points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindValue<'a> {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Boolean(bool),
    Double(f64),
    Varchar(&'a str),
    Null,
}

/// Reply of a KV `set`/`get`/`del` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvReply {
    pub status: NativeStatus,
    pub text: Option<String>,
}

/// What a native session is opened against.
#[derive(Debug, Clone, Copy)]
pub enum SessionTarget<'a> {
    /// A database opened through the registry.
    Local { db: DbHandle, mode: DataMode },
    /// A remote engine instance addressed by database name and credentials.
    Networked {
        database: &'a str,
        params: &'a NetworkParams,
    },
}

/// Entry points of one engine backend.
///
/// Row and column indexes are 0-based; bind indexes are 1-based. String
/// results are `None` when the engine hands back a null pointer.
pub trait NativeApi: Send + Sync {
    fn backend(&self) -> Backend;

    fn open(&self, path: &str) -> Result<DbHandle, NativeStatus>;
    fn close(&self, db: DbHandle);

    fn connect(&self, target: SessionTarget<'_>) -> Result<ConnHandle, NativeStatus>;
    fn disconnect(&self, conn: ConnHandle, mode: DataMode);

    /// Run `sql` directly. Results land in `result` when one is supplied.
    fn query(&self, conn: ConnHandle, sql: &str, result: Option<ResultHandle>) -> NativeStatus;

    fn init_result(&self) -> Option<ResultHandle>;
    fn destroy_result(&self, result: ResultHandle);
    fn result_msg(&self, result: ResultHandle) -> Option<String>;
    fn row_count(&self, result: ResultHandle) -> i64;
    fn column_count(&self, result: ResultHandle) -> i64;
    fn column_name(&self, result: ResultHandle, col: i64) -> Option<String>;
    fn column_type(&self, result: ResultHandle, col: i64) -> i32;
    fn value_text(&self, result: ResultHandle, row: i64, col: i64) -> Option<String>;
    fn value_u32(&self, result: ResultHandle, row: i64, col: i64) -> u32;
    fn value_u64(&self, result: ResultHandle, row: i64, col: i64) -> u64;
    fn value_f64(&self, result: ResultHandle, row: i64, col: i64) -> f64;

    /// Prepare `sql`. The statement handle may be present even on failure so
    /// the caller can read its error message and destroy it.
    fn prepare(&self, conn: ConnHandle, sql: &str) -> (NativeStatus, Option<StmtHandle>);
    fn prepare_errmsg(&self, stmt: StmtHandle) -> Option<String>;
    fn bind(&self, stmt: StmtHandle, index: u32, value: BindValue<'_>) -> NativeStatus;
    fn execute_prepared(&self, stmt: StmtHandle, result: ResultHandle) -> NativeStatus;
    fn destroy_prepare(&self, stmt: StmtHandle);

    fn open_table(&self, conn: ConnHandle, name: &str, is_memory: bool) -> NativeStatus;
    fn kv_set(&self, conn: ConnHandle, key: &str, value: &str) -> KvReply;
    fn kv_get(&self, conn: ConnHandle, key: &str) -> KvReply;
    fn kv_del(&self, conn: ConnHandle, key: &str) -> KvReply;
    fn multi(&self, conn: ConnHandle) -> NativeStatus;
    fn exec(&self, conn: ConnHandle) -> NativeStatus;
    fn discard(&self, conn: ConnHandle) -> NativeStatus;
}
