//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::adapter::{API_LEVEL, DriverConnection, DriverCursor, PARAM_STYLE, THREAD_SAFETY};
pub use crate::config::{ConnectOptions, NetworkParams};
pub use crate::connection::{Connection, Driver};
pub use crate::cursor::{Cursor, CursorState};
pub use crate::error::{ErrorKind, IntarkDbError};
pub use crate::native::NativeApi;
pub use crate::row::Row;
pub use crate::types::{Backend, ColumnDescription, DataMode, RowValues, TypeKind};
pub use crate::{connect, connect_kv};

#[cfg(feature = "native")]
pub use crate::native::LocalLibrary;
#[cfg(feature = "network")]
pub use crate::native::NetworkLibrary;
