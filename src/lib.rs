//! Session layer over the IntarkDB native interface.
//!
//! A [`Driver`] owns the engine backends and the [`DatabaseRegistry`] that
//! shares one native database handle among the local connections to the same
//! identifier. [`Connection`]s run in SQL or KV mode; [`Cursor`]s drive the
//! prepare/bind/execute/fetch protocol and decode cells into [`RowValues`].
//!
//! ```rust,no_run
//! # #[cfg(feature = "native")]
//! # fn demo() -> Result<(), intarkdb_middleware::IntarkDbError> {
//! use intarkdb_middleware::prelude::*;
//!
//! let driver = Driver::native();
//! let conn = driver.connect(&ConnectOptions::local("./demo"))?;
//! conn.execute("CREATE TABLE users (id INTEGER, name VARCHAR(20))")?;
//! conn.execute_many(
//!     "INSERT INTO users VALUES (?, ?)",
//!     &[
//!         vec![RowValues::Int(1), RowValues::Text("alice".into())],
//!         vec![RowValues::Int(2), RowValues::Text("bob".into())],
//!     ],
//! )?;
//! let rows = conn.execute("SELECT * FROM users")?.fetch_all()?;
//! assert_eq!(rows.len(), 2);
//! conn.close();
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
mod marshal;
pub mod native;
pub mod placeholders;
pub mod prelude;
pub mod registry;
pub mod row;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ConnectOptions, ConnectOptionsBuilder, NetworkParams};
pub use connection::{Connection, Driver};
pub use cursor::{Cursor, CursorState};
pub use error::{ErrorKind, IntarkDbError};
pub use registry::DatabaseRegistry;
pub use row::Row;
pub use types::{Backend, ColumnDescription, DataMode, RowValues, TypeKind};

/// Open a connection the way driver-style callers expect: a bare identifier
/// is a local database, a full set of network parameters a remote one.
///
/// # Errors
/// See [`Driver::connect_with`].
pub fn connect(
    driver: &Driver,
    database: &str,
    host: Option<&str>,
    port: Option<u16>,
    user: Option<&str>,
    password: Option<&str>,
) -> Result<Connection, IntarkDbError> {
    driver.connect_with(database, host, port, user, password)
}

/// Open a KV-mode connection to a local database.
///
/// # Errors
/// See [`Driver::connect_kv`].
pub fn connect_kv(driver: &Driver, database: &str) -> Result<Connection, IntarkDbError> {
    driver.connect_kv(&ConnectOptions::local(database))
}
