//! Driver-shaped surface for SQL toolkits.
//!
//! Toolkits written against a generic "driver" contract (connect, cursor,
//! execute, fetch) can target [`DriverConnection`] and [`DriverCursor`]
//! instead of the concrete types.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::{ConnectOptions, DEFAULT_DATABASE};
use crate::connection::{Connection, Driver};
use crate::cursor::Cursor;
use crate::error::IntarkDbError;
use crate::row::Row;
use crate::types::{ColumnDescription, RowValues};

/// Driver API level implemented by this crate.
pub const API_LEVEL: &str = "2.0";
/// Threads may share the module but not connections' cursors mid-statement.
pub const THREAD_SAFETY: u8 = 1;
/// Positional `?` markers.
pub const PARAM_STYLE: &str = "qmark";

/// Dialect name reported to toolkits.
pub const DIALECT_NAME: &str = "IntarkDB";

static URL_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r"^intarkdb://(?:(?P<user>[^:@/]+)(?::(?P<password>[^@/]*))?@)?(?P<host>[^:/@]+)?(?::(?P<port>\d+))?/(?P<database>.*)$",
    )
});

/// Turn a toolkit URL into connect options.
///
/// `intarkdb:///path/to/db` is a local database; a URL carrying a host,
/// port and credentials (`intarkdb://user:pw@host:9000/name`) is networked.
///
/// # Errors
/// Returns a configuration error for a URL that does not match the scheme or
/// names only part of the network parameters.
pub fn connect_options_from_url(url: &str) -> Result<ConnectOptions, IntarkDbError> {
    let pattern = URL_PATTERN
        .as_ref()
        .map_err(|e| IntarkDbError::configuration(format!("url pattern: {e}")))?;
    let caps = pattern
        .captures(url)
        .ok_or_else(|| IntarkDbError::configuration(format!("not an intarkdb url: {url}")))?;

    let text = |name: &str| caps.name(name).map(|m| m.as_str().to_string());
    let port = caps
        .name("port")
        .map(|m| m.as_str().parse::<u16>())
        .transpose()
        .map_err(|e| IntarkDbError::configuration(format!("invalid port: {e}")))?;
    let database = text("database")
        .filter(|db| !db.is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

    ConnectOptions::from_parts(database, text("host"), port, text("user"), text("password"))
}

/// Whether a toolkit should discard the connection after `err`.
#[must_use]
pub fn is_disconnect(err: &IntarkDbError) -> bool {
    err.is_database_error()
}

/// Connection half of the driver contract.
pub trait DriverConnection {
    type Cursor: DriverCursor;

    /// # Errors
    /// Propagates the backend's failure.
    fn cursor(&self) -> Result<Self::Cursor, IntarkDbError>;

    /// Run `sql` with optional parameters on a fresh cursor.
    ///
    /// # Errors
    /// Propagates the backend's failure.
    fn execute(
        &self,
        sql: &str,
        params: Option<&[RowValues]>,
    ) -> Result<Self::Cursor, IntarkDbError>;

    /// # Errors
    /// Propagates the backend's failure.
    fn executemany(
        &self,
        sql: &str,
        rows: &[Vec<RowValues>],
    ) -> Result<Self::Cursor, IntarkDbError>;

    /// # Errors
    /// Propagates the backend's failure.
    fn begin(&self) -> Result<(), IntarkDbError>;

    /// # Errors
    /// Propagates the backend's failure.
    fn commit(&self) -> Result<(), IntarkDbError>;

    /// # Errors
    /// Propagates the backend's failure.
    fn rollback(&self) -> Result<(), IntarkDbError>;

    fn close(&self);

    /// First column of the first row, or `None` for an empty result.
    ///
    /// # Errors
    /// Propagates the backend's failure.
    fn scalar(
        &self,
        sql: &str,
        params: Option<&[RowValues]>,
    ) -> Result<Option<RowValues>, IntarkDbError> {
        let cursor = self.execute(sql, params)?;
        let first = cursor.fetchone()?;
        Ok(first.and_then(|row| row.into_values().into_iter().next()))
    }

    /// Whether the engine catalog lists a table called `name`.
    ///
    /// # Errors
    /// Propagates the backend's failure.
    fn has_table(&self, name: &str) -> Result<bool, IntarkDbError> {
        let params = [RowValues::Text(name.to_string())];
        let sql = "SELECT name FROM 'SYS_TABLES' WHERE name = ?";
        let cursor = self.execute(sql, Some(&params[..]))?;
        Ok(cursor.fetchone()?.is_some())
    }

    /// The engine has no schemas, so this is always empty.
    ///
    /// # Errors
    /// Never fails for the built-in implementations.
    fn get_schema_names(&self) -> Result<Vec<String>, IntarkDbError> {
        Ok(Vec::new())
    }
}

/// Cursor half of the driver contract.
pub trait DriverCursor {
    /// # Errors
    /// Propagates the backend's failure.
    fn execute(&self, sql: &str, params: Option<&[RowValues]>) -> Result<(), IntarkDbError>;

    /// # Errors
    /// Propagates the backend's failure.
    fn fetchone(&self) -> Result<Option<Row>, IntarkDbError>;

    /// # Errors
    /// Propagates the backend's failure.
    fn fetchmany(&self, size: usize) -> Result<Vec<Row>, IntarkDbError>;

    /// # Errors
    /// Propagates the backend's failure.
    fn fetchall(&self) -> Result<Vec<Row>, IntarkDbError>;

    fn description(&self) -> Option<Vec<ColumnDescription>>;
    fn rowcount(&self) -> i64;
    fn rownumber(&self) -> i64;
    fn close(&self);
}

impl DriverConnection for Connection {
    type Cursor = Cursor;

    fn cursor(&self) -> Result<Cursor, IntarkDbError> {
        Connection::cursor(self)
    }

    fn execute(&self, sql: &str, params: Option<&[RowValues]>) -> Result<Cursor, IntarkDbError> {
        match params {
            None => Connection::execute(self, sql),
            Some(params) => self.execute_with(sql, params),
        }
    }

    fn executemany(&self, sql: &str, rows: &[Vec<RowValues>]) -> Result<Cursor, IntarkDbError> {
        self.execute_many(sql, rows)
    }

    fn begin(&self) -> Result<(), IntarkDbError> {
        Connection::begin(self)
    }

    fn commit(&self) -> Result<(), IntarkDbError> {
        Connection::commit(self)
    }

    fn rollback(&self) -> Result<(), IntarkDbError> {
        Connection::rollback(self)
    }

    fn close(&self) {
        Connection::close(self);
    }
}

impl DriverCursor for Cursor {
    fn execute(&self, sql: &str, params: Option<&[RowValues]>) -> Result<(), IntarkDbError> {
        match params {
            None => Cursor::execute(self, sql)?,
            Some(params) => self.execute_with(sql, params)?,
        };
        Ok(())
    }

    fn fetchone(&self) -> Result<Option<Row>, IntarkDbError> {
        self.fetch_one()
    }

    fn fetchmany(&self, size: usize) -> Result<Vec<Row>, IntarkDbError> {
        self.fetch_many(size)
    }

    fn fetchall(&self) -> Result<Vec<Row>, IntarkDbError> {
        self.fetch_all()
    }

    fn description(&self) -> Option<Vec<ColumnDescription>> {
        Cursor::description(self)
    }

    fn rowcount(&self) -> i64 {
        Cursor::rowcount(self)
    }

    fn rownumber(&self) -> i64 {
        Cursor::rownumber(self)
    }

    fn close(&self) {
        Cursor::close(self);
    }
}

/// Open a connection from a toolkit URL.
///
/// # Errors
/// See [`connect_options_from_url`] and [`Driver::connect`].
pub fn connect_url(driver: &Driver, url: &str) -> Result<Connection, IntarkDbError> {
    let options = connect_options_from_url(url)?;
    driver.connect(&options)
}
