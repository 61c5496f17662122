use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::connection::{ConnectionShared, Session};
use crate::error::{ErrorKind, IntarkDbError};
use crate::marshal::{decode_cell, to_bind_arg};
use crate::native::{ConnHandle, NativeApi, NativeStatus, ResultHandle, StmtHandle};
use crate::placeholders::count_placeholders;
use crate::row::{column_index, Row};
use crate::types::{ColumnDescription, DataMode, RowValues, TypeKind};

/// Lifecycle of a [`Cursor`].
///
/// `Prepared` is only observable while a statement is in flight; the cursor
/// lock is held across prepare, bind, execute and destroy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    Open,
    Prepared,
    Executed,
    Failed,
    Closed,
}

struct CursorInner {
    state: CursorState,
    result: Option<ResultHandle>,
    rowcount: i64,
    rownumber: i64,
    description: Option<Vec<ColumnDescription>>,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl CursorInner {
    fn result_handle(&self) -> Result<ResultHandle, IntarkDbError> {
        match (self.state, self.result) {
            (CursorState::Closed, _) | (_, None) => {
                Err(IntarkDbError::programming("cursor already closed"))
            }
            (_, Some(result)) => Ok(result),
        }
    }

    fn reset_results(&mut self) {
        self.rowcount = -1;
        self.rownumber = 0;
        self.description = None;
        self.column_names = Arc::new(Vec::new());
        self.column_index = Arc::new(HashMap::new());
    }

    /// Rows left to fetch. A result without columns (DML) has none, even
    /// though its row count reports the rows it touched.
    fn remaining(&self) -> i64 {
        if self.description.is_none() {
            return 0;
        }
        (self.rowcount - self.rownumber).max(0)
    }
}

/// Executes statements and walks their results.
///
/// Every cursor owns one native result set for its whole life. Statements
/// with parameters go through prepare, bind and execute; the prepared
/// statement is destroyed before `execute` returns, whatever the outcome.
///
/// ```rust,no_run
/// use intarkdb_middleware::prelude::*;
///
/// # fn demo(conn: &Connection) -> Result<(), IntarkDbError> {
/// let cursor = conn.cursor()?;
/// cursor.execute_with("SELECT id, name FROM users WHERE id = ?", &[RowValues::Int(1)])?;
/// while let Some(row) = cursor.fetch_one()? {
///     println!("{:?}", row.get("name"));
/// }
/// cursor.close();
/// # Ok(())
/// # }
/// ```
pub struct Cursor {
    connection: Arc<ConnectionShared>,
    inner: Mutex<CursorInner>,
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Cursor")
            .field("identifier", &self.connection.identifier())
            .field("mode", &self.connection.mode())
            .field("state", &inner.state)
            .field("rowcount", &inner.rowcount)
            .field("rownumber", &inner.rownumber)
            .finish()
    }
}

impl Cursor {
    pub(crate) fn new(connection: Arc<ConnectionShared>) -> Result<Self, IntarkDbError> {
        let Some(result) = connection.api().init_result() else {
            return Err(IntarkDbError::new(
                ErrorKind::Internal,
                NativeStatus::Error.code(),
                "create cursor fail",
            ));
        };
        tracing::debug!(identifier = connection.identifier(), "result set initialised");
        Ok(Self {
            connection,
            inner: Mutex::new(CursorInner {
                state: CursorState::Open,
                result: Some(result),
                rowcount: -1,
                rownumber: 0,
                description: None,
                column_names: Arc::new(Vec::new()),
                column_index: Arc::new(HashMap::new()),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, CursorInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn api(&self) -> &dyn NativeApi {
        self.connection.api()
    }

    fn require_mode(&self, mode: DataMode, hint: &str) -> Result<(), IntarkDbError> {
        if self.connection.mode() == mode {
            Ok(())
        } else {
            Err(IntarkDbError::programming(hint))
        }
    }

    /// Run `sql` directly, without parameters.
    ///
    /// # Errors
    /// Fails with a programming error when the cursor is closed, the
    /// connection is in KV mode, or the engine rejects the statement.
    pub fn execute(&self, sql: &str) -> Result<&Self, IntarkDbError> {
        self.run(sql, None::<&[&[RowValues]]>)
    }

    /// Prepare `sql`, bind `params` to its `?` markers and execute it.
    ///
    /// # Errors
    /// Fails with a programming error when the statement does not prepare,
    /// the parameter count does not match the markers, or a bind or the
    /// execution fails. Values that cannot be converted fail with a data error.
    pub fn execute_with(&self, sql: &str, params: &[RowValues]) -> Result<&Self, IntarkDbError> {
        self.run(sql, Some(&[params][..]))
    }

    /// Execute one prepared statement once per parameter row.
    ///
    /// The first failing row aborts the batch; rows already executed stay
    /// applied.
    ///
    /// # Errors
    /// As [`execute_with`](Self::execute_with), for any row.
    pub fn execute_many<R: AsRef<[RowValues]>>(
        &self,
        sql: &str,
        rows: &[R],
    ) -> Result<&Self, IntarkDbError> {
        self.run(sql, Some(rows))
    }

    fn run<R: AsRef<[RowValues]>>(
        &self,
        sql: &str,
        rows: Option<&[R]>,
    ) -> Result<&Self, IntarkDbError> {
        let mut inner = self.lock();
        let result = inner.result_handle()?;
        self.require_mode(DataMode::Sql, "use get, set or del instead!")?;
        // held until the statement is finished so close waits for it
        let session = self.connection.session()?;
        let conn = *session;

        let outcome = match rows {
            None => self.run_direct(conn, sql, result),
            Some(rows) => self.run_prepared(&mut inner, conn, sql, result, rows),
        };

        match outcome {
            Ok(()) => {
                self.load_result_shape(&mut inner, result);
                Ok(self)
            }
            Err(err) => {
                inner.state = CursorState::Failed;
                inner.reset_results();
                Err(err)
            }
        }
    }

    fn run_direct(&self, conn: ConnHandle, sql: &str, result: ResultHandle) -> Result<(), IntarkDbError> {
        let status = self.api().query(conn, sql, Some(result));
        if status.is_success() {
            return Ok(());
        }
        let message = self
            .api()
            .result_msg(result)
            .unwrap_or_else(|| "intarkdb query fail".to_string());
        Err(IntarkDbError::from_status(status, ErrorKind::Programming, message))
    }

    fn run_prepared<R: AsRef<[RowValues]>>(
        &self,
        inner: &mut CursorInner,
        conn: ConnHandle,
        sql: &str,
        result: ResultHandle,
        rows: &[R],
    ) -> Result<(), IntarkDbError> {
        let expected = count_placeholders(sql);
        if let Some(row) = rows.iter().find(|row| row.as_ref().len() != expected) {
            return Err(IntarkDbError::programming(format!(
                "statement expects {expected} parameters, {} given",
                row.as_ref().len()
            )));
        }

        let api = self.api();
        let (status, stmt) = api.prepare(conn, sql);
        let stmt = match (status.is_success(), stmt) {
            (true, Some(stmt)) => stmt,
            (_, stmt) => {
                let message = stmt
                    .and_then(|s| api.prepare_errmsg(s))
                    .unwrap_or_else(|| "intarkdb prepare fail".to_string());
                if let Some(stmt) = stmt {
                    api.destroy_prepare(stmt);
                }
                return Err(IntarkDbError::from_status(
                    status,
                    ErrorKind::Programming,
                    message,
                ));
            }
        };
        inner.state = CursorState::Prepared;
        tracing::debug!(sql, "statement prepared");

        let outcome = rows
            .iter()
            .enumerate()
            .try_for_each(|(n, row)| self.bind_and_execute(stmt, result, row.as_ref(), n));

        api.destroy_prepare(stmt);
        tracing::debug!(sql, "prepared statement destroyed");
        outcome
    }

    fn bind_and_execute(
        &self,
        stmt: StmtHandle,
        result: ResultHandle,
        params: &[RowValues],
        row_number: usize,
    ) -> Result<(), IntarkDbError> {
        let api = self.api();
        for (idx, value) in params.iter().enumerate() {
            let arg = to_bind_arg(value)?;
            // bind indexes are 1-based
            let position = u32::try_from(idx + 1)
                .map_err(|_| IntarkDbError::programming("too many parameters"))?;
            let status = api.bind(stmt, position, arg.as_bind_value());
            if !status.is_success() {
                let message = api
                    .prepare_errmsg(stmt)
                    .unwrap_or_else(|| format!("intarkdb bind value fail at position {position}"));
                return Err(IntarkDbError::from_status(status, ErrorKind::Programming, message));
            }
        }

        let status = api.execute_prepared(stmt, result);
        if status.is_success() {
            return Ok(());
        }
        tracing::debug!(row = row_number + 1, "execute prepared failed");
        let message = api
            .result_msg(result)
            .or_else(|| api.prepare_errmsg(stmt))
            .unwrap_or_else(|| "intarkdb execute prepared fail".to_string());
        Err(IntarkDbError::from_status(status, ErrorKind::Programming, message))
    }

    fn load_result_shape(&self, inner: &mut CursorInner, result: ResultHandle) {
        let api = self.api();
        inner.reset_results();
        inner.rowcount = api.row_count(result);
        let colcount = api.column_count(result);
        if colcount > 0 {
            let description: Vec<ColumnDescription> = (0..colcount)
                .map(|col| {
                    let type_code = api.column_type(result, col);
                    ColumnDescription {
                        name: api.column_name(result, col).unwrap_or_default(),
                        kind: TypeKind::from_code(type_code),
                        type_code,
                    }
                })
                .collect();
            let names: Vec<String> = description.iter().map(|d| d.name.clone()).collect();
            inner.column_index = column_index(&names);
            inner.column_names = Arc::new(names);
            inner.description = Some(description);
        }
        inner.state = CursorState::Executed;
    }

    fn read_row(
        &self,
        inner: &CursorInner,
        result: ResultHandle,
        row: i64,
    ) -> Result<Row, IntarkDbError> {
        let description = inner.description.as_deref().unwrap_or_default();
        let mut values = Vec::with_capacity(description.len());
        for (col, column) in (0_i64..).zip(description) {
            values.push(decode_cell(
                self.api(),
                result,
                row,
                col,
                column.type_code,
            )?);
        }
        Ok(Row::with_index(
            Arc::clone(&inner.column_names),
            Arc::clone(&inner.column_index),
            values,
        ))
    }

    fn fetch_rows(&self, limit: Option<usize>) -> Result<Vec<Row>, IntarkDbError> {
        let mut inner = self.lock();
        let result = inner.result_handle()?;
        self.require_mode(DataMode::Sql, "use get instead!")?;

        let remaining = usize::try_from(inner.remaining()).unwrap_or(usize::MAX);
        let take = limit.map_or(remaining, |n| n.min(remaining));
        // The position only moves once the whole batch has decoded.
        let rows = (inner.rownumber..)
            .take(take)
            .map(|row| self.read_row(&inner, result, row))
            .collect::<Result<Vec<_>, _>>()?;
        inner.rownumber += i64::try_from(rows.len()).unwrap_or(i64::MAX);
        Ok(rows)
    }

    /// Next row, or `None` once the result set is exhausted.
    ///
    /// # Errors
    /// Fails when the cursor is closed, in KV mode, or a cell does not decode.
    pub fn fetch_one(&self) -> Result<Option<Row>, IntarkDbError> {
        Ok(self.fetch_rows(Some(1))?.into_iter().next())
    }

    /// Up to `size` rows; all remaining rows when fewer than `size` are left.
    ///
    /// # Errors
    /// See [`fetch_one`](Self::fetch_one). A cell that fails to decode fails
    /// the whole batch and leaves the position where it was.
    pub fn fetch_many(&self, size: usize) -> Result<Vec<Row>, IntarkDbError> {
        self.fetch_rows(Some(size))
    }

    /// Every remaining row; empty when already exhausted.
    ///
    /// # Errors
    /// See [`fetch_one`](Self::fetch_one).
    pub fn fetch_all(&self) -> Result<Vec<Row>, IntarkDbError> {
        self.fetch_rows(None)
    }

    /// Destroy the native result set. Closing twice only logs a warning.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.state == CursorState::Closed {
            tracing::warn!(identifier = self.connection.identifier(), "cursor already closed");
            return;
        }
        if let Some(result) = inner.result.take() {
            self.api().destroy_result(result);
        }
        inner.state = CursorState::Closed;
        inner.reset_results();
        tracing::debug!(identifier = self.connection.identifier(), "cursor shutdown");
    }

    /// Column descriptors of the last row-returning statement.
    #[must_use]
    pub fn description(&self) -> Option<Vec<ColumnDescription>> {
        self.lock().description.clone()
    }

    /// Rows in the current result set; `-1` before any successful execute.
    #[must_use]
    pub fn rowcount(&self) -> i64 {
        self.lock().rowcount
    }

    /// 0-based position of the next row to fetch.
    #[must_use]
    pub fn rownumber(&self) -> i64 {
        self.lock().rownumber
    }

    #[must_use]
    pub fn state(&self) -> CursorState {
        self.lock().state
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == CursorState::Closed
    }

    /// Accepted for driver compatibility; has no effect.
    pub fn set_input_sizes(&self, _sizes: &[usize]) {}

    /// Accepted for driver compatibility; has no effect.
    pub fn set_output_size(&self, _size: usize, _column: Option<usize>) {}

    fn kv_session(&self) -> Result<(MutexGuard<'_, CursorInner>, Session<'_>), IntarkDbError> {
        let inner = self.lock();
        inner.result_handle()?;
        self.require_mode(DataMode::Kv, "use execute instead!")?;
        let session = self.connection.session()?;
        Ok((inner, session))
    }

    /// Open (or create) the KV table subsequent `set`/`get`/`delete` act on.
    ///
    /// # Errors
    /// Fails with a programming error on a SQL-mode cursor or when the engine
    /// cannot open the table.
    pub fn open_table(&self, name: &str, is_memory: bool) -> Result<(), IntarkDbError> {
        let (_inner, session) = self.kv_session()?;
        let status = self.api().open_table(*session, name, is_memory);
        if status.is_success() {
            tracing::debug!(table = name, is_memory, "kv table opened");
            Ok(())
        } else {
            Err(IntarkDbError::from_status(
                status,
                ErrorKind::Programming,
                format!("intarkdb open table fail: {name}"),
            ))
        }
    }

    /// # Errors
    /// Fails with a programming error on a SQL-mode cursor or a failed write.
    pub fn set(&self, key: &str, value: &str) -> Result<(), IntarkDbError> {
        let (_inner, session) = self.kv_session()?;
        let reply = self.api().kv_set(*session, key, value);
        kv_outcome(reply.status, "intarkdb set fail")
    }

    /// Value stored under `key`, or `None` when the key is absent.
    ///
    /// # Errors
    /// Fails with a programming error on a SQL-mode cursor or a failed read.
    pub fn get(&self, key: &str) -> Result<Option<String>, IntarkDbError> {
        let (_inner, session) = self.kv_session()?;
        let reply = self.api().kv_get(*session, key);
        kv_outcome(reply.status, "intarkdb get fail")?;
        Ok(reply.text)
    }

    /// # Errors
    /// Fails with a programming error on a SQL-mode cursor or a failed delete.
    pub fn delete(&self, key: &str) -> Result<(), IntarkDbError> {
        let (_inner, session) = self.kv_session()?;
        let reply = self.api().kv_del(*session, key);
        kv_outcome(reply.status, "intarkdb delete fail")
    }
}

fn kv_outcome(status: NativeStatus, message: &str) -> Result<(), IntarkDbError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(IntarkDbError::from_status(status, ErrorKind::Programming, message))
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(result) = inner.result.take() {
            self.connection.api().destroy_result(result);
        }
    }
}
