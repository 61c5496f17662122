//! In-memory stand-in for the native engine, for tests and benchmarks.
//!
//! [`MemoryEngine`] implements [`NativeApi`] over a tiny SQL interpreter and
//! per-database KV maps. It records every native call so tests can assert on
//! the exact protocol a connection or cursor followed, and it can be told to
//! fail the next call of a given kind.

mod sql;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::native::{
    BindValue, ConnHandle, DbHandle, KvReply, NativeApi, NativeStatus, ResultHandle,
    SessionTarget, StmtHandle,
};
use crate::placeholders::placeholder_positions;
use crate::types::{Backend, DataMode};

use sql::{Outcome, Statement, Table, TxControl};

/// KV table used until a session opens one explicitly.
pub const DEFAULT_KV_TABLE: &str = "SYS_KV";

/// One recorded native call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    Open(String),
    Close(String),
    Connect(DataMode),
    Disconnect(DataMode),
    Query(String),
    InitResult,
    DestroyResult,
    Prepare(String),
    /// `value` is the bound value's debug form, e.g. `Int16(128)`.
    Bind { index: u32, value: String },
    ExecutePrepared,
    DestroyPrepare,
    OpenTable(String),
    KvSet(String),
    KvGet(String),
    KvDel(String),
    Multi,
    Exec,
    Discard,
}

/// Calls that can be made to fail once via [`MemoryEngine::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
    Open,
    Connect,
    Query,
    Prepare,
    Bind,
    Execute,
    Transaction,
    Kv,
    InitResult,
}

#[derive(Default)]
struct Catalog {
    tables: HashMap<String, Table>,
    kv: HashMap<String, BTreeMap<String, String>>,
}

enum KvOp {
    Set(String, String),
    Del(String),
}

struct Session {
    database: String,
    mode: DataMode,
    snapshot: Option<HashMap<String, Table>>,
    kv_table: String,
    kv_pending: Option<Vec<(String, KvOp)>>,
}

#[derive(Default)]
struct ResultData {
    outcome: Outcome,
    message: Option<String>,
}

struct PreparedData {
    conn: usize,
    sql: String,
    markers: Vec<usize>,
    bound: BTreeMap<u32, String>,
    error: Option<String>,
}

#[derive(Default)]
struct EngineState {
    databases: HashMap<usize, String>,
    catalogs: HashMap<String, Catalog>,
    sessions: HashMap<usize, Session>,
    results: HashMap<usize, ResultData>,
    statements: HashMap<usize, PreparedData>,
    trace: Vec<NativeCall>,
    failures: HashSet<Failure>,
    query_delay: Option<Duration>,
}

impl EngineState {
    fn take_failure(&mut self, failure: Failure) -> bool {
        self.failures.remove(&failure)
    }

    fn catalog(&mut self, database: &str) -> &mut Catalog {
        self.catalogs.entry(database.to_string()).or_default()
    }
}

/// In-memory [`NativeApi`] implementation.
///
/// Data survives closing a database: reopening the same identifier sees the
/// tables written before, the way an on-disk database would.
pub struct MemoryEngine {
    backend: Backend,
    next_handle: AtomicUsize,
    state: Mutex<EngineState>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::local()
    }
}

impl MemoryEngine {
    /// Engine answering the local (`intarkdb_*`) surface.
    #[must_use]
    pub fn local() -> Self {
        Self::with_backend(Backend::Local)
    }

    /// Engine answering the networked (`intarkdb_client_*`) surface: no
    /// database open/close and no KV.
    #[must_use]
    pub fn networked() -> Self {
        Self::with_backend(Backend::Networked)
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            next_handle: AtomicUsize::new(1),
            state: Mutex::new(EngineState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn next_id(&self) -> usize {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// Make the next call of `failure`'s kind report an error.
    pub fn fail_next(&self, failure: Failure) {
        self.lock().failures.insert(failure);
    }

    /// Make every later `query` call sleep for `delay` after it is recorded
    /// and before it touches the session. The engine lock is not held while
    /// sleeping, so other calls proceed in the meantime.
    pub fn delay_queries(&self, delay: Duration) {
        self.lock().query_delay = Some(delay);
    }

    /// Every native call so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<NativeCall> {
        self.lock().trace.clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&NativeCall) -> bool) -> usize {
        self.lock().trace.iter().filter(|call| pred(call)).count()
    }

    pub fn clear_calls(&self) {
        self.lock().trace.clear();
    }

    /// Result sets created and not yet destroyed.
    #[must_use]
    pub fn live_results(&self) -> usize {
        self.lock().results.len()
    }

    /// Prepared statements created and not yet destroyed.
    #[must_use]
    pub fn live_statements(&self) -> usize {
        self.lock().statements.len()
    }

    /// Native sessions currently connected.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Databases currently open.
    #[must_use]
    pub fn open_databases(&self) -> usize {
        self.lock().databases.len()
    }

    fn run_sql(state: &mut EngineState, conn: usize, sql: &str) -> Result<Outcome, String> {
        let statement = sql::parse(sql)?;
        let session = state
            .sessions
            .get_mut(&conn)
            .ok_or_else(|| "invalid connection handle".to_string())?;
        if session.mode != DataMode::Sql {
            return Err("connection is in kv mode".to_string());
        }
        let database = session.database.clone();

        if let Statement::Tx(control) = statement {
            let current = state.catalog(&database).tables.clone();
            let session = state
                .sessions
                .get_mut(&conn)
                .ok_or_else(|| "invalid connection handle".to_string())?;
            match control {
                TxControl::Begin => session.snapshot = Some(current),
                TxControl::Commit => session.snapshot = None,
                TxControl::Rollback => {
                    if let Some(snapshot) = session.snapshot.take() {
                        state.catalog(&database).tables = snapshot;
                    }
                }
            }
            return Ok(Outcome::default());
        }

        sql::execute(&mut state.catalog(&database).tables, statement)
    }

    fn store_outcome(
        state: &mut EngineState,
        result: Option<ResultHandle>,
        outcome: Result<Outcome, String>,
    ) -> NativeStatus {
        let status = if outcome.is_ok() {
            NativeStatus::Success
        } else {
            NativeStatus::Error
        };
        if let Some(result) = result
            && let Some(slot) = state.results.get_mut(&result.as_raw())
        {
            *slot = match outcome {
                Ok(outcome) => ResultData {
                    outcome,
                    message: None,
                },
                Err(message) => ResultData {
                    outcome: Outcome::default(),
                    message: Some(message),
                },
            };
        }
        status
    }

    fn cell(&self, result: ResultHandle, row: i64, col: i64) -> Option<String> {
        let state = self.lock();
        let data = state.results.get(&result.as_raw())?;
        let row = data.outcome.rows.get(usize::try_from(row).ok()?)?;
        row.get(usize::try_from(col).ok()?)?.clone()
    }

    fn kv_call(
        &self,
        conn: ConnHandle,
        call: NativeCall,
        op: impl FnOnce(&mut EngineState, usize) -> Result<Option<String>, String>,
    ) -> KvReply {
        let mut state = self.lock();
        state.trace.push(call);
        if state.take_failure(Failure::Kv) {
            return KvReply {
                status: NativeStatus::Error,
                text: None,
            };
        }
        match op(&mut *state, conn.as_raw()) {
            Ok(text) => KvReply {
                status: NativeStatus::Success,
                text,
            },
            Err(_) => KvReply {
                status: NativeStatus::Error,
                text: None,
            },
        }
    }

    fn kv_session(state: &mut EngineState, conn: usize) -> Result<&mut Session, String> {
        match state.sessions.get_mut(&conn) {
            Some(session) if session.mode == DataMode::Kv => Ok(session),
            Some(_) => Err("connection is in sql mode".to_string()),
            None => Err("invalid connection handle".to_string()),
        }
    }

    fn kv_transaction(
        &self,
        conn: ConnHandle,
        call: NativeCall,
        op: impl FnOnce(&mut EngineState, usize) -> Result<(), String>,
    ) -> NativeStatus {
        let mut state = self.lock();
        state.trace.push(call);
        if state.take_failure(Failure::Transaction) {
            return NativeStatus::Error;
        }
        match op(&mut *state, conn.as_raw()) {
            Ok(()) => NativeStatus::Success,
            Err(_) => NativeStatus::Error,
        }
    }
}

fn render_bind(value: BindValue<'_>) -> String {
    match value {
        BindValue::Int8(v) => v.to_string(),
        BindValue::Int16(v) => v.to_string(),
        BindValue::Int32(v) => v.to_string(),
        BindValue::Int64(v) => v.to_string(),
        BindValue::Boolean(v) => if v { "1" } else { "0" }.to_string(),
        BindValue::Double(v) => format!("{v:?}"),
        BindValue::Varchar(s) => format!("'{}'", s.replace('\'', "''")),
        BindValue::Null => "NULL".to_string(),
    }
}

fn apply_kv(catalog: &mut Catalog, table: &str, op: KvOp) {
    let store = catalog.kv.entry(table.to_string()).or_default();
    match op {
        KvOp::Set(key, value) => {
            store.insert(key, value);
        }
        KvOp::Del(key) => {
            store.remove(&key);
        }
    }
}

impl NativeApi for MemoryEngine {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn open(&self, path: &str) -> Result<DbHandle, NativeStatus> {
        let mut state = self.lock();
        state.trace.push(NativeCall::Open(path.to_string()));
        if self.backend == Backend::Networked || state.take_failure(Failure::Open) {
            return Err(NativeStatus::Error);
        }
        let id = self.next_id();
        state.databases.insert(id, path.to_string());
        state.catalog(path);
        Ok(DbHandle::from_raw(id))
    }

    fn close(&self, db: DbHandle) {
        let mut state = self.lock();
        let path = state.databases.remove(&db.as_raw()).unwrap_or_default();
        state.trace.push(NativeCall::Close(path));
    }

    fn connect(&self, target: SessionTarget<'_>) -> Result<ConnHandle, NativeStatus> {
        let mut state = self.lock();
        let (database, mode) = match target {
            SessionTarget::Local { db, mode } => {
                let database = state.databases.get(&db.as_raw()).cloned();
                (database, mode)
            }
            SessionTarget::Networked { database, .. } => {
                (Some(database.to_string()), DataMode::Sql)
            }
        };
        state.trace.push(NativeCall::Connect(mode));
        if state.take_failure(Failure::Connect) {
            return Err(NativeStatus::Error);
        }
        let Some(database) = database else {
            return Err(NativeStatus::Error);
        };
        state.catalog(&database);
        let id = self.next_id();
        state.sessions.insert(
            id,
            Session {
                database,
                mode,
                snapshot: None,
                kv_table: DEFAULT_KV_TABLE.to_string(),
                kv_pending: None,
            },
        );
        Ok(ConnHandle::from_raw(id))
    }

    fn disconnect(&self, conn: ConnHandle, mode: DataMode) {
        let mut state = self.lock();
        state.trace.push(NativeCall::Disconnect(mode));
        state.sessions.remove(&conn.as_raw());
    }

    fn query(&self, conn: ConnHandle, sql: &str, result: Option<ResultHandle>) -> NativeStatus {
        let delay = {
            let mut state = self.lock();
            state.trace.push(NativeCall::Query(sql.to_string()));
            state.query_delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let mut state = self.lock();
        let outcome = if state.take_failure(Failure::Query) {
            Err("injected query failure".to_string())
        } else {
            Self::run_sql(&mut state, conn.as_raw(), sql)
        };
        Self::store_outcome(&mut state, result, outcome)
    }

    fn init_result(&self) -> Option<ResultHandle> {
        let mut state = self.lock();
        state.trace.push(NativeCall::InitResult);
        if state.take_failure(Failure::InitResult) {
            return None;
        }
        let id = self.next_id();
        state.results.insert(id, ResultData::default());
        Some(ResultHandle::from_raw(id))
    }

    fn destroy_result(&self, result: ResultHandle) {
        let mut state = self.lock();
        state.trace.push(NativeCall::DestroyResult);
        state.results.remove(&result.as_raw());
    }

    fn result_msg(&self, result: ResultHandle) -> Option<String> {
        self.lock()
            .results
            .get(&result.as_raw())
            .and_then(|data| data.message.clone())
    }

    fn row_count(&self, result: ResultHandle) -> i64 {
        self.lock()
            .results
            .get(&result.as_raw())
            .map_or(0, |data| i64::try_from(data.outcome.row_count()).unwrap_or(i64::MAX))
    }

    fn column_count(&self, result: ResultHandle) -> i64 {
        self.lock()
            .results
            .get(&result.as_raw())
            .map_or(0, |data| i64::try_from(data.outcome.columns.len()).unwrap_or(i64::MAX))
    }

    fn column_name(&self, result: ResultHandle, col: i64) -> Option<String> {
        let state = self.lock();
        let data = state.results.get(&result.as_raw())?;
        let (name, _) = data.outcome.columns.get(usize::try_from(col).ok()?)?;
        Some(name.clone())
    }

    fn column_type(&self, result: ResultHandle, col: i64) -> i32 {
        let state = self.lock();
        usize::try_from(col)
            .ok()
            .and_then(|col| {
                let data = state.results.get(&result.as_raw())?;
                data.outcome.columns.get(col).map(|(_, code)| *code)
            })
            .unwrap_or(0)
    }

    fn value_text(&self, result: ResultHandle, row: i64, col: i64) -> Option<String> {
        self.cell(result, row, col)
    }

    fn value_u32(&self, result: ResultHandle, row: i64, col: i64) -> u32 {
        self.cell(result, row, col)
            .and_then(|text| text.parse().ok())
            .unwrap_or(0)
    }

    fn value_u64(&self, result: ResultHandle, row: i64, col: i64) -> u64 {
        self.cell(result, row, col)
            .and_then(|text| text.parse().ok())
            .unwrap_or(0)
    }

    fn value_f64(&self, result: ResultHandle, row: i64, col: i64) -> f64 {
        self.cell(result, row, col)
            .and_then(|text| text.parse().ok())
            .unwrap_or(0.0)
    }

    fn prepare(&self, conn: ConnHandle, sql: &str) -> (NativeStatus, Option<StmtHandle>) {
        let mut state = self.lock();
        state.trace.push(NativeCall::Prepare(sql.to_string()));
        let error = if state.take_failure(Failure::Prepare) {
            Some("injected prepare failure".to_string())
        } else if !state.sessions.contains_key(&conn.as_raw()) {
            Some("invalid connection handle".to_string())
        } else {
            sql::parse(sql).err()
        };
        let id = self.next_id();
        let status = if error.is_some() {
            NativeStatus::Error
        } else {
            NativeStatus::Success
        };
        state.statements.insert(
            id,
            PreparedData {
                conn: conn.as_raw(),
                sql: sql.to_string(),
                markers: placeholder_positions(sql),
                bound: BTreeMap::new(),
                error,
            },
        );
        (status, Some(StmtHandle::from_raw(id)))
    }

    fn prepare_errmsg(&self, stmt: StmtHandle) -> Option<String> {
        self.lock()
            .statements
            .get(&stmt.as_raw())
            .and_then(|data| data.error.clone())
    }

    fn bind(&self, stmt: StmtHandle, index: u32, value: BindValue<'_>) -> NativeStatus {
        let mut state = self.lock();
        let rendered = render_bind(value);
        state.trace.push(NativeCall::Bind {
            index,
            value: format!("{value:?}"),
        });
        let injected = state.take_failure(Failure::Bind);
        let Some(data) = state.statements.get_mut(&stmt.as_raw()) else {
            return NativeStatus::Error;
        };
        let in_range = usize::try_from(index).is_ok_and(|i| i >= 1 && i <= data.markers.len());
        if injected || !in_range {
            data.error = Some(if injected {
                "injected bind failure".to_string()
            } else {
                format!("bind index {index} out of range")
            });
            return NativeStatus::Error;
        }
        data.bound.insert(index, rendered);
        NativeStatus::Success
    }

    fn execute_prepared(&self, stmt: StmtHandle, result: ResultHandle) -> NativeStatus {
        let mut state = self.lock();
        state.trace.push(NativeCall::ExecutePrepared);
        let injected = state.take_failure(Failure::Execute);
        let Some(data) = state.statements.get(&stmt.as_raw()) else {
            return NativeStatus::Error;
        };

        let mut rendered = String::with_capacity(data.sql.len());
        let mut last = 0;
        let mut missing = None;
        for (n, &pos) in data.markers.iter().enumerate() {
            rendered.push_str(&data.sql[last..pos]);
            let index = u32::try_from(n + 1).unwrap_or(u32::MAX);
            match data.bound.get(&index) {
                Some(value) => rendered.push_str(value),
                None => missing = missing.or(Some(index)),
            }
            last = pos + 1;
        }
        rendered.push_str(&data.sql[last..]);
        let conn = data.conn;

        let outcome = if injected {
            Err("injected execute failure".to_string())
        } else if let Some(index) = missing {
            Err(format!("parameter {index} is not bound"))
        } else {
            Self::run_sql(&mut state, conn, &rendered)
        };
        Self::store_outcome(&mut state, Some(result), outcome)
    }

    fn destroy_prepare(&self, stmt: StmtHandle) {
        let mut state = self.lock();
        state.trace.push(NativeCall::DestroyPrepare);
        state.statements.remove(&stmt.as_raw());
    }

    fn open_table(&self, conn: ConnHandle, name: &str, _is_memory: bool) -> NativeStatus {
        let reply = self.kv_call(conn, NativeCall::OpenTable(name.to_string()), |state, conn| {
            let session = Self::kv_session(state, conn)?;
            session.kv_table = name.to_string();
            let database = session.database.clone();
            state.catalog(&database).kv.entry(name.to_string()).or_default();
            Ok(None)
        });
        reply.status
    }

    fn kv_set(&self, conn: ConnHandle, key: &str, value: &str) -> KvReply {
        self.kv_call(conn, NativeCall::KvSet(key.to_string()), |state, conn| {
            let session = Self::kv_session(state, conn)?;
            let op = KvOp::Set(key.to_string(), value.to_string());
            if let Some(pending) = session.kv_pending.as_mut() {
                pending.push((session.kv_table.clone(), op));
                return Ok(None);
            }
            let (database, table) = (session.database.clone(), session.kv_table.clone());
            apply_kv(state.catalog(&database), &table, op);
            Ok(None)
        })
    }

    fn kv_get(&self, conn: ConnHandle, key: &str) -> KvReply {
        self.kv_call(conn, NativeCall::KvGet(key.to_string()), |state, conn| {
            let session = Self::kv_session(state, conn)?;
            let (database, table) = (session.database.clone(), session.kv_table.clone());
            let pending = session.kv_pending.as_ref().and_then(|ops| {
                ops.iter().rev().find_map(|(t, op)| match op {
                    KvOp::Set(k, v) if *t == table && k == key => Some(Some(v.clone())),
                    KvOp::Del(k) if *t == table && k == key => Some(None),
                    _ => None,
                })
            });
            if let Some(value) = pending {
                return Ok(value);
            }
            Ok(state
                .catalog(&database)
                .kv
                .get(&table)
                .and_then(|store| store.get(key).cloned()))
        })
    }

    fn kv_del(&self, conn: ConnHandle, key: &str) -> KvReply {
        self.kv_call(conn, NativeCall::KvDel(key.to_string()), |state, conn| {
            let session = Self::kv_session(state, conn)?;
            let op = KvOp::Del(key.to_string());
            if let Some(pending) = session.kv_pending.as_mut() {
                pending.push((session.kv_table.clone(), op));
                return Ok(None);
            }
            let (database, table) = (session.database.clone(), session.kv_table.clone());
            apply_kv(state.catalog(&database), &table, op);
            Ok(None)
        })
    }

    fn multi(&self, conn: ConnHandle) -> NativeStatus {
        self.kv_transaction(conn, NativeCall::Multi, |state, conn| {
            let session = Self::kv_session(state, conn)?;
            if session.kv_pending.is_some() {
                return Err("transaction already started".to_string());
            }
            session.kv_pending = Some(Vec::new());
            Ok(())
        })
    }

    fn exec(&self, conn: ConnHandle) -> NativeStatus {
        self.kv_transaction(conn, NativeCall::Exec, |state, conn| {
            let session = Self::kv_session(state, conn)?;
            let pending = session
                .kv_pending
                .take()
                .ok_or_else(|| "no transaction in progress".to_string())?;
            let database = session.database.clone();
            let catalog = state.catalog(&database);
            for (table, op) in pending {
                apply_kv(catalog, &table, op);
            }
            Ok(())
        })
    }

    fn discard(&self, conn: ConnHandle) -> NativeStatus {
        self.kv_transaction(conn, NativeCall::Discard, |state, conn| {
            let session = Self::kv_session(state, conn)?;
            session
                .kv_pending
                .take()
                .map(|_| ())
                .ok_or_else(|| "no transaction in progress".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_session(engine: &MemoryEngine) -> ConnHandle {
        let db = engine.open("mem").unwrap();
        engine
            .connect(SessionTarget::Local {
                db,
                mode: DataMode::Sql,
            })
            .unwrap()
    }

    #[test]
    fn prepared_statements_substitute_bound_values() {
        let engine = MemoryEngine::local();
        let conn = sql_session(&engine);
        assert!(engine.query(conn, "CREATE TABLE t (id INTEGER, name VARCHAR)", None).is_success());

        let (status, stmt) = engine.prepare(conn, "INSERT INTO t VALUES (?, ?)");
        assert!(status.is_success());
        let stmt = stmt.unwrap();
        assert!(engine.bind(stmt, 1, BindValue::Int32(5)).is_success());
        assert!(engine.bind(stmt, 2, BindValue::Varchar("o'neil")).is_success());
        let result = engine.init_result().unwrap();
        assert!(engine.execute_prepared(stmt, result).is_success());
        engine.destroy_prepare(stmt);

        assert!(engine.query(conn, "SELECT name FROM t WHERE id = 5", Some(result)).is_success());
        assert_eq!(engine.value_text(result, 0, 0).as_deref(), Some("o'neil"));
    }

    #[test]
    fn binding_past_the_markers_fails() {
        let engine = MemoryEngine::local();
        let conn = sql_session(&engine);
        let (_, stmt) = engine.prepare(conn, "SELECT 1");
        let stmt = stmt.unwrap();
        assert_eq!(engine.bind(stmt, 1, BindValue::Int8(1)), NativeStatus::Error);
        assert!(engine.prepare_errmsg(stmt).unwrap().contains("out of range"));
    }

    #[test]
    fn rollback_restores_the_snapshot() {
        let engine = MemoryEngine::local();
        let conn = sql_session(&engine);
        let result = engine.init_result().unwrap();
        engine.query(conn, "CREATE TABLE t (id INTEGER)", None);
        engine.query(conn, "BEGIN", None);
        engine.query(conn, "INSERT INTO t VALUES (1)", None);
        engine.query(conn, "ROLLBACK", None);
        engine.query(conn, "SELECT * FROM t", Some(result));
        assert_eq!(engine.row_count(result), 0);
    }
}
