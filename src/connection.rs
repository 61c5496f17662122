use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use crate::config::ConnectOptions;
use crate::cursor::Cursor;
use crate::error::{ErrorKind, IntarkDbError};
use crate::native::{ConnHandle, NativeApi, NativeStatus, SessionTarget};
use crate::registry::DatabaseRegistry;
use crate::types::{Backend, DataMode, RowValues};

/// State shared by a connection and every cursor created from it.
pub(crate) struct ConnectionShared {
    identifier: String,
    backend: Backend,
    mode: DataMode,
    api: Arc<dyn NativeApi>,
    /// Present for local connections, which hold one claim on the registry.
    registry: Option<Arc<DatabaseRegistry>>,
    /// Readers hold this across native calls; close takes it for writing,
    /// so the session cannot be disconnected under an in-flight call.
    handle: RwLock<Option<ConnHandle>>,
}

/// A live session handle, valid for as long as the guard is held.
pub(crate) struct Session<'a> {
    _guard: RwLockReadGuard<'a, Option<ConnHandle>>,
    handle: ConnHandle,
}

impl Deref for Session<'_> {
    type Target = ConnHandle;

    fn deref(&self) -> &ConnHandle {
        &self.handle
    }
}

impl ConnectionShared {
    pub(crate) fn identifier(&self) -> &str {
        &self.identifier
    }

    pub(crate) fn mode(&self) -> DataMode {
        self.mode
    }

    pub(crate) fn api(&self) -> &dyn NativeApi {
        self.api.as_ref()
    }

    /// The live session handle. Hold the returned guard for the whole
    /// native call; it must not be held while acquiring a cursor lock.
    pub(crate) fn session(&self) -> Result<Session<'_>, IntarkDbError> {
        let guard = match self.handle.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let handle = (*guard).ok_or_else(|| IntarkDbError::programming("connection already closed"))?;
        Ok(Session {
            _guard: guard,
            handle,
        })
    }

    /// Disconnect and drop the registry claim. Returns `false` when the
    /// session was already gone. Waits for in-flight native calls.
    fn shutdown(&self) -> bool {
        let mut guard = match self.handle.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(handle) = guard.take() else {
            return false;
        };
        self.api.disconnect(handle, self.mode);
        drop(guard);
        tracing::debug!(identifier = %self.identifier, mode = ?self.mode, "intarkdb disconnect success");
        if let Some(registry) = &self.registry {
            registry.release(&self.identifier);
        }
        true
    }
}

impl Drop for ConnectionShared {
    fn drop(&mut self) {
        if self.shutdown() {
            tracing::debug!(identifier = %self.identifier, "connection closed on drop");
        }
    }
}

/// A session against one database, in either SQL or KV mode.
///
/// Clones share the same native session; closing any clone closes it for
/// all of them. Cursors keep the session state alive but fail once it is
/// closed.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<ConnectionShared>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("identifier", &self.shared.identifier)
            .field("backend", &self.shared.backend)
            .field("mode", &self.shared.mode)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.shared.identifier
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.shared.backend
    }

    #[must_use]
    pub fn mode(&self) -> DataMode {
        self.shared.mode
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        match self.shared.handle.read() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    fn require_mode(&self, mode: DataMode, hint: &str) -> Result<Session<'_>, IntarkDbError> {
        if self.shared.mode != mode {
            return Err(IntarkDbError::programming(hint));
        }
        self.shared.session()
    }

    /// New cursor over this connection.
    ///
    /// # Errors
    /// Fails when the connection is closed or the engine cannot allocate a
    /// result set.
    pub fn cursor(&self) -> Result<Cursor, IntarkDbError> {
        self.shared.session()?;
        let cursor = Cursor::new(Arc::clone(&self.shared))?;
        tracing::debug!(identifier = %self.shared.identifier, "create cursor success");
        Ok(cursor)
    }

    /// Run `sql` on a fresh cursor and hand the cursor back.
    ///
    /// # Errors
    /// Fails on a KV connection or whenever [`Cursor::execute`] fails.
    pub fn execute(&self, sql: &str) -> Result<Cursor, IntarkDbError> {
        self.require_mode(DataMode::Sql, "use set, get or del instead!")?;
        let cursor = self.cursor()?;
        cursor.execute(sql)?;
        Ok(cursor)
    }

    /// # Errors
    /// Fails on a KV connection or whenever [`Cursor::execute_with`] fails.
    pub fn execute_with(&self, sql: &str, params: &[RowValues]) -> Result<Cursor, IntarkDbError> {
        self.require_mode(DataMode::Sql, "use set, get or del instead!")?;
        let cursor = self.cursor()?;
        cursor.execute_with(sql, params)?;
        Ok(cursor)
    }

    /// # Errors
    /// Fails on a KV connection or whenever [`Cursor::execute_many`] fails.
    pub fn execute_many<R: AsRef<[RowValues]>>(
        &self,
        sql: &str,
        rows: &[R],
    ) -> Result<Cursor, IntarkDbError> {
        self.require_mode(DataMode::Sql, "use set, get or del instead!")?;
        let cursor = self.cursor()?;
        cursor.execute_many(sql, rows)?;
        Ok(cursor)
    }

    fn transaction_statement(
        &self,
        statement: &str,
        hint: &str,
        failure: &str,
    ) -> Result<(), IntarkDbError> {
        let session = self.require_mode(DataMode::Sql, hint)?;
        let status = self.shared.api.query(*session, statement, None);
        transaction_outcome(status, failure)?;
        tracing::debug!(identifier = %self.shared.identifier, statement, "transaction control");
        Ok(())
    }

    fn kv_transaction(
        &self,
        call: fn(&dyn NativeApi, ConnHandle) -> NativeStatus,
        hint: &str,
        failure: &str,
    ) -> Result<(), IntarkDbError> {
        let session = self.require_mode(DataMode::Kv, hint)?;
        transaction_outcome(call(self.shared.api(), *session), failure)
    }

    /// # Errors
    /// Fails with a programming error on a KV connection and with a database
    /// error when the engine refuses.
    pub fn begin(&self) -> Result<(), IntarkDbError> {
        self.transaction_statement("begin", "use multi instead!", "transaction begin fail")
    }

    /// # Errors
    /// See [`begin`](Self::begin).
    pub fn commit(&self) -> Result<(), IntarkDbError> {
        self.transaction_statement("commit", "use exec instead!", "intarkdb commit fail")
    }

    /// # Errors
    /// See [`begin`](Self::begin).
    pub fn rollback(&self) -> Result<(), IntarkDbError> {
        self.transaction_statement("rollback", "use discard instead!", "intarkdb rollback fail")
    }

    /// Start a KV transaction.
    ///
    /// # Errors
    /// Fails with a programming error on a SQL connection and with a database
    /// error when the engine refuses.
    pub fn multi(&self) -> Result<(), IntarkDbError> {
        self.kv_transaction(|api, h| api.multi(h), "use begin instead!", "transaction multi fail")
    }

    /// Commit the KV transaction.
    ///
    /// # Errors
    /// See [`multi`](Self::multi).
    pub fn exec(&self) -> Result<(), IntarkDbError> {
        self.kv_transaction(|api, h| api.exec(h), "use commit instead!", "intarkdb exec fail")
    }

    /// Abandon the KV transaction.
    ///
    /// # Errors
    /// See [`multi`](Self::multi).
    pub fn discard(&self) -> Result<(), IntarkDbError> {
        self.kv_transaction(
            |api, h| api.discard(h),
            "use rollback instead!",
            "intarkdb discard fail",
        )
    }

    fn kv_cursor(&self) -> Result<Cursor, IntarkDbError> {
        self.require_mode(DataMode::Kv, "use execute instead!")?;
        self.cursor()
    }

    /// # Errors
    /// See [`Cursor::open_table`].
    pub fn open_table(&self, name: &str, is_memory: bool) -> Result<(), IntarkDbError> {
        self.kv_cursor()?.open_table(name, is_memory)
    }

    /// # Errors
    /// See [`Cursor::set`].
    pub fn set(&self, key: &str, value: &str) -> Result<(), IntarkDbError> {
        self.kv_cursor()?.set(key, value)
    }

    /// # Errors
    /// See [`Cursor::get`].
    pub fn get(&self, key: &str) -> Result<Option<String>, IntarkDbError> {
        self.kv_cursor()?.get(key)
    }

    /// # Errors
    /// See [`Cursor::delete`].
    pub fn delete(&self, key: &str) -> Result<(), IntarkDbError> {
        self.kv_cursor()?.delete(key)
    }

    /// Release the native session and, for local connections, the shared
    /// database claim. Closing again only logs a warning.
    pub fn close(&self) {
        if self.shared.shutdown() {
            tracing::info!(identifier = %self.shared.identifier, "connection closed");
        } else {
            tracing::warn!(identifier = %self.shared.identifier, "connection already closed");
        }
    }
}

fn transaction_outcome(status: NativeStatus, failure: &str) -> Result<(), IntarkDbError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(IntarkDbError::from_status(status, ErrorKind::Database, failure))
    }
}

/// Entry point holding the engine backends and the shared database registry.
///
/// ```rust,no_run
/// # #[cfg(feature = "native")]
/// # fn demo() -> Result<(), intarkdb_middleware::IntarkDbError> {
/// use intarkdb_middleware::prelude::*;
///
/// let driver = Driver::native();
/// let conn = driver.connect(&ConnectOptions::local("/tmp/demo"))?;
/// conn.execute("CREATE TABLE t (id INTEGER)")?;
/// conn.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Driver {
    local: Option<Arc<dyn NativeApi>>,
    networked: Option<Arc<dyn NativeApi>>,
    registry: Option<Arc<DatabaseRegistry>>,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("local", &self.local.is_some())
            .field("networked", &self.networked.is_some())
            .field("registry", &self.registry)
            .finish()
    }
}

impl Driver {
    /// Driver over a local backend; its registry is created here.
    #[must_use]
    pub fn new(local: Arc<dyn NativeApi>) -> Self {
        let registry = Arc::new(DatabaseRegistry::new(Arc::clone(&local)));
        Self {
            local: Some(local),
            networked: None,
            registry: Some(registry),
        }
    }

    /// Driver that only reaches remote engines.
    #[must_use]
    pub fn networked_only(networked: Arc<dyn NativeApi>) -> Self {
        Self {
            local: None,
            networked: Some(networked),
            registry: None,
        }
    }

    #[must_use]
    pub fn with_networked(mut self, networked: Arc<dyn NativeApi>) -> Self {
        self.networked = Some(networked);
        self
    }

    /// Driver over the linked engine libraries.
    #[cfg(feature = "native")]
    #[must_use]
    pub fn native() -> Self {
        let driver = Self::new(Arc::new(crate::native::LocalLibrary));
        #[cfg(feature = "network")]
        let driver = driver.with_networked(Arc::new(crate::native::NetworkLibrary::default()));
        driver
    }

    #[must_use]
    pub fn registry(&self) -> Option<&Arc<DatabaseRegistry>> {
        self.registry.as_ref()
    }

    /// Open a SQL-mode connection.
    ///
    /// # Errors
    /// Configuration error when the requested backend is unavailable,
    /// interface error when the database cannot be opened or the session
    /// cannot be established.
    pub fn connect(&self, options: &ConnectOptions) -> Result<Connection, IntarkDbError> {
        match &options.network {
            None => self.connect_local(&options.database, DataMode::Sql),
            Some(params) => {
                let api = self.networked.as_ref().ok_or_else(|| {
                    IntarkDbError::configuration("networked backend is not available")
                })?;
                let target = SessionTarget::Networked {
                    database: &options.database,
                    params,
                };
                let handle = api.connect(target).map_err(|status| {
                    IntarkDbError::from_status(status, ErrorKind::Interface, "intarkdb connect fail")
                })?;
                tracing::info!(
                    database = %options.database,
                    host = %params.host,
                    port = params.port,
                    "intarkdb connect success"
                );
                Ok(Connection {
                    shared: Arc::new(ConnectionShared {
                        identifier: options.database.clone(),
                        backend: Backend::Networked,
                        mode: DataMode::Sql,
                        api: Arc::clone(api),
                        registry: None,
                        handle: RwLock::new(Some(handle)),
                    }),
                })
            }
        }
    }

    /// Open a KV-mode connection. Only the local backend supports KV.
    ///
    /// # Errors
    /// Not-supported error for networked options; otherwise as
    /// [`connect`](Self::connect).
    pub fn connect_kv(&self, options: &ConnectOptions) -> Result<Connection, IntarkDbError> {
        if options.network.is_some() {
            return Err(IntarkDbError::not_supported(
                "key-value mode is not supported over the networked backend",
            ));
        }
        self.connect_local(&options.database, DataMode::Kv)
    }

    /// Driver-style connect: a bare identifier means local, a full set of
    /// network parameters means networked.
    ///
    /// # Errors
    /// Configuration error for a partial network parameter set; otherwise as
    /// [`connect`](Self::connect).
    pub fn connect_with(
        &self,
        database: &str,
        host: Option<&str>,
        port: Option<u16>,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Connection, IntarkDbError> {
        let options = ConnectOptions::from_parts(
            database,
            host.map(str::to_string),
            port,
            user.map(str::to_string),
            password.map(str::to_string),
        )?;
        self.connect(&options)
    }

    fn connect_local(&self, identifier: &str, mode: DataMode) -> Result<Connection, IntarkDbError> {
        let (Some(api), Some(registry)) = (&self.local, &self.registry) else {
            return Err(IntarkDbError::configuration("local backend is not available"));
        };

        let db = registry.acquire(identifier)?;
        let handle = match api.connect(SessionTarget::Local { db, mode }) {
            Ok(handle) => handle,
            Err(status) => {
                registry.release(identifier);
                let message = match mode {
                    DataMode::Sql => "intarkdb connect fail",
                    DataMode::Kv => "intarkdb connect kv fail",
                };
                return Err(IntarkDbError::from_status(status, ErrorKind::Interface, message));
            }
        };
        tracing::info!(identifier, mode = ?mode, "intarkdb connect success");

        Ok(Connection {
            shared: Arc::new(ConnectionShared {
                identifier: identifier.to_string(),
                backend: Backend::Local,
                mode,
                api: Arc::clone(api),
                registry: Some(Arc::clone(registry)),
                handle: RwLock::new(Some(handle)),
            }),
        })
    }
}
