use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ErrorKind, IntarkDbError};
use crate::native::{DbHandle, NativeApi};

struct RegistryEntry {
    handle: DbHandle,
    count: usize,
}

/// Shares one native database handle among the local connections opened
/// against the same identifier.
///
/// The first [`acquire`](Self::acquire) for an identifier opens the database;
/// the [`release`](Self::release) that drops the count to zero closes it. All
/// bookkeeping happens under a single lock.
pub struct DatabaseRegistry {
    api: Arc<dyn NativeApi>,
    entries: Mutex<HashMap<String, RegistryEntry>>,
}

impl fmt::Debug for DatabaseRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open: Vec<String> = self.lock().keys().cloned().collect();
        f.debug_struct("DatabaseRegistry")
            .field("backend", &self.api.backend())
            .field("open", &open)
            .finish()
    }
}

impl DatabaseRegistry {
    #[must_use]
    pub fn new(api: Arc<dyn NativeApi>) -> Self {
        Self {
            api,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RegistryEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            // The map stays consistent across a panicking caller; keep using it.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Claim the database behind `identifier`, opening it on first use.
    ///
    /// # Errors
    /// Returns an interface error when the native open fails; the count is
    /// left untouched in that case.
    pub fn acquire(&self, identifier: &str) -> Result<DbHandle, IntarkDbError> {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(identifier) {
            entry.count += 1;
            tracing::debug!(identifier, count = entry.count, "database handle shared");
            return Ok(entry.handle);
        }

        let handle = self.api.open(identifier).map_err(|status| {
            IntarkDbError::from_status(
                status,
                ErrorKind::Interface,
                format!("cannot open database, path = {identifier}"),
            )
        })?;
        tracing::info!(identifier, "open database success");
        entries.insert(identifier.to_string(), RegistryEntry { handle, count: 1 });
        Ok(handle)
    }

    /// Drop one claim on `identifier`, closing the database at zero.
    ///
    /// Releasing an identifier with no live claim only logs a warning.
    pub fn release(&self, identifier: &str) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(identifier) else {
            tracing::warn!(identifier, "release without a matching acquire");
            return;
        };
        entry.count -= 1;
        if entry.count > 0 {
            tracing::debug!(identifier, count = entry.count, "database handle released");
            return;
        }
        if let Some(entry) = entries.remove(identifier) {
            self.api.close(entry.handle);
            tracing::info!(identifier, "close database success");
        }
    }

    /// Live claims on `identifier`; zero when it is not open.
    #[must_use]
    pub fn ref_count(&self, identifier: &str) -> usize {
        self.lock().get(identifier).map_or(0, |entry| entry.count)
    }

    #[must_use]
    pub fn is_open(&self, identifier: &str) -> bool {
        self.lock().contains_key(identifier)
    }
}
