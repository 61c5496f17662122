use std::fmt;

use thiserror::Error;

use crate::native::NativeStatus;

/// Status code attached to errors raised by this layer rather than the engine.
pub const CLIENT_ERROR_CODE: i32 = -1;

/// Classification of an [`IntarkDbError`].
///
/// Mirrors the DB-API exception family: `Integrity`, `Data`, `Operational`,
/// `Internal`, `NotSupported` and `Programming` are all database errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed connect arguments.
    Configuration,
    /// Open/connect/disconnect failures.
    Interface,
    /// API misuse or statement failures reported by the engine.
    Programming,
    /// Transaction control failures.
    Database,
    Integrity,
    Data,
    Operational,
    Internal,
    NotSupported,
}

impl ErrorKind {
    /// Whether this kind belongs to the database-error family.
    #[must_use]
    pub fn is_database_error(self) -> bool {
        !matches!(self, ErrorKind::Configuration | ErrorKind::Interface)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Interface => "InterfaceError",
            ErrorKind::Programming => "ProgrammingError",
            ErrorKind::Database => "DatabaseError",
            ErrorKind::Integrity => "IntegrityError",
            ErrorKind::Data => "DataError",
            ErrorKind::Operational => "OperationalError",
            ErrorKind::Internal => "InternalError",
            ErrorKind::NotSupported => "NotSupportedError",
        };
        f.write_str(name)
    }
}

/// Error raised by every fallible operation in this crate.
///
/// Callers match on [`IntarkDbError::kind`]; `code` carries the native status
/// when the engine produced the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (code {code}): {message}")]
pub struct IntarkDbError {
    pub kind: ErrorKind,
    pub code: i32,
    pub message: String,
}

impl IntarkDbError {
    #[must_use]
    pub fn new(kind: ErrorKind, code: i32, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    /// Translate a failed native status into an error of the given kind.
    ///
    /// A timed-out status is always reported as [`ErrorKind::Operational`].
    #[must_use]
    pub fn from_status(status: NativeStatus, kind: ErrorKind, message: impl Into<String>) -> Self {
        let kind = if status == NativeStatus::TimedOut {
            ErrorKind::Operational
        } else {
            kind
        };
        Self::new(kind, status.code(), message)
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, CLIENT_ERROR_CODE, message)
    }

    #[must_use]
    pub fn interface(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Interface, CLIENT_ERROR_CODE, message)
    }

    #[must_use]
    pub fn programming(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Programming, CLIENT_ERROR_CODE, message)
    }

    #[must_use]
    pub fn data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Data, CLIENT_ERROR_CODE, message)
    }

    #[must_use]
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported, CLIENT_ERROR_CODE, message)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn is_database_error(&self) -> bool {
        self.kind.is_database_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_out_status_maps_to_operational() {
        let err = IntarkDbError::from_status(NativeStatus::TimedOut, ErrorKind::Database, "commit");
        assert_eq!(err.kind(), ErrorKind::Operational);
        assert_eq!(err.code, 1);
    }

    #[test]
    fn error_status_keeps_requested_kind() {
        let err = IntarkDbError::from_status(NativeStatus::Error, ErrorKind::Programming, "boom");
        assert_eq!(err.kind(), ErrorKind::Programming);
        assert_eq!(err.code, -1);
        assert_eq!(err.to_string(), "ProgrammingError (code -1): boom");
    }

    #[test]
    fn database_family_membership() {
        assert!(ErrorKind::Integrity.is_database_error());
        assert!(ErrorKind::Programming.is_database_error());
        assert!(!ErrorKind::Interface.is_database_error());
        assert!(!ErrorKind::Configuration.is_database_error());
    }
}
