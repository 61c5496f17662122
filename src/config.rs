use std::fmt;

use serde::Deserialize;

use crate::error::IntarkDbError;
use crate::types::Backend;

/// Identifier used when none is given: the current directory.
pub const DEFAULT_DATABASE: &str = ".";

/// Credentials and address of a remote engine instance.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for NetworkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Options for opening a connection.
///
/// Either all four network parameters are present (networked backend) or none
/// are (local backend); anything in between is a configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConnectOptions")]
pub struct ConnectOptions {
    pub database: String,
    pub network: Option<NetworkParams>,
}

#[derive(Deserialize)]
struct RawConnectOptions {
    #[serde(default = "default_database")]
    database: String,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

impl TryFrom<RawConnectOptions> for ConnectOptions {
    type Error = IntarkDbError;

    fn try_from(raw: RawConnectOptions) -> Result<Self, Self::Error> {
        ConnectOptions::from_parts(raw.database, raw.host, raw.port, raw.user, raw.password)
    }
}

impl ConnectOptions {
    /// Local backend against `database`.
    #[must_use]
    pub fn local(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            network: None,
        }
    }

    #[must_use]
    pub fn networked(database: impl Into<String>, params: NetworkParams) -> Self {
        Self {
            database: database.into(),
            network: Some(params),
        }
    }

    #[must_use]
    pub fn builder(database: impl Into<String>) -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new(database)
    }

    /// Build options from the driver-style optional arguments.
    ///
    /// # Errors
    /// Returns a configuration error when only some of `host`, `port`, `user`
    /// and `password` are supplied, or when any supplied one is empty.
    pub fn from_parts(
        database: impl Into<String>,
        host: Option<String>,
        port: Option<u16>,
        user: Option<String>,
        password: Option<String>,
    ) -> Result<Self, IntarkDbError> {
        let database = database.into();
        match (host, port, user, password) {
            (None, None, None, None) => Ok(Self::local(database)),
            (Some(host), Some(port), Some(user), Some(password))
                if !host.is_empty() && port != 0 && !user.is_empty() && !password.is_empty() =>
            {
                Ok(Self::networked(
                    database,
                    NetworkParams {
                        host,
                        port,
                        user,
                        password,
                    },
                ))
            }
            _ => Err(IntarkDbError::configuration(
                "host and port and user and password must be all set",
            )),
        }
    }

    /// Parse options from a JSON object such as
    /// `{"database": "demo", "host": "127.0.0.1", "port": 9000, "user": "u", "password": "p"}`.
    ///
    /// # Errors
    /// Returns a configuration error for malformed JSON or a partial network set.
    pub fn from_json_str(json: &str) -> Result<Self, IntarkDbError> {
        serde_json::from_str(json).map_err(|e| IntarkDbError::configuration(e.to_string()))
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        if self.network.is_some() {
            Backend::Networked
        } else {
            Backend::Local
        }
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::local(DEFAULT_DATABASE)
    }
}

/// Fluent builder for [`ConnectOptions`].
#[derive(Debug, Clone, Default)]
pub struct ConnectOptionsBuilder {
    database: String,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
}

impl ConnectOptionsBuilder {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// # Errors
    /// Returns a configuration error when the network parameters are partial.
    pub fn finish(self) -> Result<ConnectOptions, IntarkDbError> {
        ConnectOptions::from_parts(self.database, self.host, self.port, self.user, self.password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn no_network_parts_means_local() {
        let opts = ConnectOptions::builder("db").finish().unwrap();
        assert_eq!(opts.backend(), Backend::Local);
        assert_eq!(opts.database, "db");
    }

    #[test]
    fn full_network_parts_means_networked() {
        let opts = ConnectOptions::builder("db")
            .host("127.0.0.1")
            .port(9000)
            .user("admin")
            .password("secret")
            .finish()
            .unwrap();
        assert_eq!(opts.backend(), Backend::Networked);
        assert!(!format!("{opts:?}").contains("secret"));
    }

    #[test]
    fn partial_network_parts_are_rejected() {
        let err = ConnectOptions::builder("db")
            .host("127.0.0.1")
            .port(9000)
            .finish()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn json_options_are_validated() {
        let opts = ConnectOptions::from_json_str(r#"{"database": "demo"}"#).unwrap();
        assert_eq!(opts, ConnectOptions::local("demo"));

        let opts = ConnectOptions::from_json_str("{}").unwrap();
        assert_eq!(opts.database, DEFAULT_DATABASE);

        let err = ConnectOptions::from_json_str(r#"{"database": "demo", "user": "u"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
