//! Relational connections for the mirror.
//!
//! [`ConnectionProvider`] opens one fresh connection per call from resolved
//! [`MirrorSettings`]; nothing is pooled or held between calls. Drivers are
//! compiled in: SQLite always, MySQL with the `mysql` cargo feature.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ReplacePlan;
use crate::config::MirrorSettings;
use crate::errors::MirrorError;

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Relational driver used for the mirror.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    MySql,
    Sqlite,
}

impl Driver {
    /// Whether this build carries the driver.
    pub fn is_available(self) -> bool {
        match self {
            Self::Sqlite => true,
            Self::MySql => cfg!(feature = "mysql"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown driver '{other}', expected 'mysql' or 'sqlite'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// An open relational connection able to replace a table's contents.
pub trait MirrorConnection {
    /// Execute the plan's delete and inserts inside one transaction. Either
    /// everything commits or nothing does.
    fn apply(&mut self, plan: &ReplacePlan) -> Result<(), MirrorError>;
}

/// A source of mirror connections.
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn MirrorConnection>, MirrorError>;

    /// Human-readable target, never containing credentials.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// ConnectionProvider
// ---------------------------------------------------------------------------

/// Opens connections for the configured driver.
#[derive(Debug, Clone)]
pub struct ConnectionProvider {
    settings: MirrorSettings,
}

impl ConnectionProvider {
    /// Fails with [`MirrorError::DriverUnavailable`] when the configured
    /// driver is not compiled into this build.
    pub fn new(settings: MirrorSettings) -> Result<Self, MirrorError> {
        if !settings.driver.is_available() {
            return Err(MirrorError::DriverUnavailable(settings.driver.to_string()));
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    /// Connection string for the configured target. The password is never
    /// part of it.
    pub fn connection_url(&self) -> String {
        let s = &self.settings;
        match s.driver {
            Driver::MySql => format!(
                "mysql://{}@{}:{}/{}?useSSL=false&allowPublicKeyRetrieval=true&characterEncoding=UTF-8",
                s.username, s.host, s.port, s.database
            ),
            Driver::Sqlite => format!("sqlite://{}", s.sqlite_path.display()),
        }
    }

    /// Open a new connection.
    pub fn connection(&self) -> Result<Box<dyn MirrorConnection>, MirrorError> {
        debug!(url = %self.connection_url(), "opening mirror connection");
        match self.settings.driver {
            Driver::Sqlite => Ok(Box::new(SqliteConnection::open(&self.settings)?)),
            #[cfg(feature = "mysql")]
            Driver::MySql => Ok(Box::new(mysql_driver::MySqlConnection::open(&self.settings)?)),
            #[cfg(not(feature = "mysql"))]
            Driver::MySql => Err(MirrorError::DriverUnavailable(Driver::MySql.to_string())),
        }
    }
}

impl Connector for ConnectionProvider {
    fn connect(&self) -> Result<Box<dyn MirrorConnection>, MirrorError> {
        self.connection()
    }

    fn describe(&self) -> String {
        self.connection_url()
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// SQLite-backed mirror connection.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    fn open(settings: &MirrorSettings) -> Result<Self, MirrorError> {
        let conn = rusqlite::Connection::open(&settings.sqlite_path).map_err(|e| {
            MirrorError::Connect {
                target: settings.sqlite_path.display().to_string(),
                detail: e.to_string(),
            }
        })?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        Ok(Self { conn })
    }
}

impl MirrorConnection for SqliteConnection {
    fn apply(&mut self, plan: &ReplacePlan) -> Result<(), MirrorError> {
        let tx = self.conn.transaction()?;
        tx.execute(&plan.delete_sql, [])?;
        if let Some(ref insert_sql) = plan.insert_sql {
            let mut stmt = tx.prepare(insert_sql)?;
            for row in &plan.rows {
                stmt.execute(rusqlite::params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MySQL
// ---------------------------------------------------------------------------

#[cfg(feature = "mysql")]
mod mysql_driver {
    use mysql::prelude::Queryable;
    use mysql::{Conn, OptsBuilder, Params, TxOpts, Value};

    use super::{MirrorConnection, ReplacePlan};
    use crate::config::MirrorSettings;
    use crate::errors::MirrorError;

    /// MySQL-backed mirror connection. TLS is not negotiated.
    pub struct MySqlConnection {
        conn: Conn,
    }

    impl MySqlConnection {
        pub(super) fn open(settings: &MirrorSettings) -> Result<Self, MirrorError> {
            let opts = OptsBuilder::new()
                .ip_or_hostname(Some(settings.host.clone()))
                .tcp_port(settings.port)
                .db_name(Some(settings.database.clone()))
                .user(Some(settings.username.clone()))
                .pass(Some(settings.password.clone()));
            let conn = Conn::new(opts).map_err(|e| MirrorError::Connect {
                target: format!("{}:{}/{}", settings.host, settings.port, settings.database),
                detail: e.to_string(),
            })?;
            Ok(Self { conn })
        }
    }

    impl MirrorConnection for MySqlConnection {
        fn apply(&mut self, plan: &ReplacePlan) -> Result<(), MirrorError> {
            let mut tx = self.conn.start_transaction(TxOpts::default())?;
            tx.query_drop(plan.delete_sql.as_str())?;
            if let Some(ref insert_sql) = plan.insert_sql {
                let batch = plan.rows.iter().map(|row| {
                    let values: Vec<Value> = row
                        .iter()
                        .map(|field| match field {
                            Some(v) => Value::Bytes(v.as_bytes().to_vec()),
                            None => Value::NULL,
                        })
                        .collect();
                    Params::Positional(values)
                });
                tx.exec_batch(insert_sql.as_str(), batch)?;
            }
            tx.commit()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_parse_and_display() {
        assert_eq!("MySQL".parse::<Driver>().unwrap(), Driver::MySql);
        assert_eq!(" sqlite ".parse::<Driver>().unwrap(), Driver::Sqlite);
        assert!("postgres".parse::<Driver>().is_err());
        assert_eq!(Driver::MySql.to_string(), "mysql");
    }

    #[test]
    fn test_sqlite_is_always_available() {
        assert!(Driver::Sqlite.is_available());
        assert_eq!(Driver::MySql.is_available(), cfg!(feature = "mysql"));
    }

    #[test]
    fn test_mysql_connection_url_has_fixed_options_and_no_password() {
        let settings = MirrorSettings {
            password: "hunter2".into(),
            ..MirrorSettings::default()
        };
        let url = ConnectionProvider { settings }.connection_url();
        assert_eq!(
            url,
            "mysql://root@localhost:3306/clinic?useSSL=false&allowPublicKeyRetrieval=true&characterEncoding=UTF-8"
        );
        assert!(!url.contains("hunter2"));
    }

    #[cfg(not(feature = "mysql"))]
    #[test]
    fn test_missing_driver_is_reported() {
        let result = ConnectionProvider::new(MirrorSettings::default());
        assert!(matches!(result, Err(MirrorError::DriverUnavailable(ref d)) if d == "mysql"));
    }

    #[test]
    fn test_sqlite_connection_opens_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = MirrorSettings {
            driver: Driver::Sqlite,
            sqlite_path: dir.path().join("mirror.db"),
            ..MirrorSettings::default()
        };
        let provider = ConnectionProvider::new(settings).unwrap();
        assert!(provider.connection_url().starts_with("sqlite://"));
        assert!(provider.connection().is_ok());
    }
}
