//! Write-through relational mirror of the table files.
//!
//! After every store write, [`MirrorSync::mirror`] replaces the matching
//! relational table with the rows just written: one `DELETE` of the whole
//! table, then one batched parameterized `INSERT`, inside a single
//! transaction. The mirror never sees deltas, so it always equals the last
//! successfully mirrored write.

pub mod connection;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::codec::{Record, DELIMITER};
use crate::config::MirrorSettings;
use crate::errors::MirrorError;

pub use connection::{ConnectionProvider, Connector, Driver, MirrorConnection};

/// The statements and bound rows that replace one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacePlan {
    pub table: String,
    pub columns: Vec<String>,
    pub delete_sql: String,
    /// `None` when there are no rows to insert.
    pub insert_sql: Option<String>,
    /// One entry per column; empty fields are `None` and bind as NULL.
    pub rows: Vec<Vec<Option<String>>>,
}

impl ReplacePlan {
    /// Build the plan for `table` from a header line and the written rows.
    /// Rows are padded with empty fields (or cut) to the header's width.
    pub fn build(table: &str, header: &str, records: &[Record]) -> Self {
        let columns: Vec<String> = header.split(DELIMITER).map(str::to_string).collect();
        let rows: Vec<Vec<Option<String>>> = records
            .iter()
            .map(|record| normalize(record, columns.len()))
            .collect();

        let delete_sql = format!("DELETE FROM {}", quote_ident(table));
        let insert_sql = (!rows.is_empty()).then(|| {
            let column_list = columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(",");
            let placeholders = vec!["?"; columns.len()].join(",");
            format!(
                "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
                quote_ident(table)
            )
        });

        Self {
            table: table.to_string(),
            columns,
            delete_sql,
            insert_sql,
            rows,
        }
    }
}

fn normalize(record: &[String], width: usize) -> Vec<Option<String>> {
    (0..width)
        .map(|i| match record.get(i) {
            Some(value) if !value.is_empty() => Some(value.clone()),
            _ => None,
        })
        .collect()
}

/// Backtick-quote an identifier. Both MySQL and SQLite accept this form.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Relational table name for a table file: its base name without extension.
pub fn table_name(file: &Path) -> String {
    file.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Keeps relational copies of the table files in step with every write.
///
/// Cloning is cheap; clones share the same connector.
#[derive(Clone, Default)]
pub struct MirrorSync {
    connector: Option<Arc<dyn Connector>>,
}

impl MirrorSync {
    /// A mirror that never does anything.
    pub fn disabled() -> Self {
        Self { connector: None }
    }

    /// Mirror through an explicit connector.
    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector: Some(connector),
        }
    }

    /// Decide enablement from resolved settings: the flag must be on and the
    /// configured driver must be compiled in. A missing driver disables the
    /// mirror regardless of the flag.
    pub fn from_settings(settings: &MirrorSettings) -> Self {
        if !settings.enabled {
            info!("relational mirror disabled by configuration");
            return Self::disabled();
        }
        match ConnectionProvider::new(settings.clone()) {
            Ok(provider) => {
                info!(url = %provider.connection_url(), "relational mirror enabled");
                Self::with_connector(Arc::new(provider))
            }
            Err(e) => {
                warn!(driver = %settings.driver, error = %e, "mirror driver not found; relational mirror disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.connector.is_some()
    }

    /// Describe the mirror target, if any.
    pub fn target(&self) -> Option<String> {
        self.connector.as_ref().map(|c| c.describe())
    }

    /// Replace the relational table for `file` with `records`. Does nothing
    /// when the mirror is disabled.
    pub fn mirror(&self, file: &Path, header: &str, records: &[Record]) -> Result<(), MirrorError> {
        let Some(ref connector) = self.connector else {
            return Ok(());
        };

        let plan = ReplacePlan::build(&table_name(file), header, records);
        let result = connector
            .connect()
            .and_then(|mut conn| conn.apply(&plan));

        match result {
            Ok(()) => {
                debug!(table = %plan.table, rows = plan.rows.len(), "mirrored table");
                Ok(())
            }
            Err(e) => {
                error!(table = %plan.table, error = %e, "failed to mirror table");
                Err(e)
            }
        }
    }
}

impl fmt::Debug for MirrorSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorSync")
            .field("target", &self.target())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn rec(fields: &[&str]) -> Record {
        fields.iter().map(|f| f.to_string()).collect()
    }

    fn sqlite_settings(path: PathBuf) -> MirrorSettings {
        MirrorSettings {
            driver: Driver::Sqlite,
            sqlite_path: path,
            ..MirrorSettings::default()
        }
    }

    #[test]
    fn test_table_name_strips_directory_and_extension() {
        assert_eq!(table_name(Path::new("/data/clinic/patients.csv")), "patients");
        assert_eq!(table_name(Path::new("audit.v2.csv")), "audit.v2");
        assert_eq!(table_name(Path::new("doctors")), "doctors");
    }

    #[test]
    fn test_plan_pads_short_rows_and_nulls_empty_fields() {
        let plan = ReplacePlan::build(
            "users",
            "id|username|role",
            &[rec(&["u1", "", "ADMIN"]), rec(&["u2"]), rec(&["u3", "c", "d", "extra"])],
        );
        assert_eq!(plan.delete_sql, "DELETE FROM `users`");
        assert_eq!(
            plan.insert_sql.as_deref(),
            Some("INSERT INTO `users` (`id`,`username`,`role`) VALUES (?,?,?)")
        );
        assert_eq!(
            plan.rows,
            vec![
                vec![Some("u1".into()), None, Some("ADMIN".into())],
                vec![Some("u2".into()), None, None],
                vec![Some("u3".into()), Some("c".into()), Some("d".into())],
            ]
        );
    }

    #[test]
    fn test_plan_without_rows_only_deletes() {
        let plan = ReplacePlan::build("users", "id|username", &[]);
        assert!(plan.insert_sql.is_none());
        assert!(plan.rows.is_empty());
    }

    #[test]
    fn test_quote_ident_escapes_backticks() {
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_disabled_by_flag() {
        let settings = MirrorSettings {
            enabled: false,
            ..sqlite_settings(PathBuf::from("unused.db"))
        };
        assert!(!MirrorSync::from_settings(&settings).is_enabled());
    }

    #[cfg(not(feature = "mysql"))]
    #[test]
    fn test_missing_driver_forces_disabled() {
        let mirror = MirrorSync::from_settings(&MirrorSettings::default());
        assert!(!mirror.is_enabled());
        // Disabled mirror is a no-op even for a path that could never work.
        mirror
            .mirror(Path::new("/nowhere/patients.csv"), "id", &[rec(&["p1"])])
            .unwrap();
    }

    #[test]
    fn test_mirror_replaces_rows_in_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("mirror.db");
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE doctors (id TEXT PRIMARY KEY, name TEXT, rating TEXT);
             INSERT INTO doctors VALUES ('old', 'Stale', '1.0');",
        )
        .unwrap();

        let mirror = MirrorSync::from_settings(&sqlite_settings(db_path));
        assert!(mirror.is_enabled());
        mirror
            .mirror(
                Path::new("data/doctors.csv"),
                "id|name|rating",
                &[rec(&["d1", "Ada", ""]), rec(&["d2", "Grace", "4.5"])],
            )
            .unwrap();

        let mut stmt = conn
            .prepare("SELECT id, name, rating FROM doctors ORDER BY id")
            .unwrap();
        let rows: Vec<(String, String, Option<String>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            rows,
            vec![
                ("d1".to_string(), "Ada".to_string(), None),
                ("d2".to_string(), "Grace".to_string(), Some("4.5".to_string())),
            ]
        );
    }

    #[test]
    fn test_failed_insert_rolls_back_delete() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("mirror.db");
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id TEXT PRIMARY KEY, username TEXT NOT NULL);
             INSERT INTO users VALUES ('u0', 'kept');",
        )
        .unwrap();

        let mirror = MirrorSync::from_settings(&sqlite_settings(db_path));
        // Empty username binds as NULL and violates NOT NULL.
        let result = mirror.mirror(
            Path::new("users.csv"),
            "id|username",
            &[rec(&["u1", "alice"]), rec(&["u2", ""])],
        );
        assert!(matches!(result, Err(MirrorError::Sqlite(_))));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users WHERE id = 'u0'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
