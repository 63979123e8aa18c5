//! Delimited text encoding for table files.
//!
//! A table file is UTF-8 text: the first line is the header (column names
//! joined by `|`), every following non-blank line is one record. Fields are
//! joined by `|`; a backslash escapes `|`, `\`, and line breaks inside a
//! field, so any string survives a write/read cycle. In files written before
//! escaping existed, a backslash that does not start a known escape is kept
//! as written and logged.
//!
//! Writes replace the whole file through a temp file in the same directory
//! followed by a rename, so a crash leaves either the old or the new table.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::errors::StoreError;

/// Field separator.
pub const DELIMITER: char = '|';

const ESCAPE: char = '\\';

/// One row: an ordered sequence of string fields.
pub type Record = Vec<String>;

/// Reads and writes one table file.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    path: PathBuf,
    header: String,
}

impl RecordCodec {
    /// A codec for the file at `path` whose header lists `columns`.
    pub fn new<P: Into<PathBuf>>(path: P, columns: &[&str]) -> Self {
        Self {
            path: path.into(),
            header: columns.join("|"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Read every record, creating a header-only file if none exists yet.
    pub fn read(&self) -> Result<Vec<Record>, StoreError> {
        if !self.path.exists() {
            self.bootstrap()?;
        }

        let contents =
            std::fs::read_to_string(&self.path).map_err(|source| StoreError::StorageUnavailable {
                path: self.path.clone(),
                source,
            })?;

        let mut lines = contents.lines();
        if let Some(header) = lines.next() {
            let header = header.trim_end_matches('\r');
            if header != self.header {
                warn!(
                    path = %self.path.display(),
                    found = header,
                    expected = %self.header,
                    "table header differs from schema"
                );
            }
        }

        let records: Vec<Record> = lines
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .map(decode_line)
            .collect();

        debug!(path = %self.path.display(), rows = records.len(), "read table");
        Ok(records)
    }

    /// Replace the file's contents with the header followed by `records`.
    pub fn write(&self, records: &[Record]) -> Result<(), StoreError> {
        let mut body = String::with_capacity(self.header.len() + 1 + records.len() * 64);
        body.push_str(&self.header);
        body.push('\n');
        for record in records {
            body.push_str(&encode_line(record));
            body.push('\n');
        }

        self.replace_contents(body.as_bytes())?;
        debug!(path = %self.path.display(), rows = records.len(), "wrote table");
        Ok(())
    }

    /// Create the header-only file unless another caller got there first.
    /// An existing file is never replaced here.
    fn bootstrap(&self) -> Result<(), StoreError> {
        let dir = self.ensure_dir()?;
        let unavailable = |source: std::io::Error| StoreError::StorageUnavailable {
            path: self.path.clone(),
            source,
        };

        let body = format!("{}\n", self.header);
        let tmp = stage(dir, body.as_bytes()).map_err(unavailable)?;
        match tmp.persist_noclobber(&self.path) {
            Ok(_) => {
                info!(path = %self.path.display(), "created empty table");
                Ok(())
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %self.path.display(), "table created concurrently");
                Ok(())
            }
            Err(e) => Err(unavailable(e.error)),
        }
    }

    fn ensure_dir(&self) -> Result<&Path, StoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|source| StoreError::StorageUnavailable {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(dir)
    }

    fn replace_contents(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let dir = self.ensure_dir()?;
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let tmp = stage(dir, bytes).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// Write `bytes` to a synced temp file in `dir`, ready to be renamed.
fn stage(dir: &Path, bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Join fields with the delimiter, escaping each one.
pub fn encode_line(record: &[String]) -> String {
    let mut line = String::new();
    for (i, field) in record.iter().enumerate() {
        if i > 0 {
            line.push(DELIMITER);
        }
        for c in field.chars() {
            match c {
                ESCAPE => line.push_str("\\\\"),
                DELIMITER => line.push_str("\\|"),
                '\n' => line.push_str("\\n"),
                '\r' => line.push_str("\\r"),
                other => line.push(other),
            }
        }
    }
    line
}

/// Split a line on unescaped delimiters and undo the escaping. Trailing empty
/// fields are kept. A backslash that does not start a known escape is kept
/// verbatim along with the character after it.
pub fn decode_line(line: &str) -> Record {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some('n') => current.push('\n'),
                Some('r') => current.push('\r'),
                Some(c @ (ESCAPE | DELIMITER)) => current.push(c),
                Some(other) => {
                    warn!(escaped = %other, "unknown escape in table field, kept as written");
                    current.push(ESCAPE);
                    current.push(other);
                }
                None => current.push(ESCAPE),
            },
            DELIMITER => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

/// A fresh opaque identity for a new record.
pub fn new_identity() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The current local time as stored in table files.
pub fn timestamp() -> String {
    format_date_time(&Local::now().naive_local())
}

/// ISO-8601 local date-time, omitting seconds and fractions when zero.
pub fn format_date_time(value: &NaiveDateTime) -> String {
    if value.second() == 0 && value.nanosecond() == 0 {
        value.format("%Y-%m-%dT%H:%M").to_string()
    } else {
        value.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(fields: &[&str]) -> Record {
        fields.iter().map(|f| f.to_string()).collect()
    }

    fn codec(dir: &Path) -> RecordCodec {
        RecordCodec::new(dir.join("appointments.csv"), &["id", "patientId", "notes"])
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec(dir.path());
        let rows = vec![
            rec(&["a2", "p1", "second"]),
            rec(&["a1", "p2", ""]),
            rec(&["a3", "p1", "third"]),
        ];
        codec.write(&rows).unwrap();
        assert_eq!(codec.read().unwrap(), rows);
    }

    #[test]
    fn test_round_trip_with_special_characters() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec(dir.path());
        let rows = vec![rec(&["a|1", "C:\\clinic\\", "line one\nline two\r\n"])];
        codec.write(&rows).unwrap();
        assert_eq!(codec.read().unwrap(), rows);
    }

    #[test]
    fn test_missing_file_is_bootstrapped_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let codec = RecordCodec::new(dir.path().join("nested/dir/users.csv"), &["id", "username"]);

        assert!(codec.read().unwrap().is_empty());
        let contents = std::fs::read_to_string(codec.path()).unwrap();
        assert_eq!(contents, "id|username\n");

        // Idempotent second read.
        assert!(codec.read().unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(codec.path()).unwrap(), contents);
    }

    #[test]
    fn test_blank_lines_and_crlf_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec(dir.path());
        std::fs::write(
            codec.path(),
            "id|patientId|notes\r\na1|p1|x\r\n\r\n   \na2|p2|\r\n\n",
        )
        .unwrap();
        assert_eq!(
            codec.read().unwrap(),
            vec![rec(&["a1", "p1", "x"]), rec(&["a2", "p2", ""])]
        );
    }

    #[test]
    fn test_first_line_is_always_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec(dir.path());
        std::fs::write(codec.path(), "a0|p0|looks like data\na1|p1|x\n").unwrap();
        assert_eq!(codec.read().unwrap(), vec![rec(&["a1", "p1", "x"])]);
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec(dir.path());
        codec.write(&[rec(&["a1", "p1", "x"])]).unwrap();
        codec.write(&[]).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["appointments.csv".to_string()]);
        assert_eq!(
            std::fs::read_to_string(codec.path()).unwrap(),
            "id|patientId|notes\n"
        );
    }

    #[test]
    fn test_unwritable_directory_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let codec = RecordCodec::new(blocker.join("patients.csv"), &["id"]);
        assert!(matches!(
            codec.read(),
            Err(StoreError::StorageUnavailable { .. })
        ));
    }

    #[test]
    fn test_bootstrap_never_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec(dir.path());
        codec.write(&[rec(&["a1", "p1", "x"])]).unwrap();

        // A reader that saw no file must not wipe rows written since.
        codec.bootstrap().unwrap();
        assert_eq!(codec.read().unwrap(), vec![rec(&["a1", "p1", "x"])]);
    }

    #[test]
    fn test_bootstrap_failure_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let codec = RecordCodec::new(dir.path().join(format!("{}.csv", "x".repeat(300))), &["id"]);
        assert!(matches!(
            codec.read(),
            Err(StoreError::StorageUnavailable { .. })
        ));
    }

    #[test]
    fn test_legacy_backslashes_are_kept() {
        assert_eq!(decode_line("C:\\temp|x"), rec(&["C:\\temp", "x"]));

        let dir = tempfile::tempdir().unwrap();
        let codec = codec(dir.path());
        std::fs::write(codec.path(), "id|patientId|notes\na1|p1|C:\\temp\\new\n").unwrap();
        let rows = codec.read().unwrap();
        // `\t` is not an escape and survives; `\n` still decodes as a line break.
        assert_eq!(rows, vec![rec(&["a1", "p1", "C:\\temp\new"])]);

        // Writing back and re-reading is stable.
        codec.write(&rows).unwrap();
        assert_eq!(codec.read().unwrap(), rows);
    }

    #[test]
    fn test_decode_legacy_line() {
        assert_eq!(decode_line("a|b||"), rec(&["a", "b", "", ""]));
        assert_eq!(decode_line(""), rec(&[""]));
        assert_eq!(decode_line("trailing\\"), rec(&["trailing\\"]));
    }

    #[test]
    fn test_encode_escapes() {
        assert_eq!(encode_line(&rec(&["a|b", "c\\d"])), "a\\|b|c\\\\d");
    }

    #[test]
    fn test_format_date_time_matches_stored_form() {
        let minute = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(format_date_time(&minute), "2024-05-01T09:30");

        let precise = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_milli_opt(9, 30, 15, 250)
            .unwrap();
        assert_eq!(format_date_time(&precise), "2024-05-01T09:30:15.250");
    }

    #[test]
    fn test_timestamp_parses_back() {
        assert!(crate::store::fields::parse_date_time(&timestamp()).is_some());
    }

    #[test]
    fn test_new_identity_is_unique() {
        let a = new_identity();
        let b = new_identity();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
