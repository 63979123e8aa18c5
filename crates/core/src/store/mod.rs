//! Generic entity store over the table files.
//!
//! Every table is loaded fully into memory, changed, and written back whole.
//! A [`Store`] carries the data directory, the short-row policy, the mirror,
//! and one lock per table file. Every mutation holds its table's lock from
//! the read through the mirror call, so writers sharing a `Store` never lose
//! each other's updates.

pub mod fields;
pub mod queries;

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::codec::{Record, RecordCodec};
use crate::config::{ShortRowPolicy, StoreConfig};
use crate::errors::{CoreError, FieldError, StoreError};
use crate::mirror::MirrorSync;
use crate::models;

pub use fields::Fields;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A typed row of one table.
pub trait Entity: Sized {
    /// Table file stem, also the mirrored table name.
    const TABLE: &'static str;

    /// Column names, in file order. Index 0 is the identity.
    const COLUMNS: &'static [&'static str];

    /// Rows with fewer fields than this are structurally short.
    const MIN_FIELDS: usize;

    fn id(&self) -> &str;

    fn from_record(fields: &Fields<'_>) -> Result<Self, FieldError>;

    fn to_record(&self) -> Record;
}

// ---------------------------------------------------------------------------
// Table locks
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TableLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl TableLocks {
    fn for_path(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(path.to_path_buf()).or_default().clone()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Entry point: opens typed tables under one data directory.
///
/// Clones share the mirror and the table locks.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
    extension: String,
    short_rows: ShortRowPolicy,
    mirror: MirrorSync,
    locks: Arc<TableLocks>,
}

impl Store {
    /// A store with default options and the mirror disabled.
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            extension: "csv".into(),
            short_rows: ShortRowPolicy::default(),
            mirror: MirrorSync::disabled(),
            locks: Arc::default(),
        }
    }

    /// Build a store from configuration, resolving mirror settings against
    /// the process environment once.
    pub fn open(config: &StoreConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let settings = config.mirror_settings()?;
        let store = Self::new(&config.store.data_dir)
            .with_extension(&config.store.extension)
            .with_short_rows(config.store.short_rows)
            .with_mirror(MirrorSync::from_settings(&settings));
        info!(
            data_dir = %store.data_dir.display(),
            mirror = store.mirror.is_enabled(),
            "opened store"
        );
        Ok(store)
    }

    #[must_use]
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_string();
        self
    }

    #[must_use]
    pub fn with_short_rows(mut self, policy: ShortRowPolicy) -> Self {
        self.short_rows = policy;
        self
    }

    #[must_use]
    pub fn with_mirror(mut self, mirror: MirrorSync) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn mirror(&self) -> &MirrorSync {
        &self.mirror
    }

    pub fn short_rows(&self) -> ShortRowPolicy {
        self.short_rows
    }

    /// Path of the file backing `table`.
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{table}.{}", self.extension))
    }

    /// Open the typed table for `E`.
    pub fn table<E: Entity>(&self) -> EntityStore<E> {
        let path = self.table_path(E::TABLE);
        EntityStore {
            lock: self.locks.for_path(&path),
            codec: RecordCodec::new(path, E::COLUMNS),
            short_rows: self.short_rows,
            mirror: self.mirror.clone(),
            _entity: PhantomData,
        }
    }

    /// Look up a known table by name.
    pub fn schema(&self, table: &str) -> Result<&'static models::TableSchema, StoreError> {
        models::schema(table).ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    /// Raw rows of a known table, without typed decoding.
    pub fn raw_rows(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        let schema = self.schema(table)?;
        RecordCodec::new(self.table_path(schema.name), schema.columns).read()
    }

    /// Decode every row of a known table, collecting problems instead of
    /// stopping at the first one.
    pub fn inspect(&self, table: &str) -> Result<TableReport, StoreError> {
        (self.schema(table)?.inspect)(self)
    }

    /// Re-mirror a known table from its file. Returns the mirrored row count.
    pub fn resync(&self, table: &str) -> Result<usize, StoreError> {
        (self.schema(table)?.resync)(self)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of decoding a whole table without failing fast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableReport {
    pub table: String,
    pub rows: usize,
    pub decoded: usize,
    /// `(row, field count)` of structurally short rows.
    pub short_rows: Vec<(usize, usize)>,
    /// `(row, error)` of rows with malformed values.
    pub malformed: Vec<(usize, FieldError)>,
}

impl TableReport {
    pub fn is_clean(&self) -> bool {
        self.short_rows.is_empty() && self.malformed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EntityStore
// ---------------------------------------------------------------------------

/// CRUD over one table of `E`.
pub struct EntityStore<E> {
    codec: RecordCodec,
    short_rows: ShortRowPolicy,
    mirror: MirrorSync,
    lock: Arc<Mutex<()>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityStore<E> {
    pub fn path(&self) -> &Path {
        self.codec.path()
    }

    /// Every well-formed row, decoded. Short rows follow the store's
    /// [`ShortRowPolicy`]; a malformed value fails the whole read.
    pub fn find_all(&self) -> Result<Vec<E>, StoreError> {
        let records = self.codec.read()?;
        let mut entities = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let row = i + 1;
            if record.len() < E::MIN_FIELDS {
                match self.short_rows {
                    ShortRowPolicy::Skip => {
                        warn!(
                            table = E::TABLE,
                            row,
                            found = record.len(),
                            expected = E::MIN_FIELDS,
                            "skipping short row"
                        );
                        continue;
                    }
                    ShortRowPolicy::Reject => {
                        return Err(StoreError::ShortRow {
                            table: E::TABLE.to_string(),
                            row,
                            found: record.len(),
                            expected: E::MIN_FIELDS,
                        });
                    }
                }
            }
            let entity = E::from_record(&Fields::new(record, E::COLUMNS))
                .map_err(|e| e.into_store_error(E::TABLE, row))?;
            entities.push(entity);
        }
        Ok(entities)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<E>, StoreError> {
        Ok(self.find_all()?.into_iter().find(|e| e.id() == id))
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.find_all()?.len())
    }

    /// Replace the row with the same identity, or append if there is none.
    pub fn save(&self, entity: E) -> Result<(), StoreError> {
        let _guard = self.lock();
        let mut entities = self.find_all()?;
        match entities.iter().position(|e| e.id() == entity.id()) {
            Some(i) => {
                debug!(table = E::TABLE, id = entity.id(), "replacing row");
                entities[i] = entity;
            }
            None => {
                debug!(table = E::TABLE, id = entity.id(), "appending row");
                entities.push(entity);
            }
        }
        self.write_all(&entities)
    }

    /// Append without an identity scan, for append-only tables.
    pub fn append(&self, entity: E) -> Result<(), StoreError> {
        let _guard = self.lock();
        let mut entities = self.find_all()?;
        entities.push(entity);
        self.write_all(&entities)
    }

    /// Remove every row with identity `id`. Absent ids are not an error.
    pub fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.lock();
        let mut entities = self.find_all()?;
        let before = entities.len();
        entities.retain(|e| e.id() != id);
        debug!(table = E::TABLE, id, removed = before - entities.len(), "deleting row");
        self.write_all(&entities)
    }

    /// Push the file's rows to the mirror again, as stored and without
    /// decoding them. Under [`ShortRowPolicy::Skip`] short rows are left out,
    /// as the next write drops them from the file too.
    pub fn resync(&self) -> Result<usize, StoreError> {
        let _guard = self.lock();
        let mut records = self.codec.read()?;
        if self.short_rows == ShortRowPolicy::Skip {
            let before = records.len();
            records.retain(|r| r.len() >= E::MIN_FIELDS);
            if records.len() < before {
                warn!(
                    table = E::TABLE,
                    skipped = before - records.len(),
                    "short rows left out of resync"
                );
            }
        }
        self.mirror_records(&records)?;
        info!(table = E::TABLE, rows = records.len(), "resynced mirror");
        Ok(records.len())
    }

    /// Decode every row, collecting short and malformed rows.
    pub fn inspect(&self) -> Result<TableReport, StoreError> {
        let records = self.codec.read()?;
        let mut report = TableReport {
            table: E::TABLE.to_string(),
            rows: records.len(),
            ..TableReport::default()
        };
        for (i, record) in records.iter().enumerate() {
            let row = i + 1;
            if record.len() < E::MIN_FIELDS {
                report.short_rows.push((row, record.len()));
                continue;
            }
            match E::from_record(&Fields::new(record, E::COLUMNS)) {
                Ok(_) => report.decoded += 1,
                Err(e) => report.malformed.push((row, e)),
            }
        }
        Ok(report)
    }

    fn write_all(&self, entities: &[E]) -> Result<(), StoreError> {
        let records: Vec<Record> = entities.iter().map(Entity::to_record).collect();
        self.codec.write(&records)?;
        self.mirror_records(&records)
    }

    fn mirror_records(&self, records: &[Record]) -> Result<(), StoreError> {
        self.mirror
            .mirror(self.codec.path(), self.codec.header(), records)
            .map_err(|source| StoreError::Mirror {
                table: E::TABLE.to_string(),
                source,
            })
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| {
            warn!(table = E::TABLE, "table lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
