use crate::command;
use crate::error::{DocbaseError, Result};
use crate::migration;
use crate::queue::OperationQueue;
use crate::schema::{self, DocumentSchema, TypeDescriptor, ID_COLUMN};
use rusqlite::{named_params, Connection, ToSql};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

/// A record type storable as JSON documents.
///
/// The descriptor declares the identifier property and the properties
/// promoted to index columns; everything else lives only in the document
/// text and cannot be filtered in SQL.
pub trait Document: Serialize + DeserializeOwned + Send + 'static {
    fn descriptor() -> TypeDescriptor;
}

/// Classification attached to one `save` call. Not a document state: a
/// document has no notion of "being new" outside the instant of its first
/// successful save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveResult<T> {
    New(T),
    Changed { old: T, new: T },
    Unchanged(T),
}

impl<T> SaveResult<T> {
    /// The document as stored by this save.
    pub fn document(&self) -> &T {
        match self {
            SaveResult::New(doc) | SaveResult::Unchanged(doc) => doc,
            SaveResult::Changed { new, .. } => new,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, SaveResult::New(_))
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, SaveResult::Changed { .. })
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, SaveResult::Unchanged(_))
    }
}

/// The main entry point. Opens a database file, owns its operation queue,
/// and registers document types.
///
/// One `Store` per physical file: the queue exclusively owns the open
/// connection, and a second writer to the same file would reintroduce the
/// lock contention the queue exists to prevent. Types registered on the
/// same store share the queue and are globally serialized against each
/// other as well as against themselves.
pub struct Store {
    queue: Arc<OperationQueue>,
}

impl Store {
    /// Open or create a document file at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        log::debug!("opened document store at {}", path.display());
        Ok(Store {
            queue: Arc::new(OperationQueue::start(conn)?),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Store {
            queue: Arc::new(OperationQueue::start(conn)?),
        })
    }

    /// Register a document type: resolve its schema and migrate the
    /// physical table, then hand back the typed facade. No facade
    /// operation runs before the migration has committed. Safe to call
    /// repeatedly for the same type.
    pub fn documents<T: Document>(&self) -> Result<Documents<T>> {
        let schema = Arc::new(schema::resolve(&T::descriptor())?);

        let to_migrate = Arc::clone(&schema);
        self.queue
            .submit(move |conn| migration::migrate(conn, &to_migrate))?;

        Ok(Documents {
            schema,
            queue: Arc::clone(&self.queue),
            _marker: PhantomData,
        })
    }
}

/// Per-type Save/Get/List/Delete/Count operations, each funneled through
/// the store's operation queue.
pub struct Documents<T: Document> {
    schema: Arc<DocumentSchema>,
    queue: Arc<OperationQueue>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> Clone for Documents<T> {
    fn clone(&self) -> Self {
        Documents {
            schema: Arc::clone(&self.schema),
            queue: Arc::clone(&self.queue),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Documents<T> {
    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    /// Upsert the document and classify the call: `New` if no row carried
    /// its id, `Changed { old, new }` if one did with different content,
    /// `Unchanged` if the content was identical. Identical content is
    /// still written (normalizing the stored formatting), only the
    /// classification differs. Read and write happen in one transaction
    /// so the diff is consistent with the mutation.
    pub fn save(&self, doc: &T) -> Result<SaveResult<T>> {
        let payload = serde_json::to_value(doc)?;
        let json = serde_json::to_string(&payload)?;
        let id = self.schema.id_value(&payload)?;

        let schema = Arc::clone(&self.schema);
        let select = command::select_by_id(&schema);
        let upsert = command::save_returning(&schema.table_name);

        let (previous, stored) = self.queue.submit_txn(move |txn| {
            let previous = unique_row(txn, &select, &id, &schema.table_name)?;
            let stored: String =
                txn.query_row(&upsert, named_params! { "@json": json }, |row| row.get(0))?;
            Ok((previous, stored))
        })?;

        match previous {
            None => Ok(SaveResult::New(serde_json::from_str(&stored)?)),
            Some(previous) => {
                let old_value: serde_json::Value = serde_json::from_str(&previous)?;
                if old_value == payload {
                    Ok(SaveResult::Unchanged(serde_json::from_str(&stored)?))
                } else {
                    Ok(SaveResult::Changed {
                        old: serde_json::from_str(&previous)?,
                        new: serde_json::from_str(&stored)?,
                    })
                }
            }
        }
    }

    /// Plain insert. An existing id surfaces the uniqueness-constraint
    /// violation unmodified; callers wanting idempotent upsert use `save`.
    pub fn insert(&self, doc: &T) -> Result<()> {
        let json = serde_json::to_string(doc)?;
        let sql = command::insert(&self.schema.table_name);
        self.queue.submit(move |conn| {
            conn.execute(&sql, named_params! { "@json": json })?;
            Ok(())
        })
    }

    /// Insert, returning the row as stored.
    pub fn insert_returning(&self, doc: &T) -> Result<T> {
        let json = serde_json::to_string(doc)?;
        let sql = command::insert_returning(&self.schema.table_name);
        let stored = self.queue.submit(move |conn| {
            Ok(conn.query_row(&sql, named_params! { "@json": json }, |row| {
                row.get::<_, String>(0)
            })?)
        })?;
        Ok(serde_json::from_str(&stored)?)
    }

    /// Fetch by id. Absence is normal control flow, not an error. More
    /// than one row carrying the id is a structural-invariant violation
    /// and raises `DuplicateId`.
    pub fn get<V>(&self, id: V) -> Result<Option<T>>
    where
        V: ToSql + Send + 'static,
    {
        let schema = Arc::clone(&self.schema);
        let sql = command::select_by_id(&schema);
        let row = self
            .queue
            .submit(move |conn| unique_row(conn, &sql, &id, &schema.table_name))?;
        Ok(row.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    /// Equality filter on a declared index property (the id property
    /// included). Non-indexed properties cannot be filtered in SQL.
    pub fn find_by<V>(&self, property: &str, value: V) -> Result<Vec<T>>
    where
        V: ToSql + Send + 'static,
    {
        let sql = command::select_by(&self.schema.table_name, self.filter_column(property)?);
        let rows = self.queue.submit(move |conn| rows_by(conn, &sql, &value))?;
        deserialize_all(rows)
    }

    /// All documents for the type, order unspecified.
    pub fn list(&self) -> Result<Vec<T>> {
        let sql = command::select_all(&self.schema.table_name);
        let rows = self.queue.submit(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        deserialize_all(rows)
    }

    /// Delete by id, returning the row that existed at the moment of
    /// deletion, if any. Read and delete share one transaction; more than
    /// one row matching the id raises `DuplicateId` rather than picking
    /// one arbitrarily.
    pub fn delete<V>(&self, id: V) -> Result<Option<T>>
    where
        V: ToSql + Send + 'static,
    {
        let schema = Arc::clone(&self.schema);
        let select = command::select_by_id(&schema);
        let delete = command::delete_by(&schema.table_name, ID_COLUMN);

        let deleted = self.queue.submit_txn(move |txn| {
            let existing = unique_row(txn, &select, &id, &schema.table_name)?;
            if existing.is_none() {
                return Ok(None);
            }
            let affected = txn.execute(&delete, named_params! { "@value": id })?;
            if affected > 1 {
                return Err(DocbaseError::DuplicateId {
                    table: schema.table_name.clone(),
                    count: affected,
                });
            }
            Ok(existing)
        })?;

        Ok(deleted.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    /// Bulk delete by equality on a declared index property; returns the
    /// number of rows removed.
    pub fn delete_by<V>(&self, property: &str, value: V) -> Result<usize>
    where
        V: ToSql + Send + 'static,
    {
        let sql = command::delete_by(&self.schema.table_name, self.filter_column(property)?);
        self.queue
            .submit(move |conn| Ok(conn.execute(&sql, named_params! { "@value": value })?))
    }

    /// Bulk delete by equality, returning the deleted documents.
    pub fn delete_by_returning<V>(&self, property: &str, value: V) -> Result<Vec<T>>
    where
        V: ToSql + Send + 'static,
    {
        let sql =
            command::delete_by_returning(&self.schema.table_name, self.filter_column(property)?);
        let rows = self.queue.submit(move |conn| rows_by(conn, &sql, &value))?;
        deserialize_all(rows)
    }

    pub fn count(&self) -> Result<u64> {
        let sql = command::count(&self.schema.table_name);
        let n = self.queue.submit(move |conn| {
            Ok(conn.query_row(&sql, [], |row| row.get::<_, i64>(0))?)
        })?;
        Ok(n as u64)
    }

    fn filter_column(&self, property: &str) -> Result<&str> {
        self.schema
            .column_for(property)
            .map(|(column, _)| column)
            .ok_or_else(|| DocbaseError::NotIndexed {
                table: self.schema.table_name.clone(),
                property: property.to_string(),
            })
    }
}

/// Fetch the rows matching an `@value` filter, insisting on at most one.
/// Several rows sharing an id means the uniqueness invariant was bypassed;
/// that is surfaced, never resolved by picking a row.
fn unique_row<V: ToSql>(
    conn: &Connection,
    sql: &str,
    value: &V,
    table: &str,
) -> Result<Option<String>> {
    let mut found = rows_by(conn, sql, value)?;
    match found.len() {
        0 | 1 => Ok(found.pop()),
        count => Err(DocbaseError::DuplicateId {
            table: table.to_string(),
            count,
        }),
    }
}

fn rows_by<V: ToSql>(conn: &Connection, sql: &str, value: &V) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(named_params! { "@value": value }, |row| {
            row.get::<_, String>(0)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn deserialize_all<T: DeserializeOwned>(rows: Vec<String>) -> Result<Vec<T>> {
    rows.iter()
        .map(|json| Ok(serde_json::from_str(json)?))
        .collect()
}
