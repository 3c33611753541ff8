//! Store trait and SQLite implementation.

use futures::future::BoxFuture;
use futures::FutureExt;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::schema::{SCHEMA, SCHEMA_VERSION};
use crate::error::{StoreError, StoreResult};

/// Logical section of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
  /// GET response payloads keyed by request identity.
  Cache,
  /// Writes not yet acknowledged by the remote, FIFO.
  PendingMutations,
}

impl Partition {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Cache => "cache",
      Self::PendingMutations => "pending-mutations",
    }
  }
}

impl std::fmt::Display for Partition {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A stored entry as returned by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
  pub key: String,
  pub value: Vec<u8>,
  /// Version stamp set by `put_if_newer`, in milliseconds.
  pub stamp: Option<i64>,
}

/// Trait for durable store backends.
///
/// All operations are asynchronous and may be interleaved by independent
/// callers. Each one is atomic for the key it touches; nothing spans keys.
pub trait Store: Send + Sync + 'static {
  /// Insert or replace a value. An existing key keeps its enumeration position.
  fn put<'a>(
    &'a self,
    partition: Partition,
    key: &'a str,
    value: &'a [u8],
  ) -> BoxFuture<'a, StoreResult<()>>;

  /// Insert or replace a value only if `stamp` is not older than the stored one.
  ///
  /// Returns whether the value was written.
  fn put_if_newer<'a>(
    &'a self,
    partition: Partition,
    key: &'a str,
    value: &'a [u8],
    stamp: i64,
  ) -> BoxFuture<'a, StoreResult<bool>>;

  /// Replace the value of an existing key in place. A missing key stays missing.
  ///
  /// Returns whether an entry was updated.
  fn update<'a>(
    &'a self,
    partition: Partition,
    key: &'a str,
    value: &'a [u8],
  ) -> BoxFuture<'a, StoreResult<bool>>;

  fn get<'a>(&'a self, partition: Partition, key: &'a str)
    -> BoxFuture<'a, StoreResult<Option<Record>>>;

  /// All entries of a partition in insertion order.
  fn get_all(&self, partition: Partition) -> BoxFuture<'_, StoreResult<Vec<Record>>>;

  /// Returns whether an entry was removed.
  fn delete<'a>(&'a self, partition: Partition, key: &'a str) -> BoxFuture<'a, StoreResult<bool>>;

  fn count(&self, partition: Partition) -> BoxFuture<'_, StoreResult<usize>>;

  /// Remove every entry of a partition. Returns how many were removed.
  fn clear(&self, partition: Partition) -> BoxFuture<'_, StoreResult<usize>>;
}

/// SQLite-based store implementation.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open_default() -> StoreResult<Self> {
    Self::open(&Self::default_path()?)
  }

  /// Open or create the store at `path`.
  pub fn open(path: &Path) -> StoreResult<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
        path: parent.display().to_string(),
        source,
      })?;
    }

    let conn = Connection::open(path)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    debug!(path = %path.display(), "opened store");

    Ok(store)
  }

  /// A store that lives only as long as this value.
  pub fn open_in_memory() -> StoreResult<Self> {
    let store = Self {
      conn: Mutex::new(Connection::open_in_memory()?),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> StoreResult<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StoreError::Io {
        path: "<data dir>".to_string(),
        source: std::io::Error::new(
          std::io::ErrorKind::NotFound,
          "could not determine data directory",
        ),
      })?;

    Ok(data_dir.join("wellsync").join("store.db"))
  }

  /// Create missing tables. Never drops or rewrites existing data.
  fn run_migrations(&self) -> StoreResult<()> {
    self.with_conn(|conn| {
      let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
      if version < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
      }
      Ok(())
    })
  }

  fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> StoreResult<T> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
    Ok(f(&conn)?)
  }
}

impl Store for SqliteStore {
  fn put<'a>(
    &'a self,
    partition: Partition,
    key: &'a str,
    value: &'a [u8],
  ) -> BoxFuture<'a, StoreResult<()>> {
    async move {
      self.with_conn(|conn| {
        conn.execute(
          "INSERT INTO entries (partition, key, value) VALUES (?, ?, ?)
           ON CONFLICT (partition, key) DO UPDATE SET value = excluded.value",
          params![partition.as_str(), key, value],
        )
      })?;
      Ok(())
    }
    .boxed()
  }

  fn put_if_newer<'a>(
    &'a self,
    partition: Partition,
    key: &'a str,
    value: &'a [u8],
    stamp: i64,
  ) -> BoxFuture<'a, StoreResult<bool>> {
    async move {
      let changed = self.with_conn(|conn| {
        conn.execute(
          "INSERT INTO entries (partition, key, value, stamp) VALUES (?, ?, ?, ?)
           ON CONFLICT (partition, key) DO UPDATE
             SET value = excluded.value, stamp = excluded.stamp
             WHERE entries.stamp IS NULL OR excluded.stamp >= entries.stamp",
          params![partition.as_str(), key, value, stamp],
        )
      })?;
      Ok(changed > 0)
    }
    .boxed()
  }

  fn update<'a>(
    &'a self,
    partition: Partition,
    key: &'a str,
    value: &'a [u8],
  ) -> BoxFuture<'a, StoreResult<bool>> {
    async move {
      let changed = self.with_conn(|conn| {
        conn.execute(
          "UPDATE entries SET value = ? WHERE partition = ? AND key = ?",
          params![value, partition.as_str(), key],
        )
      })?;
      Ok(changed > 0)
    }
    .boxed()
  }

  fn get<'a>(
    &'a self,
    partition: Partition,
    key: &'a str,
  ) -> BoxFuture<'a, StoreResult<Option<Record>>> {
    async move {
      self.with_conn(|conn| {
        conn
          .query_row(
            "SELECT key, value, stamp FROM entries WHERE partition = ? AND key = ?",
            params![partition.as_str(), key],
            |row| {
              Ok(Record {
                key: row.get(0)?,
                value: row.get(1)?,
                stamp: row.get(2)?,
              })
            },
          )
          .optional()
      })
    }
    .boxed()
  }

  fn get_all(&self, partition: Partition) -> BoxFuture<'_, StoreResult<Vec<Record>>> {
    async move {
      self.with_conn(|conn| {
        let mut stmt = conn.prepare(
          "SELECT key, value, stamp FROM entries WHERE partition = ? ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![partition.as_str()], |row| {
          Ok(Record {
            key: row.get(0)?,
            value: row.get(1)?,
            stamp: row.get(2)?,
          })
        })?;
        let records: rusqlite::Result<Vec<Record>> = rows.collect();
        records
      })
    }
    .boxed()
  }

  fn delete<'a>(&'a self, partition: Partition, key: &'a str) -> BoxFuture<'a, StoreResult<bool>> {
    async move {
      let removed = self.with_conn(|conn| {
        conn.execute(
          "DELETE FROM entries WHERE partition = ? AND key = ?",
          params![partition.as_str(), key],
        )
      })?;
      Ok(removed > 0)
    }
    .boxed()
  }

  fn count(&self, partition: Partition) -> BoxFuture<'_, StoreResult<usize>> {
    async move {
      let count: i64 = self.with_conn(|conn| {
        conn.query_row(
          "SELECT COUNT(*) FROM entries WHERE partition = ?",
          params![partition.as_str()],
          |row| row.get(0),
        )
      })?;
      Ok(count as usize)
    }
    .boxed()
  }

  fn clear(&self, partition: Partition) -> BoxFuture<'_, StoreResult<usize>> {
    async move {
      let removed = self.with_conn(|conn| {
        conn.execute(
          "DELETE FROM entries WHERE partition = ?",
          params![partition.as_str()],
        )
      })?;
      debug!(partition = %partition, removed, "cleared partition");
      Ok(removed)
    }
    .boxed()
  }
}
