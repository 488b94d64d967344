use std::path::{Path, PathBuf};

use redb::Database;
use redb::backends::InMemoryBackend;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{BoltError, BoltResult, storage};
use crate::redb::{ENTRIES, META, ReadEngine, WriteEngine};
use crate::tx::Tx;

/// Options for opening a [`Db`].
///
/// Zero and `false` fields keep the engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Page cache size in bytes.
    #[serde(default)]
    pub cache_size: usize,

    /// Fail instead of creating the file when it does not exist.
    #[serde(default)]
    pub must_exist: bool,
}

/// A bucket database.
///
/// Safe to share between threads; each thread runs its own transactions.
/// Redb allows one write transaction at a time and any number of readers.
pub struct Db {
    db: Database,
    path: Option<PathBuf>,
}

impl Db {
    /// Open or create a database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> BoltResult<Self> {
        Self::open_with(path, &Options::default())
    }

    /// Open a database file with explicit options.
    pub fn open_with<P: AsRef<Path>>(path: P, opts: &Options) -> BoltResult<Self> {
        let path = path.as_ref();
        let mut builder = Database::builder();
        if opts.cache_size > 0 {
            builder.set_cache_size(opts.cache_size);
        }
        let db = if opts.must_exist {
            builder.open(path)
        } else {
            builder.create(path)
        }
        .map_err(storage)?;

        debug!(path = %path.display(), "bolt: opened database");
        Self::init(db, Some(path.to_path_buf()))
    }

    /// Create a database that lives in memory only.
    pub fn memory() -> BoltResult<Self> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(storage)?;
        Self::init(db, None)
    }

    /// Wrap a redb database the caller already opened.
    ///
    /// The bucket tables are created if missing. [`Db::path`] is `None`
    /// because redb does not report where it was opened from.
    pub fn from_database(db: Database) -> BoltResult<Self> {
        Self::init(db, None)
    }

    // Make sure both tables exist so read transactions can open them.
    fn init(db: Database, path: Option<PathBuf>) -> BoltResult<Self> {
        let txn = db.begin_write().map_err(storage)?;
        {
            txn.open_table(ENTRIES).map_err(storage)?;
            txn.open_table(META).map_err(storage)?;
        }
        txn.commit().map_err(storage)?;
        Ok(Self { db, path })
    }

    /// The database file path, or `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The underlying redb database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run `f` in a read-only transaction.
    pub fn view<T, F>(&self, f: F) -> BoltResult<T>
    where
        F: FnOnce(&mut Tx<'_>) -> BoltResult<T>,
    {
        trace!("bolt: begin read");
        let txn = self.db.begin_read().map_err(storage)?;
        match ReadEngine::open(&txn) {
            Ok(mut engine) => f(&mut Tx::new(&mut engine)),
            Err(err) => run_failed(err, f),
        }
    }

    /// Run `f` in a read-write transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back otherwise.
    pub fn update<T, F>(&self, f: F) -> BoltResult<T>
    where
        F: FnOnce(&mut Tx<'_>) -> BoltResult<T>,
    {
        trace!("bolt: begin write");
        let txn = self.db.begin_write().map_err(storage)?;
        let result = match WriteEngine::open(&txn) {
            Ok(mut engine) => f(&mut Tx::new(&mut engine)),
            Err(err) => run_failed(err, f),
        };

        match result {
            Ok(value) => {
                txn.commit().map_err(storage)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort) = txn.abort() {
                    warn!(error = %abort, "bolt: abort failed");
                }
                Err(err)
            }
        }
    }

    /// Run `f` in a read-write transaction that the engine may group with
    /// others. Redb serializes writers, so this behaves like [`Db::update`].
    pub fn batch<T, F>(&self, f: F) -> BoltResult<T>
    where
        F: FnOnce(&mut Tx<'_>) -> BoltResult<T>,
    {
        self.update(f)
    }

    /// Close the database.
    pub fn close(self) {
        debug!(path = ?self.path, "bolt: closing database");
        drop(self.db);
    }
}

/// Run `f` against a failed handle. Its own error wins; otherwise the
/// open error is the result.
fn run_failed<T, F>(err: BoltError, f: F) -> BoltResult<T>
where
    F: FnOnce(&mut Tx<'_>) -> BoltResult<T>,
{
    debug!(error = %err, "bolt: transaction unusable");
    f(&mut Tx::failed(err.clone()))?;
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use redb::ReadableTable;

    #[test]
    fn test_options_from_yaml() {
        let opts: Options = serde_yaml::from_str("cache_size: 1048576\n").unwrap();
        assert_eq!(opts.cache_size, 1 << 20);
        assert!(!opts.must_exist);

        let opts: Options = serde_yaml::from_str("{}").unwrap();
        assert_eq!(opts, Options::default());
    }

    #[test]
    fn test_memory_has_no_path() {
        let db = Db::memory().unwrap();
        assert!(db.path().is_none());
        db.close();
    }

    #[test]
    fn test_from_database_creates_tables() {
        let raw = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .unwrap();
        let db = Db::from_database(raw).unwrap();
        assert!(db.path().is_none());

        db.update(|tx| tx.set(&["users", "alice"], b"A1")).unwrap();
        let value = db.view(|tx| tx.get(&["users", "alice"])).unwrap();
        assert_eq!(value, Some(b"A1".to_vec()));
    }

    #[test]
    fn test_database_exposes_tables() {
        let db = Db::memory().unwrap();
        db.update(|tx| tx.create_bucket(&["users"])).unwrap();

        let txn = db.database().begin_read().unwrap();
        txn.open_table(ENTRIES).unwrap();
        let meta = txn.open_table(META).unwrap();
        assert_eq!(meta.get("sequence").unwrap().map(|v| v.value()), Some(1));
    }

    #[test]
    fn test_run_failed_prefers_closure_error() {
        let err = BoltError::Storage("boom".to_string());
        let res: BoltResult<()> = run_failed(err.clone(), |_| Err(BoltError::KeyRequired));
        assert_eq!(res, Err(BoltError::KeyRequired));

        let res: BoltResult<()> = run_failed(err.clone(), |_| Ok(()));
        assert_eq!(res, Err(err));
    }
}
