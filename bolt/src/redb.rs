//! Redb-backed engine.
//!
//! All buckets share one table. An entry key is the parent bucket id
//! followed by the entry name, so the entries of a bucket form one
//! contiguous, name-ordered key range:
//!
//! ```text
//! entries: {parent_id:8BE}{name}  -> 0x00 {value}        leaf
//!                                 -> 0x01 {child_id:8BE} bucket
//! meta:    "sequence"             -> last allocated bucket id
//! ```
//!
//! The root bucket has id 0 and no entry of its own.

use std::ops::ControlFlow;

use redb::{ReadOnlyTable, ReadTransaction, ReadableTable, Table, TableDefinition, WriteTransaction};

use crate::engine::{BucketRef, Engine, Entry, Visit};
use crate::error::{BoltError, BoltResult, storage};

pub(crate) const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");
pub(crate) const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const SEQUENCE: &str = "sequence";

const TAG_LEAF: u8 = 0x00;
const TAG_BUCKET: u8 = 0x01;

/// A decoded entry value.
#[derive(Debug, PartialEq, Eq)]
enum Stored<'a> {
    Leaf(&'a [u8]),
    Bucket(BucketRef),
}

fn entry_key(parent: BucketRef, name: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + name.len());
    key.extend_from_slice(&parent.id().to_be_bytes());
    key.extend_from_slice(name);
    key
}

fn encode_leaf(value: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(1 + value.len());
    raw.push(TAG_LEAF);
    raw.extend_from_slice(value);
    raw
}

fn encode_bucket(child: BucketRef) -> [u8; 9] {
    let mut raw = [0u8; 9];
    raw[0] = TAG_BUCKET;
    raw[1..].copy_from_slice(&child.id().to_be_bytes());
    raw
}

fn decode(raw: &[u8]) -> BoltResult<Stored<'_>> {
    match raw.split_first() {
        Some((&TAG_LEAF, value)) => Ok(Stored::Leaf(value)),
        Some((&TAG_BUCKET, id)) => {
            let id: [u8; 8] = id
                .try_into()
                .map_err(|_| BoltError::Corrupted(format!("bucket id of {} bytes", id.len())))?;
            Ok(Stored::Bucket(BucketRef::from_id(u64::from_be_bytes(id))))
        }
        Some((tag, _)) => Err(BoltError::Corrupted(format!("unknown entry tag {tag:#04x}"))),
        None => Err(BoltError::Corrupted("empty entry".to_string())),
    }
}

// --- shared read paths ---

fn lookup<T>(table: &T, parent: BucketRef, name: &[u8]) -> BoltResult<Option<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let key = entry_key(parent, name);
    Ok(table
        .get(&key[..])
        .map_err(storage)?
        .map(|raw| raw.value().to_vec()))
}

fn bucket_in<T>(table: &T, parent: BucketRef, name: &[u8]) -> BoltResult<Option<BucketRef>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    match lookup(table, parent, name)? {
        Some(raw) => match decode(&raw)? {
            Stored::Bucket(child) => Ok(Some(child)),
            Stored::Leaf(_) => Ok(None),
        },
        None => Ok(None),
    }
}

fn get_in<T>(table: &T, bucket: BucketRef, key: &[u8]) -> BoltResult<Option<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    match lookup(table, bucket, key)? {
        Some(raw) => match decode(&raw)? {
            Stored::Leaf(value) => Ok(Some(value.to_vec())),
            Stored::Bucket(_) => Ok(None),
        },
        None => Ok(None),
    }
}

fn seek_in<T>(
    table: &T,
    bucket: BucketRef,
    from: &[u8],
    visit: &mut Visit<'_>,
) -> BoltResult<ControlFlow<()>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let scope = bucket.id().to_be_bytes();
    let start = entry_key(bucket, from);

    for item in table.range(&start[..]..).map_err(storage)? {
        let (key, raw) = item.map_err(storage)?;
        let key_bytes = key.value();

        // Still inside this bucket's range?
        if !key_bytes.starts_with(&scope) {
            break;
        }

        let entry = match decode(raw.value())? {
            Stored::Leaf(value) => Entry::Value(value),
            Stored::Bucket(_) => Entry::Bucket,
        };
        if visit(&key_bytes[scope.len()..], entry)?.is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }
    Ok(ControlFlow::Continue(()))
}

// ---------------------------------------------------------------------------
// Read-only engine
// ---------------------------------------------------------------------------

/// Engine over a read transaction.
pub(crate) struct ReadEngine {
    entries: ReadOnlyTable<&'static [u8], &'static [u8]>,
}

impl ReadEngine {
    pub(crate) fn open(txn: &ReadTransaction) -> BoltResult<Self> {
        Ok(Self {
            entries: txn.open_table(ENTRIES).map_err(storage)?,
        })
    }
}

impl Engine for ReadEngine {
    fn writable(&self) -> bool {
        false
    }

    fn bucket(&self, parent: BucketRef, name: &[u8]) -> BoltResult<Option<BucketRef>> {
        bucket_in(&self.entries, parent, name)
    }

    fn create_bucket_if_not_exists(&mut self, _: BucketRef, _: &[u8]) -> BoltResult<BucketRef> {
        Err(BoltError::TxNotWritable)
    }

    fn delete_bucket(&mut self, _: BucketRef, _: &[u8]) -> BoltResult<()> {
        Err(BoltError::TxNotWritable)
    }

    fn get(&self, bucket: BucketRef, key: &[u8]) -> BoltResult<Option<Vec<u8>>> {
        get_in(&self.entries, bucket, key)
    }

    fn put(&mut self, _: BucketRef, _: &[u8], _: &[u8]) -> BoltResult<()> {
        Err(BoltError::TxNotWritable)
    }

    fn delete(&mut self, _: BucketRef, _: &[u8]) -> BoltResult<()> {
        Err(BoltError::TxNotWritable)
    }

    fn seek(
        &self,
        bucket: BucketRef,
        from: &[u8],
        visit: &mut Visit<'_>,
    ) -> BoltResult<ControlFlow<()>> {
        seek_in(&self.entries, bucket, from, visit)
    }
}

// ---------------------------------------------------------------------------
// Read-write engine
// ---------------------------------------------------------------------------

/// Engine over a write transaction.
pub(crate) struct WriteEngine<'txn> {
    entries: Table<'txn, &'static [u8], &'static [u8]>,
    meta: Table<'txn, &'static str, u64>,
}

impl<'txn> WriteEngine<'txn> {
    pub(crate) fn open(txn: &'txn WriteTransaction) -> BoltResult<Self> {
        Ok(Self {
            entries: txn.open_table(ENTRIES).map_err(storage)?,
            meta: txn.open_table(META).map_err(storage)?,
        })
    }

    fn next_bucket_id(&mut self) -> BoltResult<BucketRef> {
        let last = self
            .meta
            .get(SEQUENCE)
            .map_err(storage)?
            .map(|v| v.value())
            .unwrap_or(0);
        let next = last + 1;
        self.meta.insert(SEQUENCE, next).map_err(storage)?;
        Ok(BucketRef::from_id(next))
    }

    /// Remove every entry of `bucket`, descending into child buckets.
    /// Iterative: nesting depth is not limited by the call stack.
    fn clear(&mut self, bucket: BucketRef) -> BoltResult<()> {
        let mut pending = vec![bucket];
        while let Some(current) = pending.pop() {
            let mut keys = Vec::new();
            {
                let scope = current.id().to_be_bytes();
                for item in self.entries.range(&scope[..]..).map_err(storage)? {
                    let (key, raw) = item.map_err(storage)?;
                    let key_bytes = key.value();
                    if !key_bytes.starts_with(&scope) {
                        break;
                    }
                    if let Stored::Bucket(child) = decode(raw.value())? {
                        pending.push(child);
                    }
                    keys.push(key_bytes.to_vec());
                }
            }

            for key in keys {
                self.entries.remove(&key[..]).map_err(storage)?;
            }
        }
        Ok(())
    }
}

impl Engine for WriteEngine<'_> {
    fn writable(&self) -> bool {
        true
    }

    fn bucket(&self, parent: BucketRef, name: &[u8]) -> BoltResult<Option<BucketRef>> {
        bucket_in(&self.entries, parent, name)
    }

    fn create_bucket_if_not_exists(
        &mut self,
        parent: BucketRef,
        name: &[u8],
    ) -> BoltResult<BucketRef> {
        if name.is_empty() {
            return Err(BoltError::BucketNameRequired);
        }
        if let Some(raw) = lookup(&self.entries, parent, name)? {
            return match decode(&raw)? {
                Stored::Bucket(child) => Ok(child),
                Stored::Leaf(_) => Err(BoltError::BucketExists),
            };
        }

        let child = self.next_bucket_id()?;
        let key = entry_key(parent, name);
        self.entries
            .insert(&key[..], &encode_bucket(child)[..])
            .map_err(storage)?;
        Ok(child)
    }

    fn delete_bucket(&mut self, parent: BucketRef, name: &[u8]) -> BoltResult<()> {
        let child = match lookup(&self.entries, parent, name)? {
            Some(raw) => match decode(&raw)? {
                Stored::Bucket(child) => child,
                Stored::Leaf(_) => return Err(BoltError::IncompatibleValue),
            },
            None => return Err(BoltError::BucketNotFound),
        };

        self.clear(child)?;
        let key = entry_key(parent, name);
        self.entries.remove(&key[..]).map_err(storage)?;
        Ok(())
    }

    fn get(&self, bucket: BucketRef, key: &[u8]) -> BoltResult<Option<Vec<u8>>> {
        get_in(&self.entries, bucket, key)
    }

    fn put(&mut self, bucket: BucketRef, key: &[u8], value: &[u8]) -> BoltResult<()> {
        if key.is_empty() {
            return Err(BoltError::KeyRequired);
        }
        if let Some(raw) = lookup(&self.entries, bucket, key)? {
            if let Stored::Bucket(_) = decode(&raw)? {
                return Err(BoltError::IncompatibleValue);
            }
        }

        let entry = entry_key(bucket, key);
        self.entries
            .insert(&entry[..], &encode_leaf(value)[..])
            .map_err(storage)?;
        Ok(())
    }

    fn delete(&mut self, bucket: BucketRef, key: &[u8]) -> BoltResult<()> {
        match lookup(&self.entries, bucket, key)? {
            Some(raw) => {
                if let Stored::Bucket(_) = decode(&raw)? {
                    return Err(BoltError::IncompatibleValue);
                }
                let entry = entry_key(bucket, key);
                self.entries.remove(&entry[..]).map_err(storage)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn seek(
        &self,
        bucket: BucketRef,
        from: &[u8],
        visit: &mut Visit<'_>,
    ) -> BoltResult<ControlFlow<()>> {
        seek_in(&self.entries, bucket, from, visit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redb::Database;
    use redb::backends::InMemoryBackend;

    fn memory_db() -> Database {
        Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .unwrap()
    }

    fn names(engine: &dyn Engine, bucket: BucketRef, from: &[u8]) -> Vec<(String, bool)> {
        let mut out = Vec::new();
        engine
            .seek(bucket, from, &mut |name: &[u8], entry: Entry<'_>| {
                out.push((
                    String::from_utf8_lossy(name).to_string(),
                    entry == Entry::Bucket,
                ));
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();
        out
    }

    #[test]
    fn test_entry_key_layout() {
        let key = entry_key(BucketRef::from_id(0x0102), b"abc");
        assert_eq!(key, vec![0, 0, 0, 0, 0, 0, 1, 2, b'a', b'b', b'c']);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(&[]), Err(BoltError::Corrupted(_))));
        assert!(matches!(decode(&[0x07, 1]), Err(BoltError::Corrupted(_))));
        assert!(matches!(decode(&[TAG_BUCKET, 1, 2]), Err(BoltError::Corrupted(_))));
        assert_eq!(decode(&[TAG_LEAF]).unwrap(), Stored::Leaf(&[]));
        assert_eq!(
            decode(&encode_bucket(BucketRef::from_id(9))).unwrap(),
            Stored::Bucket(BucketRef::from_id(9))
        );
    }

    #[test]
    fn test_write_engine_buckets_and_leaves() {
        let db = memory_db();
        let txn = db.begin_write().unwrap();
        {
            let mut engine = WriteEngine::open(&txn).unwrap();
            let users = engine
                .create_bucket_if_not_exists(BucketRef::ROOT, b"users")
                .unwrap();
            assert_eq!(
                engine
                    .create_bucket_if_not_exists(BucketRef::ROOT, b"users")
                    .unwrap(),
                users
            );

            engine.put(users, b"bob", b"B1").unwrap();
            engine.put(users, b"alice", b"A1").unwrap();
            engine.create_bucket_if_not_exists(users, b"admins").unwrap();

            assert_eq!(engine.get(users, b"alice").unwrap(), Some(b"A1".to_vec()));
            assert_eq!(engine.get(users, b"admins").unwrap(), None);
            assert_eq!(
                names(&engine, users, b""),
                vec![
                    ("admins".to_string(), true),
                    ("alice".to_string(), false),
                    ("bob".to_string(), false),
                ]
            );
            assert_eq!(names(&engine, users, b"b"), vec![("bob".to_string(), false)]);
        }
        txn.commit().unwrap();
    }

    #[test]
    fn test_write_engine_kind_conflicts() {
        let db = memory_db();
        let txn = db.begin_write().unwrap();
        {
            let mut engine = WriteEngine::open(&txn).unwrap();
            let top = engine
                .create_bucket_if_not_exists(BucketRef::ROOT, b"top")
                .unwrap();
            engine.put(top, b"leaf", b"v").unwrap();
            engine.create_bucket_if_not_exists(top, b"child").unwrap();

            assert_eq!(
                engine.create_bucket_if_not_exists(top, b"leaf"),
                Err(BoltError::BucketExists)
            );
            assert_eq!(engine.put(top, b"child", b"v"), Err(BoltError::IncompatibleValue));
            assert_eq!(engine.delete(top, b"child"), Err(BoltError::IncompatibleValue));
            assert_eq!(engine.delete_bucket(top, b"leaf"), Err(BoltError::IncompatibleValue));
            assert_eq!(engine.delete_bucket(top, b"nope"), Err(BoltError::BucketNotFound));
            assert_eq!(engine.put(top, b"", b"v"), Err(BoltError::KeyRequired));
            assert_eq!(
                engine.create_bucket_if_not_exists(top, b""),
                Err(BoltError::BucketNameRequired)
            );
            assert_eq!(engine.delete(top, b"missing"), Ok(()));
        }
        txn.abort().unwrap();
    }

    #[test]
    fn test_delete_bucket_clears_descendants() {
        let db = memory_db();
        let txn = db.begin_write().unwrap();
        {
            let mut engine = WriteEngine::open(&txn).unwrap();
            let a = engine.create_bucket_if_not_exists(BucketRef::ROOT, b"a").unwrap();
            let b = engine.create_bucket_if_not_exists(a, b"b").unwrap();
            let c = engine.create_bucket_if_not_exists(b, b"c").unwrap();
            engine.put(b, b"k", b"v").unwrap();
            engine.put(c, b"k", b"v").unwrap();
            let keep = engine.create_bucket_if_not_exists(BucketRef::ROOT, b"keep").unwrap();
            engine.put(keep, b"k", b"v").unwrap();

            engine.delete_bucket(BucketRef::ROOT, b"a").unwrap();

            assert_eq!(engine.bucket(BucketRef::ROOT, b"a").unwrap(), None);
            assert!(names(&engine, b, b"").is_empty());
            assert!(names(&engine, c, b"").is_empty());
            assert_eq!(engine.get(keep, b"k").unwrap(), Some(b"v".to_vec()));
            assert_eq!(names(&engine, BucketRef::ROOT, b""), vec![("keep".to_string(), true)]);
        }
        txn.commit().unwrap();
    }

    #[test]
    fn test_read_engine_rejects_writes() {
        let db = memory_db();
        let txn = db.begin_write().unwrap();
        {
            let mut engine = WriteEngine::open(&txn).unwrap();
            engine.create_bucket_if_not_exists(BucketRef::ROOT, b"top").unwrap();
        }
        txn.commit().unwrap();

        let txn = db.begin_read().unwrap();
        let mut engine = ReadEngine::open(&txn).unwrap();
        assert!(!engine.writable());
        let top = engine.bucket(BucketRef::ROOT, b"top").unwrap().unwrap();
        assert_eq!(engine.put(top, b"k", b"v"), Err(BoltError::TxNotWritable));
        assert_eq!(
            engine.create_bucket_if_not_exists(top, b"x"),
            Err(BoltError::TxNotWritable)
        );
        assert_eq!(engine.delete_bucket(BucketRef::ROOT, b"top"), Err(BoltError::TxNotWritable));
    }
}
