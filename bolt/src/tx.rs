//! Path-addressed operations inside one transaction.
//!
//! A key path is an ordered list of name segments. Every segment but the
//! last names a bucket; the last one names either a leaf key or a child
//! bucket, depending on the operation. The root namespace only holds
//! buckets, so paths shorter than two segments never address a leaf.

use crate::engine::{BucketRef, Engine};
use crate::error::{BoltError, BoltResult};

/// Result of resolving a bucket prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The prefix was empty; no navigation happened.
    Root,
    Bucket(BucketRef),
}

impl Target {
    /// The resolved bucket, or `BucketNameRequired` for the root sentinel.
    pub fn bucket(self) -> BoltResult<BucketRef> {
        match self {
            Target::Root => Err(BoltError::BucketNameRequired),
            Target::Bucket(bucket) => Ok(bucket),
        }
    }
}

enum State<'a> {
    Ready(&'a mut (dyn Engine + 'a)),
    Failed(BoltError),
}

/// A transaction handle.
///
/// Obtained from [`Db::view`](crate::Db::view), [`Db::update`](crate::Db::update)
/// or [`Db::batch`](crate::Db::batch). If the transaction could not be set up,
/// the handle carries that error and every operation returns it.
pub struct Tx<'a> {
    state: State<'a>,
}

impl<'a> Tx<'a> {
    pub fn new(engine: &'a mut (dyn Engine + 'a)) -> Self {
        Self {
            state: State::Ready(engine),
        }
    }

    /// A handle whose every operation fails with `err`.
    pub fn failed(err: BoltError) -> Self {
        Self {
            state: State::Failed(err),
        }
    }

    /// The error captured when the transaction was opened, if any.
    pub fn err(&self) -> Option<&BoltError> {
        match &self.state {
            State::Ready(_) => None,
            State::Failed(err) => Some(err),
        }
    }

    /// Whether this transaction may modify the store.
    pub fn writable(&self) -> bool {
        match &self.state {
            State::Ready(engine) => engine.writable(),
            State::Failed(_) => false,
        }
    }

    pub(crate) fn check(&self) -> BoltResult<()> {
        match self.err() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub(crate) fn engine(&mut self) -> BoltResult<&mut (dyn Engine + 'a)> {
        match &mut self.state {
            State::Ready(engine) => Ok(&mut **engine),
            State::Failed(err) => Err(err.clone()),
        }
    }

    /// Walk `path` from the root, one bucket per segment.
    ///
    /// With `create`, missing buckets are created on the way; otherwise the
    /// first missing segment fails with `BucketNotFound`.
    pub fn resolve<P: AsRef<[u8]>>(&mut self, path: &[P], create: bool) -> BoltResult<Target> {
        let engine = self.engine()?;

        let mut target = Target::Root;
        for name in path {
            let parent = match target {
                Target::Root => BucketRef::ROOT,
                Target::Bucket(bucket) => bucket,
            };
            let next = if create {
                engine.create_bucket_if_not_exists(parent, name.as_ref())?
            } else {
                engine
                    .bucket(parent, name.as_ref())?
                    .ok_or(BoltError::BucketNotFound)?
            };
            target = Target::Bucket(next);
        }
        Ok(target)
    }

    /// Create every bucket along `path`. Existing buckets are left as they are.
    pub fn create_bucket<P: AsRef<[u8]>>(&mut self, path: &[P]) -> BoltResult<()> {
        self.check()?;
        self.resolve(path, true)?.bucket()?;
        Ok(())
    }

    /// Store `value` under the last segment of `path`, creating the buckets
    /// named by the other segments.
    pub fn set<P: AsRef<[u8]>>(&mut self, path: &[P], value: &[u8]) -> BoltResult<()> {
        self.check()?;
        let (prefix, key) = split_leaf(path)?;
        let bucket = self.resolve(prefix, true)?.bucket()?;
        self.engine()?.put(bucket, key, value)
    }

    /// Read the leaf at `path`. A missing leaf is `Ok(None)`; a missing
    /// bucket along the way is `BucketNotFound`.
    pub fn get<P: AsRef<[u8]>>(&mut self, path: &[P]) -> BoltResult<Option<Vec<u8>>> {
        self.check()?;
        let (prefix, key) = split_leaf(path)?;
        let bucket = self.resolve(prefix, false)?.bucket()?;
        self.engine()?.get(bucket, key)
    }

    /// Delete whatever `path` names.
    ///
    /// One segment removes a top-level bucket. Otherwise the last segment is
    /// removed from its bucket: a child bucket goes with its whole subtree, a
    /// leaf goes alone, and an absent leaf is not an error.
    pub fn delete<P: AsRef<[u8]>>(&mut self, path: &[P]) -> BoltResult<()> {
        self.check()?;
        match path {
            [] => Err(BoltError::KeyRequired),
            [name] => self.engine()?.delete_bucket(BucketRef::ROOT, name.as_ref()),
            [prefix @ .., key] => {
                let bucket = self.resolve(prefix, false)?.bucket()?;
                let key = key.as_ref();
                let engine = self.engine()?;
                if engine.bucket(bucket, key)?.is_some() {
                    engine.delete_bucket(bucket, key)
                } else {
                    engine.delete(bucket, key)
                }
            }
        }
    }
}

/// Split a leaf path into its bucket prefix and key.
fn split_leaf<P: AsRef<[u8]>>(path: &[P]) -> BoltResult<(&[P], &[u8])> {
    match path {
        [] => Err(BoltError::KeyRequired),
        [_] => Err(BoltError::BucketNameRequired),
        [prefix @ .., key] => Ok((prefix, key.as_ref())),
    }
}
