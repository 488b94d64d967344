//! The storage seam the path facade is written against.

use std::fmt;
use std::ops::ControlFlow;

use crate::BoltResult;

/// Handle to a bucket inside one transaction.
///
/// Only meaningful within the transaction that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketRef(u64);

impl BucketRef {
    /// The root namespace. It holds buckets only.
    pub const ROOT: BucketRef = BucketRef(0);

    pub(crate) fn from_id(id: u64) -> Self {
        Self(id)
    }

    pub(crate) fn id(self) -> u64 {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Debug for BucketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "BucketRef(root)")
        } else {
            write!(f, "BucketRef({})", self.0)
        }
    }
}

/// What a name inside a bucket denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry<'a> {
    Bucket,
    Value(&'a [u8]),
}

/// Callback for ordered iteration. `Break` ends the iteration.
pub type Visit<'v> = dyn FnMut(&[u8], Entry<'_>) -> BoltResult<ControlFlow<()>> + 'v;

/// Nested-bucket primitives of a transactional engine.
///
/// Names inside one bucket are unique across buckets and leaves, and
/// iteration follows byte-wise name order.
pub trait Engine {
    /// Whether mutations are allowed.
    fn writable(&self) -> bool;

    /// Look up the child bucket `name` of `parent`.
    fn bucket(&self, parent: BucketRef, name: &[u8]) -> BoltResult<Option<BucketRef>>;

    /// Return the child bucket `name`, creating it when missing.
    ///
    /// Fails with [`BoltError::BucketExists`](crate::BoltError::BucketExists)
    /// when `name` is a leaf.
    fn create_bucket_if_not_exists(
        &mut self,
        parent: BucketRef,
        name: &[u8],
    ) -> BoltResult<BucketRef>;

    /// Remove the child bucket `name` and everything below it.
    fn delete_bucket(&mut self, parent: BucketRef, name: &[u8]) -> BoltResult<()>;

    fn get(&self, bucket: BucketRef, key: &[u8]) -> BoltResult<Option<Vec<u8>>>;

    /// Insert or overwrite the leaf `key`.
    fn put(&mut self, bucket: BucketRef, key: &[u8], value: &[u8]) -> BoltResult<()>;

    /// Remove the leaf `key`. Removing an absent key succeeds.
    fn delete(&mut self, bucket: BucketRef, key: &[u8]) -> BoltResult<()>;

    /// Visit the entries of `bucket` in order, starting at the first name
    /// that is `>= from`.
    fn seek(
        &self,
        bucket: BucketRef,
        from: &[u8],
        visit: &mut Visit<'_>,
    ) -> BoltResult<ControlFlow<()>>;

    /// Visit every entry of `bucket`.
    fn for_each(&self, bucket: BucketRef, visit: &mut Visit<'_>) -> BoltResult<ControlFlow<()>> {
        self.seek(bucket, &[], visit)
    }

    /// Visit the names of the child buckets of `bucket`.
    fn for_each_bucket(
        &self,
        bucket: BucketRef,
        visit: &mut dyn FnMut(&[u8]) -> BoltResult<ControlFlow<()>>,
    ) -> BoltResult<ControlFlow<()>> {
        self.for_each(bucket, &mut |name: &[u8], entry: Entry<'_>| match entry {
            Entry::Bucket => visit(name),
            Entry::Value(_) => Ok(ControlFlow::Continue(())),
        })
    }
}
