use std::ops::ControlFlow;

use crate::engine::{BucketRef, Entry};
use crate::error::BoltResult;
use crate::tx::{Target, Tx};

impl Tx<'_> {
    /// Visit the contents of the bucket at `path`.
    ///
    /// `visit` receives `(name, value, is_bucket)`. Child buckets come first
    /// with no value, then leaves with their value, each group in byte-wise
    /// name order. A non-empty `prefix` restricts both groups to names that
    /// start with it. An empty `path` lists the top-level buckets and ignores
    /// `prefix`.
    ///
    /// Returning `ControlFlow::Break(())` from `visit` ends the scan early and
    /// the scan still succeeds; an `Err` from `visit` is returned as is.
    pub fn scan<P, F>(&mut self, path: &[P], prefix: &[u8], mut visit: F) -> BoltResult<()>
    where
        P: AsRef<[u8]>,
        F: FnMut(&[u8], Option<&[u8]>, bool) -> BoltResult<ControlFlow<()>>,
    {
        self.check()?;

        if path.is_empty() {
            return self
                .engine()?
                .for_each_bucket(BucketRef::ROOT, &mut |name: &[u8]| visit(name, None, true))
                .map(|_| ());
        }

        let bucket = match self.resolve(path, false)? {
            Target::Root => BucketRef::ROOT,
            Target::Bucket(bucket) => bucket,
        };
        let engine = self.engine()?;

        if prefix.is_empty() {
            let flow = engine.for_each_bucket(bucket, &mut |name: &[u8]| visit(name, None, true))?;
            if flow.is_break() {
                return Ok(());
            }
            // A name that is a bucket was reported above.
            return engine
                .for_each(bucket, &mut |name: &[u8], entry: Entry<'_>| match entry {
                    Entry::Bucket => Ok(ControlFlow::Continue(())),
                    Entry::Value(value) => visit(name, Some(value), false),
                })
                .map(|_| ());
        }

        // Names sharing the prefix are contiguous from the seek position, so
        // each pass stops at the first name that diverges.
        let mut stopped = false;
        engine
            .seek(bucket, prefix, &mut |name: &[u8], entry: Entry<'_>| {
                if !name.starts_with(prefix) {
                    return Ok(ControlFlow::Break(()));
                }
                match entry {
                    Entry::Bucket => {
                        let flow = visit(name, None, true)?;
                        stopped = flow.is_break();
                        Ok(flow)
                    }
                    Entry::Value(_) => Ok(ControlFlow::Continue(())),
                }
            })
            .map(|_| ())?;
        if stopped {
            return Ok(());
        }

        engine
            .seek(bucket, prefix, &mut |name: &[u8], entry: Entry<'_>| {
                if !name.starts_with(prefix) {
                    return Ok(ControlFlow::Break(()));
                }
                match entry {
                    Entry::Bucket => Ok(ControlFlow::Continue(())),
                    Entry::Value(value) => visit(name, Some(value), false),
                }
            })
            .map(|_| ())
    }
}
