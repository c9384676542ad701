//! Transaction and bucket views.

use crate::error::{StoreError, StoreResult};
use crate::frame::Op;
use std::collections::{BTreeMap, BTreeSet};

/// Ordered key/value entries of one bucket.
pub(crate) type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

/// All buckets of a store, ordered by name.
pub(crate) type Buckets = BTreeMap<Vec<u8>, Entries>;

/// A read-only transaction.
///
/// Obtained through [`crate::Store::view`]. Holds a consistent snapshot for
/// its whole lifetime; writers wait until it is dropped.
pub struct ReadTx<'a> {
    buckets: &'a Buckets,
}

impl<'a> ReadTx<'a> {
    pub(crate) fn new(buckets: &'a Buckets) -> Self {
        Self { buckets }
    }

    /// Returns the named bucket, or `None` if it was never created.
    #[must_use]
    pub fn bucket(&self, name: &[u8]) -> Option<Bucket<'a>> {
        self.buckets
            .get_key_value(name)
            .map(|(name, entries)| Bucket { name, entries })
    }

    /// Returns every bucket name in ascending order.
    #[must_use]
    pub fn bucket_names(&self) -> Vec<&'a [u8]> {
        self.buckets.keys().map(Vec::as_slice).collect()
    }
}

/// A read view of a single bucket.
#[derive(Clone, Copy)]
pub struct Bucket<'a> {
    name: &'a [u8],
    entries: &'a Entries,
}

impl<'a> Bucket<'a> {
    /// Returns the bucket name.
    #[must_use]
    pub fn name(&self) -> &'a [u8] {
        self.name
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&'a [u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the bucket has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}

/// A read/write transaction.
///
/// Obtained through [`crate::Store::update`]. Writes are buffered here and
/// only reach the log and the shared buckets when the closure returns `Ok`.
pub struct WriteTx<'a> {
    base: &'a Buckets,
    created: BTreeSet<Vec<u8>>,
    pending: BTreeMap<Vec<u8>, Entries>,
    ops: Vec<Op>,
}

impl<'a> WriteTx<'a> {
    pub(crate) fn new(base: &'a Buckets) -> Self {
        Self {
            base,
            created: BTreeSet::new(),
            pending: BTreeMap::new(),
            ops: Vec::new(),
        }
    }

    pub(crate) fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    fn has_bucket(&self, name: &[u8]) -> bool {
        self.base.contains_key(name) || self.created.contains(name)
    }

    /// Returns the named bucket, creating it within this transaction if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BucketNameRequired`] for an empty name.
    pub fn create_bucket_if_not_exists(&mut self, name: &[u8]) -> StoreResult<BucketMut<'_, 'a>> {
        if name.is_empty() {
            return Err(StoreError::BucketNameRequired);
        }

        if !self.has_bucket(name) {
            self.created.insert(name.to_vec());
            self.ops.push(Op::CreateBucket {
                bucket: name.to_vec(),
            });
        }

        Ok(BucketMut {
            tx: self,
            name: name.to_vec(),
        })
    }
}

/// A writable view of a single bucket inside a [`WriteTx`].
pub struct BucketMut<'t, 'a> {
    tx: &'t mut WriteTx<'a>,
    name: Vec<u8>,
}

impl BucketMut<'_, '_> {
    /// Returns the bucket name.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Returns the value under `key`, including writes made by this transaction.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.tx
            .pending
            .get(&self.name)
            .and_then(|entries| entries.get(key))
            .or_else(|| self.tx.base.get(&self.name).and_then(|e| e.get(key)))
            .map(Vec::as_slice)
    }

    /// Inserts or overwrites `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyRequired`] for an empty key.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::KeyRequired);
        }

        self.tx
            .pending
            .entry(self.name.clone())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        self.tx.ops.push(Op::Put {
            bucket: self.name.clone(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }
}

/// Applies committed operations to the in-memory buckets.
pub(crate) fn apply(buckets: &mut Buckets, ops: Vec<Op>) {
    for op in ops {
        match op {
            Op::CreateBucket { bucket } => {
                buckets.entry(bucket).or_default();
            }
            Op::Put { bucket, key, value } => {
                buckets.entry(bucket).or_default().insert(key, value);
            }
        }
    }
}
