use std::hash::{BuildHasher, Hash};
use std::sync::Mutex;

use ahash::RandomState;
use log::trace;

/// A bucket holds up to `capacity` key/value entries whose key hashes agree
/// on the bucket's low `depth` bits.
struct Bucket<K, V> {
    depth: usize,
    capacity: usize,
    items: Vec<(K, V)>,
}

impl<K: Eq + Clone, V: Clone> Bucket<K, V> {
    fn new(capacity: usize, depth: usize) -> Self {
        Bucket { depth, capacity, items: Vec::with_capacity(capacity) }
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.items.iter().position(|(k, _)| k == key) {
            Some(i) => {
                self.items.remove(i);
                true
            }
            None => false,
        }
    }

    /// Insert the pair into the bucket, overwriting the value if the key is
    /// already present. Return false when the bucket is full and the key is
    /// absent.
    fn insert(&mut self, key: &K, value: &V) -> bool {
        for (k, v) in self.items.iter_mut() {
            if k == key {
                *v = value.clone();
                return true;
            }
        }
        if self.items.len() == self.capacity {
            return false;
        }
        self.items.push((key.clone(), value.clone()));
        true
    }
}

/// ExtendibleHashTable implements a hash table with the extendible hashing
/// growth scheme: a directory of 2^global_depth slots addresses buckets by
/// the low bits of the key hash, and a full bucket is split instead of
/// rehashing the whole table.
///
/// Buckets live in an append-only arena and the directory refers to them by
/// index, so a bucket of local depth d is aliased by 2^(global_depth - d)
/// directory slots. The table never merges buckets or shrinks the directory.
///
/// The default hasher is seeded with fixed keys, so key placement is
/// deterministic across processes and runs.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    global_depth: usize,
    bucket_size: usize,
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
    state: S,
}

impl<K: Eq + Hash + Clone, V: Clone> ExtendibleHashTable<K, V> {
    /// Create a table with a single empty bucket of the given size.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::with_seeds(3, 7, 11, 13))
    }
}

impl<K: Eq + Hash + Clone, V: Clone, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    /// Create a table that hashes keys with the given hasher state.
    pub fn with_hasher(bucket_size: usize, state: S) -> Self {
        assert!(bucket_size > 0, "bucket size should be larger than zero");
        let buckets = vec![Bucket::new(bucket_size, 0)];
        ExtendibleHashTable { global_depth: 0, bucket_size, dir: vec![0], buckets, state }
    }

    /// Directory slot of the key, i.e., the low global_depth bits of its hash.
    fn index_of(&self, key: &K) -> usize {
        let mask = (1 << self.global_depth) - 1;
        (self.state.hash_one(key) as usize) & mask
    }

    /// Number of hash bits the directory distinguishes.
    pub fn global_depth(&self) -> usize {
        self.global_depth
    }

    /// Number of hash bits the bucket behind the given directory slot
    /// distinguishes.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        self.buckets[self.dir[dir_index]].depth
    }

    /// Number of distinct buckets reachable through the directory.
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Look up the value bound to the key.
    pub fn find(&self, key: &K) -> Option<V> {
        let slot = self.index_of(key);
        self.buckets[self.dir[slot]].find(key).cloned()
    }

    /// Remove the binding for the key if present, return whether a binding
    /// was removed. Buckets are never merged and the directory never shrinks.
    pub fn remove(&mut self, key: &K) -> bool {
        let slot = self.index_of(key);
        let idx = self.dir[slot];
        self.buckets[idx].remove(key)
    }

    /// Insert or replace the binding for the key.
    ///
    /// When the target bucket is full and does not contain the key, the
    /// bucket is split and the insert retried. A single insert may trigger a
    /// chain of splits when every resident key keeps hashing to the same
    /// extended prefix; each split strictly deepens the bucket's local depth,
    /// bounded by the hash width, so the loop terminates.
    pub fn insert(&mut self, key: K, value: V) {
        loop {
            let slot = self.index_of(&key);
            let idx = self.dir[slot];
            if self.buckets[idx].insert(&key, &value) {
                return;
            }
            self.split(slot);
        }
    }

    /// Split the full bucket behind the given directory slot.
    ///
    /// If the bucket already distinguishes all global_depth bits, the
    /// directory is doubled first so every old bucket is aliased at its
    /// original slot and at slot | (1 << global_depth). The bucket's local
    /// depth then grows by one, a sibling bucket takes over the prefix with
    /// the new bit set, and the resident entries are rehashed between the
    /// two.
    fn split(&mut self, slot: usize) {
        let idx = self.dir[slot];
        if self.buckets[idx].depth == self.global_depth {
            let dir_size = self.dir.len();
            for i in 0..dir_size {
                let alias = self.dir[i];
                self.dir.push(alias);
            }
            self.global_depth += 1;
            trace!("directory doubled to global depth {}", self.global_depth);
        }

        let depth = self.buckets[idx].depth + 1;
        self.buckets[idx].depth = depth;
        // every slot referencing this bucket agrees on the low depth-1 bits;
        // the sibling takes the prefix with the new high bit set.
        let prefix = slot & ((1 << (depth - 1)) - 1);
        let sibling_prefix = prefix | (1 << (depth - 1));
        let mask = (1 << depth) - 1;

        let sibling_idx = self.buckets.len();
        let mut sibling = Bucket::new(self.bucket_size, depth);
        let items = std::mem::take(&mut self.buckets[idx].items);
        for (k, v) in items {
            if (self.state.hash_one(&k) as usize) & mask == sibling_prefix {
                sibling.items.push((k, v));
            } else {
                self.buckets[idx].items.push((k, v));
            }
        }
        trace!(
            "split bucket {} at local depth {}, sibling {} took {} entries",
            idx,
            depth,
            sibling_idx,
            sibling.items.len()
        );
        self.buckets.push(sibling);

        for i in 0..self.dir.len() {
            if i & mask == sibling_prefix {
                self.dir[i] = sibling_idx;
            }
        }
    }
}

/// SyncExtendibleHashTable implements the thread-safe version of the table,
/// basically all the heavy lifting happens in the ExtendibleHashTable.
pub struct SyncExtendibleHashTable<K, V, S = RandomState> {
    inner: Mutex<ExtendibleHashTable<K, V, S>>,
}

impl<K: Eq + Hash + Clone, V: Clone> SyncExtendibleHashTable<K, V> {
    pub fn new(bucket_size: usize) -> Self {
        let inner = Mutex::new(ExtendibleHashTable::new(bucket_size));
        SyncExtendibleHashTable { inner }
    }
}

impl<K: Eq + Hash + Clone, V: Clone, S: BuildHasher> SyncExtendibleHashTable<K, V, S> {
    pub fn with_hasher(bucket_size: usize, state: S) -> Self {
        let inner = Mutex::new(ExtendibleHashTable::with_hasher(bucket_size, state));
        SyncExtendibleHashTable { inner }
    }

    pub fn global_depth(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.global_depth()
    }

    pub fn local_depth(&self, dir_index: usize) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.local_depth(dir_index)
    }

    pub fn num_buckets(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.num_buckets()
    }

    pub fn find(&self, key: &K) -> Option<V> {
        let guard = self.inner.lock().unwrap();
        guard.find(key)
    }

    pub fn insert(&self, key: K, value: V) {
        let mut guard = self.inner.lock().unwrap();
        guard.insert(key, value)
    }

    pub fn remove(&self, key: &K) -> bool {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(key)
    }
}
