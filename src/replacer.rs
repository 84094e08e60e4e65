use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use log::trace;

use crate::error::{Error, Result};

/// Frames are identified by their index in the consumer's frame array,
/// i.e., a frame id is in range [0, capacity).
pub type FrameId = usize;

/// Replacer tracks frame usage for replacement in case the buffer pool is full.
pub trait Replacer {
    /// Record the event that the given frame id is accessed at current timestamp.
    /// Create a new entry for access history if frame id has not been seen before;
    /// newly tracked frames start out non-evictable.
    ///
    /// Return an invalid frame error if the frame id is beyond the replacer
    /// capacity.
    fn record_access(&self, frame_id: FrameId) -> Result<()>;

    /// Find the frame to evict with the backward k-distance policy. Only frames
    /// that are marked as evictable are candidates for eviction.
    ///
    /// Successful eviction of a frame should decrement the size of replacer and
    /// remove the frame's access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no frames
    /// can be evicted.
    fn evict(&self) -> Option<FrameId>;

    /// Toggle whether a frame is evictable or non-evictable. This function also
    /// controls replacer size. Note that size is equal to number of evictable
    /// entries.
    ///
    /// If a frame was previously evictable and is to be set to non-evictable,
    /// then size should decrement. If a frame was previously non-evictable and
    /// is to be set evictable, then size should increment. If the frame is not
    /// tracked, do nothing.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Check if a frame is evictable. If the frame is not found, return true.
    fn is_evictable(&self, frame_id: FrameId) -> bool;

    /// Remove a frame from the replacer, along with its access history, no
    /// matter what its backward k-distance is. This function should also
    /// decrement the replacer size if removal is successful.
    ///
    /// If remove is called on a non-evictable frame, return an error and leave
    /// the replacer unchanged. If the specified frame is not found, do nothing
    /// without returning any error.
    fn remove(&self, frame_id: FrameId) -> Result<()>;

    /// Replacer size, i.e., the number of evictable frames.
    fn size(&self) -> usize;
}

#[derive(Debug, Eq, PartialEq)]
struct KDistance {
    frame_id: FrameId,
    distance: usize,
    oldest_access_at: usize,
}

impl PartialOrd for KDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.distance.cmp(&other.distance).reverse() {
            Ordering::Equal => self.oldest_access_at.cmp(&other.oldest_access_at),
            other => other,
        }
    }
}

struct LRUKNode {
    k: usize,
    frame_id: FrameId,
    is_evictable: bool,
    /// History of the last seen K timestamps of the given frame.
    /// Least recent timestamp stored in front.
    history: VecDeque<usize>,
}

impl LRUKNode {
    fn new(frame_id: FrameId, k: usize) -> Self {
        LRUKNode { history: VecDeque::with_capacity(k), k, frame_id, is_evictable: false }
    }

    fn record_access(&mut self, timestamp: usize) {
        if self.history.len() == self.k {
            self.history.pop_front();
        }
        self.history.push_back(timestamp)
    }

    fn k_distance(&self, now: usize) -> KDistance {
        // the node is created together with its first recorded access, so
        // the history always has at least one element and unwrap here is
        // guaranteed to not panic.
        let oldest = *self.history.front().unwrap();
        if self.history.len() < self.k {
            return KDistance {
                frame_id: self.frame_id,
                distance: usize::MAX,
                oldest_access_at: oldest,
            };
        }
        KDistance { frame_id: self.frame_id, distance: now - oldest, oldest_access_at: oldest }
    }
}

/// LRUKReplacer implements the LRU-k replacement policy.
///
/// The LRU-k algorithm evicts a frame whose backward k-distance is maximum of
/// all frames. Backward k-distance is computed as the difference in time between
/// the current timestamp and the timestamp of the k-th previous access.
///
/// A frame with less than k history references is given +inf as its backward
/// k-distance. When multiple frames have +inf backward k-distance, the classical
/// LRU algorithm is used to choose a victim among them, based on the oldest
/// retained timestamp.
pub struct LRUKReplacer {
    nodes: HashMap<FrameId, LRUKNode>,
    current_timestamp: usize,
    current_size: usize,
    capacity: usize,
    k: usize,
}

impl LRUKReplacer {
    pub fn new(capacity: usize, k: usize) -> Self {
        assert!(capacity > 0, "replacer capacity should be larger than zero");
        assert!(k > 0, "replacer k should be larger than zero");
        LRUKReplacer { nodes: HashMap::new(), current_timestamp: 0, current_size: 0, capacity, k }
    }

    /// Record the event that the given frame id is accessed at current timestamp.
    /// Create a new entry for access history if frame id has not been seen before.
    pub fn record_access(&mut self, frame_id: FrameId) -> Result<()> {
        if frame_id > self.capacity {
            return Err(Error::InvalidFrame(frame_id));
        }
        let node = self.nodes.entry(frame_id).or_insert_with(|| LRUKNode::new(frame_id, self.k));
        node.record_access(self.current_timestamp);
        self.current_timestamp += 1;
        Ok(())
    }

    /// Find the frame with the largest backward k-distance and evict that frame.
    /// Only frames that are marked as evictable are candidates for eviction.
    ///
    /// A frame with less than k historical references is given +inf as its
    /// backward k-distance. If multiple frames have +inf backward k-distance,
    /// evict the frame whose retained history starts earliest.
    ///
    /// Successful eviction of a frame decrements the size of the replacer and
    /// removes the frame's access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no frames
    /// can be evicted.
    pub fn evict(&mut self) -> Option<FrameId> {
        let now = self.current_timestamp;
        let mut distances = vec![];
        for node in self.nodes.values() {
            if !node.is_evictable {
                continue;
            }
            distances.push(node.k_distance(now));
        }
        if distances.is_empty() {
            return None;
        }

        distances.sort();

        // we will always have at least one element here, it is
        // okay to use unwrap.
        let dist = distances.first().unwrap();
        let evicted = self.nodes.remove(&dist.frame_id).unwrap();
        self.current_size -= 1;
        trace!("evicted frame {}", evicted.frame_id);

        Some(evicted.frame_id)
    }

    /// Toggle whether a frame is evictable or non-evictable. This function also
    /// controls the replacer size. Note that size is equal to the number of
    /// evictable entries.
    ///
    /// If a frame was previously evictable and is to be set to non-evictable,
    /// then size should decrement. If a frame was previously non-evictable and
    /// is to be set evictable, then size should increment.
    ///
    /// For other scenarios, this function terminates without modifying anything.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let node = match self.nodes.get_mut(&frame_id) {
            Some(node) => node,
            None => return,
        };
        if node.is_evictable == evictable {
            return;
        }

        node.is_evictable = evictable;
        if evictable {
            self.current_size += 1;
        } else {
            self.current_size -= 1;
        }
    }

    /// Check if a frame is evictable. If the frame is not found, return true.
    pub fn is_evictable(&self, frame_id: FrameId) -> bool {
        match self.nodes.get(&frame_id) {
            Some(node) => node.is_evictable,
            None => true,
        }
    }

    /// Remove a frame from the replacer, along with its access history.
    /// This function also decrements the replacer size if removal is successful.
    ///
    /// Note that this is different from evicting a frame, which always removes
    /// the frame with the largest backward k-distance. This function removes the
    /// specified frame id, no matter what its backward k-distance is.
    ///
    /// If remove is called on a non-evictable frame, return an error. If the
    /// specified frame is not found, do nothing without returning any error.
    pub fn remove(&mut self, frame_id: FrameId) -> Result<()> {
        let node = match self.nodes.get(&frame_id) {
            Some(node) => node,
            None => return Ok(()),
        };
        if !node.is_evictable {
            return Err(Error::RemoveNonEvictable(frame_id));
        }
        self.nodes.remove(&frame_id);
        self.current_size -= 1;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.current_size
    }
}

/// SyncLRUKReplacer implements the thread-safe version of the LRU-k replacement
/// policy, basically all the heavy lifting happens in the LRUKReplacer.
pub struct SyncLRUKReplacer {
    inner: Mutex<LRUKReplacer>,
}

impl SyncLRUKReplacer {
    pub fn new(capacity: usize, k: usize) -> Self {
        let inner = Mutex::new(LRUKReplacer::new(capacity, k));
        SyncLRUKReplacer { inner }
    }
}

impl Replacer for SyncLRUKReplacer {
    fn record_access(&self, frame_id: FrameId) -> Result<()> {
        let mut guard = self.inner.lock()?;
        guard.record_access(frame_id)
    }

    fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock().unwrap();
        guard.evict()
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock().unwrap();
        guard.set_evictable(frame_id, evictable)
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.is_evictable(frame_id)
    }

    fn remove(&self, frame_id: FrameId) -> Result<()> {
        let mut guard = self.inner.lock()?;
        guard.remove(frame_id)
    }

    fn size(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.size()
    }
}
