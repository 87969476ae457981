//! Block Cache
//!
//! A capacity-bounded, thread-safe cache with least-recently-used eviction.
//! Capacity is measured in an abstract "charge" unit; the engine charges each
//! cached table block its length in bytes. One cache may be shared by several
//! databases through `Arc<Cache>` in `Options`.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;

/// Cache key: (table id, block offset).
pub type BlockKey = (u64, u64);

struct Entry {
    value: Bytes,
    charge: u64,
    /// Links into the recency list (younger = more recently used).
    prev: Option<BlockKey>,
    next: Option<BlockKey>,
}

struct Shard {
    map: HashMap<BlockKey, Entry>,
    /// Most recently used.
    head: Option<BlockKey>,
    /// Least recently used; evicted first.
    tail: Option<BlockKey>,
    usage: u64,
}

impl Shard {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            head: None,
            tail: None,
            usage: 0,
        }
    }

    fn unlink(&mut self, key: BlockKey) {
        let (prev, next) = {
            let e = &self.map[&key];
            (e.prev, e.next)
        };
        match prev {
            Some(p) => self.map.get_mut(&p).unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.map.get_mut(&n).unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, key: BlockKey) {
        let old_head = self.head;
        {
            let e = self.map.get_mut(&key).unwrap();
            e.prev = None;
            e.next = old_head;
        }
        if let Some(h) = old_head {
            self.map.get_mut(&h).unwrap().prev = Some(key);
        }
        self.head = Some(key);
        if self.tail.is_none() {
            self.tail = Some(key);
        }
    }

    fn evict_to(&mut self, capacity: u64) {
        while self.usage > capacity {
            let Some(victim) = self.tail else { break };
            self.unlink(victim);
            let e = self.map.remove(&victim).unwrap();
            self.usage -= e.charge;
        }
    }
}

/// Thread-safe LRU cache of table blocks.
pub struct Cache {
    capacity: u64,
    shard: Mutex<Shard>,
}

impl Cache {
    /// Create a cache holding up to `capacity` charge units.
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            shard: Mutex::new(Shard::new()),
        }
    }

    /// Insert `value` under `key` with the given charge, evicting older
    /// entries if the capacity is exceeded. Replaces any existing entry.
    pub fn insert(&self, key: BlockKey, value: Bytes, charge: u64) {
        let mut s = self.shard.lock();
        if s.map.contains_key(&key) {
            s.unlink(key);
            let old = s.map.remove(&key).unwrap();
            s.usage -= old.charge;
        }
        s.map.insert(
            key,
            Entry {
                value,
                charge,
                prev: None,
                next: None,
            },
        );
        s.usage += charge;
        s.push_front(key);
        let cap = self.capacity;
        s.evict_to(cap);
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&self, key: &BlockKey) -> Option<Bytes> {
        let mut s = self.shard.lock();
        if !s.map.contains_key(key) {
            return None;
        }
        s.unlink(*key);
        s.push_front(*key);
        Some(s.map[key].value.clone())
    }

    /// Drop the entry for `key`, if any.
    pub fn erase(&self, key: &BlockKey) {
        let mut s = self.shard.lock();
        if s.map.contains_key(key) {
            s.unlink(*key);
            let e = s.map.remove(key).unwrap();
            s.usage -= e.charge;
        }
    }

    /// Current total charge of all cached entries.
    pub fn usage(&self) -> u64 {
        self.shard.lock().usage
    }

    /// Configured capacity in charge units.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity)
            .field("usage", &self.usage())
            .finish()
    }
}
