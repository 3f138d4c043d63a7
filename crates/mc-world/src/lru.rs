//! Bounded least-recently-used map with an eviction hook.
//!
//! The hook receives ownership of every entry that leaves the map for any
//! reason other than an explicit [`LruMap::remove`], and it returns before
//! the entry is dropped. This includes capacity evictions, [`LruMap::clear`]
//! and dropping the map itself.

use core::hash::Hash;

use rustc_hash::FxHashMap;

/// Hook run for every evicted entry.
pub type EvictHook<K, V> = Box<dyn FnMut(K, V) + Send>;

struct Slot<V> {
    value: V,
    last_used: u64,
}

/// A bounded map that evicts its least recently used entry.
pub struct LruMap<K, V> {
    entries: FxHashMap<K, Slot<V>>,
    capacity: usize,
    clock: u64,
    on_evict: EvictHook<K, V>,
}

impl<K: Hash + Eq + Clone, V> LruMap<K, V> {
    /// Create a map holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize, on_evict: impl FnMut(K, V) + Send + 'static) -> Self {
        Self {
            entries: FxHashMap::default(),
            capacity: capacity.max(1),
            clock: 0,
            on_evict: Box::new(on_evict),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Look up an entry and mark it most recently used.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let now = self.tick();
        let slot = self.entries.get_mut(key)?;
        slot.last_used = now;
        Some(&mut slot.value)
    }

    /// Insert an entry, evicting the least recently used one if full.
    ///
    /// Replacing an existing key hands the old value to the hook.
    pub fn insert(&mut self, key: K, value: V) {
        let now = self.tick();
        if let Some(old) = self.entries.remove(&key) {
            (self.on_evict)(key.clone(), old.value);
        } else if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            Slot {
                value,
                last_used: now,
            },
        );
    }

    /// Return the entry for `key`, creating it with `make` on a miss.
    ///
    /// A failing `make` leaves the map untouched.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: &K,
        make: impl FnOnce() -> Result<V, E>,
    ) -> Result<&mut V, E> {
        let now = self.tick();
        if !self.entries.contains_key(key) {
            let value = make()?;
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
            self.entries.insert(
                key.clone(),
                Slot {
                    value,
                    last_used: now,
                },
            );
        }
        match self.entries.get_mut(key) {
            Some(slot) => {
                slot.last_used = now;
                Ok(&mut slot.value)
            }
            None => unreachable!("entry was inserted above"),
        }
    }

    /// Take an entry out without running the hook.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|slot| slot.value)
    }

    /// Remove every entry for which `keep` returns `false`, running the hook.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        let doomed: Vec<K> = self
            .entries
            .keys()
            .filter(|key| !keep(*key))
            .cloned()
            .collect();
        for key in doomed {
            if let Some(slot) = self.entries.remove(&key) {
                (self.on_evict)(key, slot.value);
            }
        }
    }

    /// Evict everything, running the hook for each entry.
    pub fn clear(&mut self) {
        for (key, slot) in self.entries.drain() {
            (self.on_evict)(key, slot.value);
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            if let Some(slot) = self.entries.remove(&key) {
                (self.on_evict)(key, slot.value);
            }
        }
    }
}

impl<K, V> Drop for LruMap<K, V> {
    fn drop(&mut self) {
        for (key, slot) in self.entries.drain() {
            (self.on_evict)(key, slot.value);
        }
    }
}
