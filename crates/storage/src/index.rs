//! Chained hash map keyed by string
//!
//! Keys are hashed by folding 3-byte chunks into base-256 numbers and
//! summing the chunks. Capacity doubles once the load factor passes 0.75.

use crate::error::StorageError;
use crate::Result;

const INITIAL_CAPACITY: usize = 8;
const MAX_LOAD_FACTOR: f64 = 0.75;
const CHUNK_SIZE: usize = 3;

/// Hash a key into `[0, capacity)`
pub fn chunk_hash(key: &str, capacity: usize) -> usize {
    let sum = key.as_bytes().chunks(CHUNK_SIZE).fold(0u64, |sum, chunk| {
        let value = chunk
            .iter()
            .fold(0u64, |acc, &byte| acc * 256 + u64::from(byte));
        sum.wrapping_add(value)
    });
    (sum % capacity.max(1) as u64) as usize
}

#[derive(Debug, Clone)]
pub struct HashIndex<V> {
    buckets: Vec<Vec<(String, V)>>,
    len: usize,
}

impl<V> HashIndex<V> {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut buckets = Vec::with_capacity(capacity);
        buckets.resize_with(capacity, Vec::new);
        Self { buckets, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Insert or replace; returns the previous value for `key`
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        let slot = chunk_hash(&key, self.capacity());
        if let Some(entry) = self.buckets[slot].iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut entry.1, value));
        }

        if self.len as f64 / self.capacity() as f64 > MAX_LOAD_FACTOR {
            self.grow();
        }

        let slot = chunk_hash(&key, self.capacity());
        self.buckets[slot].push((key, value));
        self.len += 1;
        None
    }

    /// Look up `key`, failing with [`StorageError::NotFound`] when absent
    pub fn get(&self, key: &str) -> Result<&V> {
        let slot = chunk_hash(key, self.capacity());
        self.buckets[slot]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let slot = chunk_hash(key, self.capacity());
        let bucket = &mut self.buckets[slot];
        let pos = bucket.iter().position(|(k, _)| k == key)?;
        self.len -= 1;
        Some(bucket.swap_remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn grow(&mut self) {
        let new_capacity = self.capacity() * 2;
        let old = std::mem::take(&mut self.buckets);
        self.buckets.resize_with(new_capacity, Vec::new);
        for (key, value) in old.into_iter().flatten() {
            let slot = chunk_hash(&key, new_capacity);
            self.buckets[slot].push((key, value));
        }
        tracing::debug!(capacity = new_capacity, entries = self.len, "Index resized");
    }
}

impl<V> Default for HashIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_chunk_hash() {
        // "abcd" -> chunks "abc" and "d"
        let abc = (97u64 * 256 + 98) * 256 + 99;
        let expected = ((abc + 100) % 8) as usize;
        assert_eq!(chunk_hash("abcd", 8), expected);
        assert_eq!(chunk_hash("", 8), 0);
    }

    #[test]
    fn test_insert_get_replace_remove() {
        let mut index = HashIndex::new();
        assert!(index.insert("user", 1).is_none());
        assert_eq!(index.insert("user", 2), Some(1));
        assert_eq!(*index.get("user").unwrap(), 2);
        assert_eq!(index.len(), 1);

        assert_matches!(index.get("order"), Err(StorageError::NotFound(k)) if k == "order");

        assert_eq!(index.remove("user"), Some(2));
        assert!(index.is_empty());
        assert!(index.remove("user").is_none());
    }

    #[test]
    fn test_resize_keeps_entries() {
        let mut index = HashIndex::new();
        for i in 0..7 {
            index.insert(format!("table_{}", i), i);
        }
        assert_eq!(index.capacity(), 8);

        index.insert("table_7", 7);
        assert_eq!(index.capacity(), 16);

        for i in 0..40 {
            index.insert(format!("table_{}", i), i);
        }
        assert_eq!(index.len(), 40);
        for i in 0..40 {
            assert_eq!(*index.get(&format!("table_{}", i)).unwrap(), i);
        }
        assert!(index.len() as f64 / index.capacity() as f64 <= 1.0);
        assert_eq!(index.iter().count(), 40);
    }
}
