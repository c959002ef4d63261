use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Storage behind a `Loader`. Only ever touched while the loader lock is held.
pub trait Cache {
    type K;
    type V;

    fn get(&self, key: &Self::K) -> Option<&Self::V>;

    fn insert(&mut self, key: Self::K, value: Self::V);

    /// Inserts the value only if the key is absent. Returns whether the cache changed.
    fn insert_if_absent(&mut self, key: Self::K, value: Self::V) -> bool;

    /// Like [`Cache::insert_if_absent`] for many pairs; returns how many were inserted.
    fn insert_many_if_absent<I: IntoIterator<Item = (Self::K, Self::V)>>(
        &mut self,
        key_vals: I,
    ) -> usize {
        let mut inserted = 0;
        for (key, value) in key_vals.into_iter() {
            if self.insert_if_absent(key, value) {
                inserted += 1;
            }
        }
        inserted
    }

    fn remove(&mut self, keys: &[Self::K]);
    fn flush(&mut self);
}

impl<K, V, S: BuildHasher> Cache for HashMap<K, V, S>
where
    K: Eq + Hash,
{
    type K = K;
    type V = V;

    fn get(&self, key: &Self::K) -> Option<&Self::V> {
        HashMap::get(self, key)
    }

    fn insert(&mut self, key: Self::K, value: Self::V) {
        HashMap::insert(self, key, value);
    }

    fn insert_if_absent(&mut self, key: Self::K, value: Self::V) -> bool {
        match self.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    fn remove(&mut self, keys: &[Self::K]) {
        for key in keys.iter() {
            HashMap::remove(self, key);
        }
    }

    fn flush(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_if_absent_keeps_existing_value() {
        let mut cache = HashMap::new();
        assert!(Cache::insert_if_absent(&mut cache, "luke", 1));
        assert!(!Cache::insert_if_absent(&mut cache, "luke", 2));
        assert_eq!(Cache::get(&cache, &"luke"), Some(&1));
    }

    #[test]
    fn insert_many_if_absent_counts_insertions() {
        let mut cache = HashMap::new();
        Cache::insert(&mut cache, "leia", 0);
        let inserted =
            Cache::insert_many_if_absent(&mut cache, vec![("luke", 1), ("leia", 2), ("han", 3)]);
        assert_eq!(inserted, 2);
        assert_eq!(Cache::get(&cache, &"leia"), Some(&0));
    }

    #[test]
    fn remove_and_flush() {
        let mut cache = HashMap::new();
        Cache::insert(&mut cache, "luke", 1);
        Cache::insert(&mut cache, "leia", 2);
        Cache::insert(&mut cache, "han", 3);

        Cache::remove(&mut cache, &["luke", "yoda"]);
        assert_eq!(Cache::get(&cache, &"luke"), None);
        assert_eq!(Cache::get(&cache, &"leia"), Some(&2));

        Cache::flush(&mut cache);
        assert!(cache.is_empty());
    }
}
