/// Counters describing how well a `Loader` batched and cached its requests.
///
/// Kept under the loader lock and updated in the same critical sections as the cache, so a
/// snapshot is always internally consistent.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoaderStats {
    /// Number of keys that went through `load_thunk` (not necessarily unique).
    pub keys_requested: u32,
    /// The number of keys that were immediately found in the loader cache.
    pub cache_hits: u32,
    /// Keys that joined a batch already holding the same key.
    pub keys_coalesced: u32,
    /// Number of batches handed to the batch function.
    pub batches_dispatched: u32,
    /// Batches dispatched because they reached `max_batch`.
    pub closed_by_size: u32,
    /// Batches dispatched because their wait elapsed.
    pub closed_by_timer: u32,
    /// The average number of unique keys per dispatched batch.
    pub average_batch_size: f32,
    /// The max number of unique keys fetched during a single batch.
    pub max_batch_size: u32,
    /// The min number of unique keys fetched during a single batch.
    pub min_batch_size: u32,
    /// Values written into the cache after a successful load.
    pub values_cached: u32,
}

impl LoaderStats {
    pub(crate) fn record_request(&mut self, cache_hit: bool) {
        self.keys_requested += 1;
        if cache_hit {
            self.cache_hits += 1;
        }
    }

    /// `appended` is false when the key reused a slot of the open batch.
    pub(crate) fn record_registration(&mut self, appended: bool) {
        if !appended {
            self.keys_coalesced += 1;
        }
    }

    pub(crate) fn record_dispatch(&mut self, batch_size: u32, by_size: bool) {
        if by_size {
            self.closed_by_size += 1;
        } else {
            self.closed_by_timer += 1;
        }

        let new_total = self.batches_dispatched + 1;
        self.average_batch_size = (((self.average_batch_size as f64
            * self.batches_dispatched as f64)
            + batch_size as f64)
            / new_total as f64) as f32;
        if self.batches_dispatched == 0 || batch_size < self.min_batch_size {
            self.min_batch_size = batch_size;
        }
        if batch_size > self.max_batch_size {
            self.max_batch_size = batch_size;
        }
        self.batches_dispatched = new_total;
    }

    pub(crate) fn record_cached(&mut self) {
        self.values_cached += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_sizes_are_tracked() {
        let mut stats = LoaderStats::default();
        stats.record_dispatch(4, true);
        stats.record_dispatch(2, false);
        stats.record_dispatch(6, false);

        assert_eq!(stats.batches_dispatched, 3);
        assert_eq!(stats.closed_by_size, 1);
        assert_eq!(stats.closed_by_timer, 2);
        assert_eq!(stats.min_batch_size, 2);
        assert_eq!(stats.max_batch_size, 6);
        assert!((stats.average_batch_size - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn requests_and_hits() {
        let mut stats = LoaderStats::default();
        stats.record_request(false);
        stats.record_request(true);
        stats.record_registration(true);
        stats.record_registration(false);
        assert_eq!((stats.keys_requested, stats.cache_hits, stats.keys_coalesced), (2, 1, 1));
    }
}
