use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;

use crate::{
    batch::{Batch, Fetch},
    batch_function::{BatchFunction, FetchResult},
    cache::Cache,
    config::LoaderConfig,
    error::LoadError,
};
#[cfg(feature = "stats")]
use crate::loader_stats::LoaderStats;

/// What a caller receives for one key: the value, `None` if the batch function had nothing for
/// the key, or the error that prevented loading it.
pub type LoadResult<V> = Result<Option<V>, LoadError>;

/// The deferred half of [`Loader::load_thunk`]. The key is already registered; awaiting only
/// waits for its batch.
pub type Thunk<V> = BoxFuture<'static, LoadResult<V>>;

/// Batch loads values from some expensive resource, primarily intended for mitigating GraphQL's
/// N+1 problem.
///
/// Users can call [`Loader::load`] and [`Loader::load_all`] to fetch values from the underlying
/// resource or cache. The cache can be cleared with calls to [`Loader::clear`] and
/// [`Loader::clear_many`], and values can be added to the cache out-of-band through the use of
/// [`Loader::prime`] and [`Loader::prime_many`].
///
/// Keys requested while no batch is open start a new batch and its timer. Every key requested
/// within the next `wait` joins that batch, unless the batch reaches `max_batch` keys first, in
/// which case it is dispatched right away and the following key starts a fresh batch. Each batch
/// invokes the batch function exactly once, on its own task, and its results are handed to every
/// caller that registered a key in it. Successful results are cached for the lifetime of the
/// loader; failures are not, so the next request for a failed key fetches it again.
///
/// The cache is unbounded. A `Loader` is meant to live as long as one logical request and be
/// dropped with it.
///
/// All of this requires a tokio runtime: batch timers and dispatches are spawned tasks.
pub struct Loader<K, V> {
    inner: Arc<LoaderInner<K, V>>,
}

impl<K, V> Clone for Loader<K, V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct LoaderInner<K, V> {
    state: Mutex<LoaderState<K, V>>,
    fetch: Fetch<K, V>,
    config: LoaderConfig,
    debug_name: &'static str,
}

/// Everything guarded by the loader lock.
struct LoaderState<K, V> {
    cache: HashMap<K, Option<V>>,
    /// The batch currently accepting keys, if any.
    open: Option<Batch<K, V>>,
    last_batch_id: u64,
    #[cfg(feature = "stats")]
    stats: LoaderStats,
}

#[cfg(feature = "stats")]
impl<K, V> Drop for LoaderState<K, V> {
    fn drop(&mut self) {
        tracing::debug!(loader_stats = ?self.stats);
    }
}

impl<K, V> Loader<K, V>
where
    K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    V: 'static + Clone + Debug + Send + Sync,
{
    /// Creates a new Loader for the provided BatchFunction and Context type.
    ///
    /// Note: the batch function is passed in as a marker for type inference.
    pub fn new<F, ContextT>(_: F, context: ContextT, config: LoaderConfig) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    {
        let context = Arc::new(context);
        Self::with_fetch(
            config,
            Arc::new(move |keys: Vec<K>| {
                let context = Arc::clone(&context);
                async move { F::load(&keys, &context).await }.boxed()
            }),
        )
    }

    /// Creates a new Loader around a plain async function taking the keys of one batch.
    pub fn from_fn<Func, Fut>(config: LoaderConfig, fetch: Func) -> Self
    where
        Func: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<V>> + Send + 'static,
    {
        Self::with_fetch(config, Arc::new(move |keys: Vec<K>| fetch(keys).boxed()))
    }

    fn with_fetch(config: LoaderConfig, fetch: Fetch<K, V>) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                state: Mutex::new(LoaderState {
                    cache: HashMap::new(),
                    open: None,
                    last_batch_id: 0,
                    #[cfg(feature = "stats")]
                    stats: LoaderStats::default(),
                }),
                fetch,
                config,
                debug_name: std::any::type_name::<(K, V)>(),
            }),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Loads a value from the underlying resource.
    ///
    /// Returns `Ok(None)` if the BatchFunction resolved the key without a value.
    ///
    /// If the value is already in the loader cache, it is returned immediately. Otherwise, the
    /// requested key joins the open batch and this call completes once that batch is dispatched.
    pub async fn load(&self, key: K) -> LoadResult<V> {
        self.load_thunk(key).await
    }

    /// Registers `key` in the open batch (or answers it from the cache) before returning, and
    /// leaves the waiting to the returned future.
    ///
    /// Use this to register interest in many keys, possibly across several loaders, without
    /// waiting for each of them in turn.
    #[tracing::instrument(skip(self), fields(kv = self.inner.debug_name))]
    pub fn load_thunk(&self, key: K) -> Thunk<V> {
        let (pos, done, fresh_batch, full_batch) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            if let Some(value) = Cache::get(&state.cache, &key).cloned() {
                #[cfg(feature = "stats")]
                state.stats.record_request(true);
                tracing::trace!("cache hit");
                return future::ready(Ok(value)).boxed();
            }
            #[cfg(feature = "stats")]
            state.stats.record_request(false);

            let fresh = state.open.is_none();
            if fresh {
                state.last_batch_id += 1;
            }
            let batch_id = state.last_batch_id;
            let batch = state.open.get_or_insert_with(|| Batch::new(batch_id));

            let (pos, appended) = batch.key_index(key.clone());
            let full = appended && self.inner.config.is_full(batch.len());
            let done = batch.completion();
            tracing::trace!(batch = batch_id, pos, appended, "key registered");

            #[cfg(feature = "stats")]
            state.stats.record_registration(appended);

            let full_batch = if full { state.detach(batch_id, true) } else { None };
            (pos, done, fresh.then_some(batch_id), full_batch)
        };

        if let Some(batch_id) = fresh_batch {
            self.inner.spawn_timer(batch_id);
        }
        if let Some(batch) = full_batch {
            self.inner.spawn_dispatch(batch);
        }

        let inner = Arc::clone(&self.inner);
        async move {
            let resolved = done.await.map_err(|_| {
                tracing::error!(?key, "batch dropped before delivering results");
                LoadError::Abandoned
            })?;
            let result = resolved.get(pos);
            if let Ok(value) = &result {
                inner.cache_value(key, value.clone());
            }
            result
        }
        .boxed()
    }

    /// Loads many values at once, preserving the order of `keys` in the output.
    ///
    /// Keys are split across batches according to the loader configuration; cached keys are
    /// answered without joining any batch.
    pub async fn load_all(&self, keys: Vec<K>) -> Vec<LoadResult<V>> {
        self.load_all_thunk(keys).await
    }

    /// Registers every key before returning; the returned future waits for all of them.
    pub fn load_all_thunk(&self, keys: Vec<K>) -> BoxFuture<'static, Vec<LoadResult<V>>> {
        let thunks = keys.into_iter().map(|key| self.load_thunk(key)).collect::<Vec<_>>();
        future::join_all(thunks).boxed()
    }

    /// Adds a value to the cache unless the key is already cached.
    ///
    /// Returns whether the value was inserted. To overwrite a cached value, [`Loader::clear`]
    /// the key first.
    pub fn prime(&self, key: K, value: V) -> bool {
        let mut state = self.inner.state.lock();
        Cache::insert_if_absent(&mut state.cache, key, Some(value))
    }

    /// Primes many values at once; returns how many were inserted.
    pub fn prime_many(&self, key_vals: Vec<(K, V)>) -> usize {
        let mut state = self.inner.state.lock();
        Cache::insert_many_if_absent(
            &mut state.cache,
            key_vals.into_iter().map(|(key, value)| (key, Some(value))),
        )
    }

    /// Removes a value from the cache.
    ///
    /// This key will be reloaded when it is next requested.
    pub fn clear(&self, key: K) {
        self.clear_many(std::slice::from_ref(&key));
    }

    /// Removes multiple values from the cache at once.
    pub fn clear_many(&self, keys: &[K]) {
        let mut state = self.inner.state.lock();
        Cache::remove(&mut state.cache, keys);
    }

    /// Empties the cache.
    pub fn clear_all(&self) {
        let mut state = self.inner.state.lock();
        Cache::flush(&mut state.cache);
    }

    /// A snapshot of the loader statistics.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> LoaderStats {
        self.inner.state.lock().stats.clone()
    }
}

impl<K, V> LoaderState<K, V>
where
    K: 'static + Eq + Debug + Send,
    V: 'static + Clone + Send + Sync,
{
    /// Takes batch `batch_id` out of the loader and closes it, unless another path already did.
    fn detach(&mut self, batch_id: u64, by_size: bool) -> Option<Batch<K, V>> {
        if self.open.as_ref().map(Batch::id) != Some(batch_id) {
            return None;
        }
        let mut batch = self.open.take()?;
        batch.close();
        tracing::debug!(batch = batch_id, keys = batch.len(), by_size, "batch closed");
        #[cfg(feature = "stats")]
        self.stats.record_dispatch(batch.len() as u32, by_size);
        Some(batch)
    }
}

impl<K, V> LoaderInner<K, V>
where
    K: 'static + Eq + Hash + Debug + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    fn spawn_timer(self: &Arc<Self>, batch_id: u64) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(inner.config.wait).await;
            let batch = inner.state.lock().detach(batch_id, false);
            match batch {
                Some(batch) => inner.spawn_dispatch(batch),
                None => tracing::trace!(batch = batch_id, "batch already dispatched by size"),
            }
        });
    }

    fn spawn_dispatch(&self, batch: Batch<K, V>) {
        tokio::spawn(batch.dispatch(Arc::clone(&self.fetch), self.debug_name));
    }

    fn cache_value(&self, key: K, value: Option<V>) {
        let mut state = self.state.lock();
        Cache::insert(&mut state.cache, key, value);
        #[cfg(feature = "stats")]
        state.stats.record_cached();
    }
}
