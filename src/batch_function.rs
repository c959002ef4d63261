use async_trait::async_trait;

/// The outcome of loading a single key: a value, `None` if the resource has nothing for the key,
/// or an error scoped to that key alone.
pub type KeyResult<V> = anyhow::Result<Option<V>>;

/// The outcome of loading a whole batch.
///
/// `Err` fails every key of the batch with the same error. `Ok` must carry exactly one
/// [`KeyResult`] per requested key, in the same order as the keys were provided. A vector of any
/// other length is treated as a broken batch function and fails every key of the batch.
pub type FetchResult<V> = anyhow::Result<Vec<KeyResult<V>>>;

/// A `BatchFunction` defines the method through which some `Loader` may fetch
/// batched data from some resource. The `BatchFunction` receives a slice of keys
/// that have been accumulated during one batch window, and some user defined context struct.
///
/// Keys are unique within one call and arrive in first-request order. Unlike the loose
/// key-value contract of some dataloader implementations, the outcomes are positional: the n-th
/// entry of the returned vector answers the n-th key.
///
/// Multiple `BatchFunctions` (and therefore loaders) can share the same context (likely through an
/// `Arc`).
#[async_trait]
pub trait BatchFunction<K, V> {
    type Context;
    async fn load(keys: &[K], context: &Self::Context) -> FetchResult<V>;
}
