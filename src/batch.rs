use std::fmt::Debug;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::{span, Level};
use tracing_futures::Instrument;

use crate::{
    batch_function::{FetchResult, KeyResult},
    error::LoadError,
    LoadResult,
};

/// Type-erased batch function: owns everything it needs except the keys of one batch.
pub(crate) type Fetch<K, V> = Arc<dyn Fn(Vec<K>) -> BoxFuture<'static, FetchResult<V>> + Send + Sync>;

/// Resolves once, when the batch's results are available. Every caller registered on the batch
/// holds a clone.
pub(crate) type Completion<V> = Shared<oneshot::Receiver<Arc<Resolved<V>>>>;

/// Lifecycle of a [`Batch`].
///
/// A batch is `Open` while it sits in the loader as the batch accepting new keys. Closing
/// detaches it from the loader, so `Closing`, `Dispatched` and `Completed` are only ever observed
/// by the task that dispatches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BatchState {
    Open,
    Closing,
    Dispatched,
    Completed,
}

impl BatchState {
    /// The only state this one may move to.
    pub fn next(self) -> Option<BatchState> {
        match self {
            BatchState::Open => Some(BatchState::Closing),
            BatchState::Closing => Some(BatchState::Dispatched),
            BatchState::Dispatched => Some(BatchState::Completed),
            BatchState::Completed => None,
        }
    }
}

/// Keys accumulated during one batch window, plus the means to hand their results back to the
/// waiting callers.
pub(crate) struct Batch<K, V> {
    id: u64,
    keys: Vec<K>,
    state: BatchState,
    done_tx: oneshot::Sender<Arc<Resolved<V>>>,
    done: Completion<V>,
}

impl<K, V> Batch<K, V>
where
    K: 'static + Eq + Debug + Send,
    V: 'static + Send + Sync + Clone,
{
    pub fn new(id: u64) -> Self {
        let (done_tx, done_rx) = oneshot::channel();
        Self { id, keys: Vec::new(), state: BatchState::Open, done_tx, done: done_rx.shared() }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[cfg(test)]
    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn completion(&self) -> Completion<V> {
        self.done.clone()
    }

    /// Returns the slot of `key` in this batch, appending it if it is not there yet. The second
    /// element tells whether the key was appended.
    pub fn key_index(&mut self, key: K) -> (usize, bool) {
        debug_assert_eq!(self.state, BatchState::Open, "keys added to a closed batch");
        match self.keys.iter().position(|existing| *existing == key) {
            Some(pos) => (pos, false),
            None => {
                self.keys.push(key);
                (self.keys.len() - 1, true)
            }
        }
    }

    /// Stops the batch from accepting keys. Callers must already have detached it from the
    /// loader.
    pub fn close(&mut self) {
        self.advance(BatchState::Closing);
    }

    /// Runs the batch function over the accumulated keys and wakes every waiting caller.
    pub async fn dispatch(mut self, fetch: Fetch<K, V>, debug_name: &'static str) {
        let span = span!(Level::DEBUG, "BatchDispatch", kv = debug_name, batch = self.id);
        async move {
            let keys = std::mem::take(&mut self.keys);
            let key_count = keys.len();
            tracing::debug!(?keys, "fetching batch");

            let fetched = fetch(keys).await;
            self.advance(BatchState::Dispatched);

            let resolved = Resolved::from_fetch(key_count, fetched);
            tracing::debug!(key_count, failed = resolved.failed(), "batch resolved");

            self.advance(BatchState::Completed);
            if self.done_tx.send(Arc::new(resolved)).is_err() {
                tracing::trace!("no caller is waiting on this batch anymore");
            }
        }
        .instrument(span)
        .await
    }

    fn advance(&mut self, next: BatchState) {
        debug_assert_eq!(
            self.state.next(),
            Some(next),
            "illegal batch transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(batch = self.id, from = ?self.state, to = ?next, "batch transition");
        self.state = next;
    }
}

/// Per-key outcomes of one dispatched batch, indexed by slot.
#[derive(Debug)]
pub(crate) struct Resolved<V> {
    outcomes: Vec<LoadResult<V>>,
}

impl<V: Clone> Resolved<V> {
    /// Normalizes whatever the batch function returned into exactly `key_count` outcomes.
    pub fn from_fetch(key_count: usize, fetched: FetchResult<V>) -> Self {
        let outcomes = match fetched {
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), key_count, "batch fetch failed");
                vec![Err(LoadError::fetch(error)); key_count]
            }
            Ok(results) if results.len() != key_count => {
                tracing::error!(
                    expected = key_count,
                    got = results.len(),
                    "batch function broke the one-result-per-key contract"
                );
                let error = LoadError::ContractViolation { expected: key_count, got: results.len() };
                vec![Err(error); key_count]
            }
            Ok(results) => results.into_iter().map(Self::key_outcome).collect(),
        };
        Self { outcomes }
    }

    fn key_outcome(result: KeyResult<V>) -> LoadResult<V> {
        result.map_err(LoadError::key)
    }

    pub fn get(&self, pos: usize) -> LoadResult<V> {
        self.outcomes.get(pos).cloned().unwrap_or_else(|| {
            Err(LoadError::ContractViolation { expected: pos + 1, got: self.outcomes.len() })
        })
    }

    fn failed(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_err()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_only_moves_forward() {
        let mut state = BatchState::Open;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            state = next;
            visited.push(state);
        }
        assert_eq!(
            visited,
            vec![
                BatchState::Open,
                BatchState::Closing,
                BatchState::Dispatched,
                BatchState::Completed
            ]
        );
    }

    #[test]
    fn key_index_reuses_slots() {
        let mut batch = Batch::<&'static str, u32>::new(7);
        assert_eq!(batch.key_index("a"), (0, true));
        assert_eq!(batch.key_index("b"), (1, true));
        assert_eq!(batch.key_index("a"), (0, false));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.id(), 7);
        assert_eq!(batch.state(), BatchState::Open);
    }

    #[test]
    fn uniform_error_applies_to_every_key() {
        let resolved = Resolved::<u32>::from_fetch(3, Err(anyhow::anyhow!("timeout")));
        for pos in 0..3 {
            match resolved.get(pos) {
                Err(LoadError::Fetch(error)) => assert_eq!(error.to_string(), "timeout"),
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[test]
    fn per_key_outcomes_are_positional() {
        let resolved = Resolved::from_fetch(
            3,
            Ok(vec![Ok(Some(1)), Err(anyhow::anyhow!("not found upstream")), Ok(None)]),
        );
        assert_eq!(resolved.get(0).unwrap(), Some(1));
        assert!(matches!(resolved.get(1), Err(LoadError::Key(_))));
        assert_eq!(resolved.get(2).unwrap(), None);
        assert_eq!(resolved.failed(), 1);
    }

    #[test]
    fn wrong_result_count_fails_every_key() {
        let resolved = Resolved::<u32>::from_fetch(2, Ok(vec![Ok(Some(1))]));
        for pos in 0..2 {
            assert!(matches!(
                resolved.get(pos),
                Err(LoadError::ContractViolation { expected: 2, got: 1 })
            ));
        }
    }

    #[test]
    fn empty_success_is_valid_for_empty_batch() {
        let resolved = Resolved::<u32>::from_fetch(0, Ok(vec![]));
        assert_eq!(resolved.failed(), 0);
    }

    #[tokio::test]
    async fn dispatch_wakes_waiters_with_results() {
        let fetch: Fetch<&'static str, String> = Arc::new(|keys: Vec<&'static str>| {
            async move {
                let fetched: FetchResult<String> =
                    Ok(keys.into_iter().map(|k| Ok(Some(k.to_uppercase()))).collect());
                fetched
            }
            .boxed()
        });

        let mut batch = Batch::new(1);
        let (pos, _) = batch.key_index("luke");
        batch.key_index("leia");
        let done = batch.completion();
        batch.close();

        tokio::spawn(batch.dispatch(fetch, "test"));
        let resolved = done.await.unwrap();
        assert_eq!(resolved.get(pos).unwrap(), Some("LUKE".to_owned()));
        assert_eq!(resolved.get(1).unwrap(), Some("LEIA".to_owned()));
    }

    #[tokio::test]
    async fn dropped_batch_closes_completion() {
        let batch = Batch::<u32, u32>::new(1);
        let done = batch.completion();
        drop(batch);
        assert!(done.await.is_err());
    }
}
