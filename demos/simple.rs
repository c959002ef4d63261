use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use batchload_rs::{BatchFunction, FetchResult, Loader, LoaderConfig};
use tracing_subscriber::EnvFilter;

// Empty functor that implements the BatchFunction trait. For this example, it
// trivially loads values from some HashMap.
struct MyBatchFn;

#[async_trait]
impl BatchFunction<i64, String> for MyBatchFn {
    type Context = HashMap<i64, String>;

    async fn load(keys: &[i64], context: &Self::Context) -> FetchResult<String> {
        tracing::info!(?keys, "batch");
        Ok(keys.iter().map(|k| Ok(context.get(k).cloned())).collect())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut context = HashMap::new();
    context.insert(2001, "a space odyssey".to_owned());
    context.insert(7, "samurai".to_owned());
    context.insert(12, "angry men".to_owned());

    let config = LoaderConfig::default().wait(Duration::from_millis(5)).max_batch(2);
    let loader = Loader::new(MyBatchFn {}, context, config);

    assert_eq!(loader.load(7).await.unwrap().as_deref(), Some("samurai"));
    assert_eq!(loader.load(15).await.unwrap(), None);

    // Three misses with max_batch = 2: one batch dispatched immediately, one after the wait.
    assert_eq!(
        loader
            .load_all(vec![12, 2010, 2001])
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .collect::<Vec<_>>(),
        vec![Some("angry men".to_owned()), None, Some("a space odyssey".to_owned())]
    );

    // Primed values never reach the batch function.
    assert!(loader.prime(1954, "seven samurai".to_owned()));
    assert_eq!(loader.load(1954).await.unwrap().as_deref(), Some("seven samurai"));
}
