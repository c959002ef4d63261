use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Batching parameters of a [`Loader`](crate::Loader).
///
/// Deserializes from `{"wait_ms": 1, "max_batch": 100}`; missing fields fall back to the
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// How long a batch stays open collecting keys before it is dispatched.
    #[serde(rename = "wait_ms", with = "millis")]
    pub wait: Duration,
    /// Number of keys that dispatches a batch early. 0 means no limit.
    pub max_batch: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { wait: Duration::from_millis(1), max_batch: 100 }
    }
}

impl LoaderConfig {
    #[must_use]
    pub fn wait(self, wait: Duration) -> Self {
        Self { wait, ..self }
    }

    #[must_use]
    pub fn max_batch(self, max_batch: usize) -> Self {
        Self { max_batch, ..self }
    }

    /// Whether a batch holding `len` keys has to be dispatched without waiting for its timer.
    pub(crate) fn is_full(&self, len: usize) -> bool {
        self.max_batch != 0 && len >= self.max_batch
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(wait: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(wait.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let config: LoaderConfig = serde_json::from_str(r#"{"wait_ms": 10}"#).unwrap();
        assert_eq!(config, LoaderConfig { wait: Duration::from_millis(10), max_batch: 100 });

        let config: LoaderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LoaderConfig::default());
    }

    #[test]
    fn serializes_wait_as_millis() {
        let config = LoaderConfig::default().wait(Duration::from_millis(25)).max_batch(0);
        assert_eq!(
            serde_json::to_value(config).unwrap(),
            serde_json::json!({"wait_ms": 25, "max_batch": 0})
        );
    }

    #[test]
    fn zero_max_batch_is_unbounded() {
        let config = LoaderConfig::default().max_batch(0);
        assert!(!config.is_full(usize::MAX));

        let config = LoaderConfig::default().max_batch(2);
        assert!(!config.is_full(1));
        assert!(config.is_full(2));
    }
}
