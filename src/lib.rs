mod batch;
mod batch_function;
mod cache;
mod config;
mod error;
mod loader;
#[cfg(feature = "stats")]
mod loader_stats;
pub mod people;

pub use batch_function::{BatchFunction, FetchResult, KeyResult};
pub use config::LoaderConfig;
pub use error::LoadError;
pub use loader::{LoadResult, Loader, Thunk};
#[cfg(feature = "stats")]
pub use loader_stats::LoaderStats;
