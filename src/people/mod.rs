//! The people lookups served to the GraphQL resolvers, backed by the Star Wars REST API.

mod model;
mod search;

use std::sync::Arc;

pub use model::{People, PeopleResults};
pub use search::{PeopleSearch, SearchClient, SwapiConfig};

use crate::{config::LoaderConfig, loader::Loader};

/// The loaders of one external request.
///
/// Built fresh for every request and handed to the resolvers explicitly, so caches never outlive
/// the request that filled them.
#[derive(Clone)]
pub struct Loaders {
    client: SearchClient,
    pub people_by_name: Loader<String, Arc<People>>,
}

impl Loaders {
    pub fn new(client: SearchClient, config: LoaderConfig) -> Self {
        Self { people_by_name: Loader::new(PeopleSearch, client.clone(), config), client }
    }

    /// Lists one page of people and primes `people_by_name` with every person on it, so that
    /// resolving any of them by name afterwards needs no request.
    pub async fn list_people(&self, page: Option<u32>) -> anyhow::Result<Vec<Arc<People>>> {
        let peoples =
            self.client.list_page(page).await?.into_iter().map(Arc::new).collect::<Vec<_>>();
        let primed = self.people_by_name.prime_many(
            peoples.iter().map(|people| (people.name.clone(), Arc::clone(people))).collect(),
        );
        tracing::debug!(listed = peoples.len(), primed, "primed people_by_name from listing");
        Ok(peoples)
    }
}
