use std::sync::Arc;

use tracing::{debug, warn};

use super::cache::{CacheLookup, CacheTransport, ListingCache};
use super::domain::{Flat, HouseId, Role};
use super::store::{ListingStore, StoreError};

/// Cache-aside reader for house listings.
pub struct ListingReader<S, T> {
    store: Arc<S>,
    cache: ListingCache<T>,
}

impl<S, T> ListingReader<S, T>
where
    S: ListingStore + 'static,
    T: CacheTransport + 'static,
{
    pub fn new(store: Arc<S>, cache: ListingCache<T>) -> Self {
        Self { store, cache }
    }

    /// Serves from the cache when possible; otherwise reads the store and repopulates the
    /// partition. Cache failures degrade to a store read and never fail the call.
    pub async fn list_flats(&self, house_id: HouseId, role: Role) -> Result<Vec<Flat>, StoreError> {
        match self.cache.get(house_id, role).await {
            Ok(CacheLookup::Hit(flats)) => {
                debug!(house_id = %house_id, role = role.label(), "listing cache hit");
                return Ok(flats);
            }
            Ok(CacheLookup::Miss) => {
                debug!(house_id = %house_id, role = role.label(), "listing cache miss");
            }
            Err(err) => {
                warn!(
                    house_id = %house_id,
                    role = role.label(),
                    error = %err,
                    "listing cache read failed, falling back to store"
                );
            }
        }

        let flats = self.store.flats(house_id, role).await?;

        if let Err(err) = self
            .cache
            .put(&flats, house_id, role, self.cache.ttl())
            .await
        {
            warn!(
                house_id = %house_id,
                role = role.label(),
                error = %err,
                "failed to repopulate listing cache"
            );
        }

        Ok(flats)
    }
}
