use std::sync::Arc;

use super::cache::{CacheTransport, ListingCache};
use super::domain::{Flat, House, HouseId, NewFlat, NewHouse, Role, StatusChange, ValidationError};
use super::moderation::ModerationWorkflow;
use super::read_path::ListingReader;
use super::store::{Entity, ListingStore, StoreError};
use super::transition::ModerationOutcome;

/// Service composing the cache-aside reader and the moderation workflow over one store
/// and one cache.
pub struct ListingService<S, T> {
    reader: ListingReader<S, T>,
    workflow: ModerationWorkflow<S, T>,
}

impl<S, T> ListingService<S, T>
where
    S: ListingStore + 'static,
    T: CacheTransport + 'static,
{
    pub fn new(store: Arc<S>, cache: ListingCache<T>) -> Self {
        Self {
            reader: ListingReader::new(Arc::clone(&store), cache.clone()),
            workflow: ModerationWorkflow::new(store, cache),
        }
    }

    pub async fn list_flats(
        &self,
        house_id: HouseId,
        role: Role,
    ) -> Result<Vec<Flat>, ListingError> {
        Ok(self.reader.list_flats(house_id, role).await?)
    }

    pub async fn create_house(&self, house: NewHouse) -> Result<House, ListingError> {
        Ok(self.workflow.create_house(house).await?)
    }

    pub async fn create_flat(&self, flat: NewFlat) -> Result<Flat, ListingError> {
        Ok(self.workflow.create_flat(flat).await?)
    }

    pub async fn update_flat(
        &self,
        change: StatusChange,
    ) -> Result<ModerationOutcome, ListingError> {
        Ok(self.workflow.update_flat(change).await?)
    }
}

/// Error raised by the listing service. Moderation conflicts are not errors; see
/// [`ModerationOutcome::Rejected`].
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("{0} not found")]
    NotFound(Entity),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("listing store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for ListingError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(entity) => Self::NotFound(entity),
            StoreError::Validation(err) => Self::Validation(err),
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
        }
    }
}
