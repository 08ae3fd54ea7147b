use std::fmt;

use async_trait::async_trait;

use super::domain::{
    Flat, FlatId, House, HouseId, NewFlat, NewHouse, Role, StatusChange, ValidationError,
};
use super::transition::ModerationOutcome;

/// Source of truth for houses and flats.
///
/// Implementations own the transition rule in [`super::transition::decide`] and must run
/// `change_status` as one atomically visible unit per flat id, so two concurrent claims on
/// the same flat cannot both succeed.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// All flats of a house for moderators, approved flats only for clients. Ordered by id.
    async fn flats(&self, house_id: HouseId, role: Role) -> Result<Vec<Flat>, StoreError>;

    async fn create_house(&self, house: NewHouse) -> Result<House, StoreError>;

    /// Persists a flat as `Created` and unclaimed, and bumps the owning house's
    /// `updated_at` in the same unit of work.
    async fn create_flat(&self, flat: NewFlat) -> Result<Flat, StoreError>;

    async fn change_status(&self, change: StatusChange) -> Result<ModerationOutcome, StoreError>;
}

/// Record kinds that can be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    House(HouseId),
    Flat(FlatId),
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::House(id) => write!(f, "house {id}"),
            Entity::Flat(id) => write!(f, "flat {id}"),
        }
    }
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(Entity),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("listing store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}
