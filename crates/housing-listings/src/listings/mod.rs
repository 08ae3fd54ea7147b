//! Flat listings grouped by house, with role-gated visibility, a moderation workflow and
//! a cache-aside read path.

pub mod auth;
pub mod backend;
pub mod cache;
pub mod domain;
pub mod memory;
pub mod moderation;
pub mod pg_store;
pub mod read_path;
pub mod redis_cache;
pub mod router;
pub mod service;
pub mod store;
pub mod transition;

#[cfg(test)]
mod tests;

pub use auth::{AuthError, Caller, Claims, TokenAuthority};
pub use backend::{CacheBackend, StoreBackend};
pub use cache::{
    CacheError, CacheKey, CacheLookup, CacheTransport, ListingCache, DEFAULT_LISTING_TTL,
};
pub use domain::{
    Flat, FlatId, FlatStatus, House, HouseId, ModeratorId, NewFlat, NewHouse, Role,
    StatusChange, ValidationError,
};
pub use memory::{InMemoryCacheTransport, InMemoryListingStore};
pub use moderation::{partitions_to_invalidate, ModerationWorkflow};
pub use pg_store::PgListingStore;
pub use read_path::ListingReader;
pub use redis_cache::RedisCacheTransport;
pub use router::{listing_router, ListingState};
pub use service::{ListingError, ListingService};
pub use store::{Entity, ListingStore, StoreError};
pub use transition::{ModerationOutcome, ModerationReceipt, ModerationRejection};
