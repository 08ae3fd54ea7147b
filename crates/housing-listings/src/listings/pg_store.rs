use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::domain::{
    now_millis, Flat, FlatId, FlatStatus, House, HouseId, ModeratorId, NewFlat, NewHouse, Role,
    StatusChange,
};
use super::store::{Entity, ListingStore, StoreError};
use super::transition::{
    decide, ClaimState, Decision, ModerationOutcome, ModerationReceipt, ModerationRejection,
};

/// Column list for `flat` queries.
const FLAT_COLUMNS: &str = "id, house_id, price, rooms, flat_num, status, moderator_id";

/// Column list for `house` queries.
const HOUSE_COLUMNS: &str = "id, address, year, developer, created_at, update_at";

/// PostgreSQL-backed listing store.
#[derive(Debug, Clone)]
pub struct PgListingStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct FlatRow {
    id: i64,
    house_id: i64,
    price: i64,
    rooms: i32,
    flat_num: i32,
    status: String,
    moderator_id: Option<i64>,
}

impl TryFrom<FlatRow> for Flat {
    type Error = StoreError;

    fn try_from(row: FlatRow) -> Result<Self, Self::Error> {
        let status = parse_status(&row.status)?;
        Ok(Flat {
            id: FlatId(row.id),
            house_id: HouseId(row.house_id),
            price: row.price,
            rooms: row.rooms,
            number: row.flat_num,
            status,
            moderator_id: row.moderator_id.map(ModeratorId),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HouseRow {
    id: i64,
    address: String,
    year: i32,
    developer: Option<String>,
    created_at: DateTime<Utc>,
    update_at: DateTime<Utc>,
}

impl From<HouseRow> for House {
    fn from(row: HouseRow) -> Self {
        House {
            id: HouseId(row.id),
            address: row.address,
            year: row.year,
            developer: row.developer,
            created_at: row.created_at,
            updated_at: row.update_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClaimRow {
    status: String,
    moderator_id: Option<i64>,
}

fn parse_status(raw: &str) -> Result<FlatStatus, StoreError> {
    raw.parse::<FlatStatus>()
        .map_err(|err| StoreError::Unavailable(format!("corrupt flat row: {err}")))
}

/// SQLSTATE for a foreign-key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn missing_house_or(err: sqlx::Error, house_id: HouseId) -> StoreError {
    let is_fk_violation = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == FOREIGN_KEY_VIOLATION);
    if is_fk_violation {
        StoreError::NotFound(Entity::House(house_id))
    } else {
        err.into()
    }
}

impl PgListingStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Unavailable(format!("migration failed: {err}")))
    }
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn flats(&self, house_id: HouseId, role: Role) -> Result<Vec<Flat>, StoreError> {
        let query = match role {
            Role::Moderator => {
                format!("SELECT {FLAT_COLUMNS} FROM flat WHERE house_id = $1 ORDER BY id")
            }
            Role::Client => format!(
                "SELECT {FLAT_COLUMNS} FROM flat \
                 WHERE house_id = $1 AND status = 'approved' ORDER BY id"
            ),
        };

        sqlx::query_as::<_, FlatRow>(&query)
            .bind(house_id.0)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Flat::try_from)
            .collect()
    }

    async fn create_house(&self, house: NewHouse) -> Result<House, StoreError> {
        house.validate()?;
        let query = format!(
            "INSERT INTO house (address, year, developer, created_at, update_at) \
             VALUES ($1, $2, $3, $4, $4) \
             RETURNING {HOUSE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, HouseRow>(&query)
            .bind(&house.address)
            .bind(house.year)
            .bind(&house.developer)
            .bind(now_millis())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn create_flat(&self, flat: NewFlat) -> Result<Flat, StoreError> {
        flat.validate()?;
        let mut tx = self.pool.begin().await?;

        // Touching the house first also locks it for the rest of the transaction.
        let touched = sqlx::query_scalar::<_, i64>(
            "UPDATE house \
             SET update_at = GREATEST($2, update_at + INTERVAL '1 millisecond') \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(flat.house_id.0)
        .bind(now_millis())
        .fetch_optional(&mut *tx)
        .await?;

        if touched.is_none() {
            tx.rollback().await?;
            return Err(StoreError::NotFound(Entity::House(flat.house_id)));
        }

        let query = format!(
            "INSERT INTO flat (house_id, price, rooms, flat_num, status, moderator_id) \
             VALUES ($1, $2, $3, $4, $5, NULL) \
             RETURNING {FLAT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, FlatRow>(&query)
            .bind(flat.house_id.0)
            .bind(flat.price)
            .bind(flat.rooms)
            .bind(flat.number)
            .bind(FlatStatus::Created.label())
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| missing_house_or(err, flat.house_id))?;

        tx.commit().await?;
        Flat::try_from(row)
    }

    async fn change_status(&self, change: StatusChange) -> Result<ModerationOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ClaimRow>(
            "SELECT status, moderator_id FROM flat WHERE id = $1 FOR UPDATE",
        )
        .bind(change.flat_id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(StoreError::NotFound(Entity::Flat(change.flat_id)));
        };

        let current = ClaimState {
            status: parse_status(&row.status)?,
            moderator_id: row.moderator_id.map(ModeratorId),
        };

        match decide(current, &change) {
            Decision::Reject { held_by } => {
                tx.rollback().await?;
                Ok(ModerationOutcome::Rejected(ModerationRejection {
                    flat_id: change.flat_id,
                    held_by,
                }))
            }
            Decision::Apply(next) => {
                let query = format!(
                    "UPDATE flat SET status = $2, moderator_id = $3 WHERE id = $1 \
                     RETURNING {FLAT_COLUMNS}"
                );
                let row = sqlx::query_as::<_, FlatRow>(&query)
                    .bind(change.flat_id.0)
                    .bind(next.status.label())
                    .bind(next.moderator_id.map(|id| id.0))
                    .fetch_one(&mut *tx)
                    .await?;
                tx.commit().await?;

                Ok(ModerationOutcome::Applied(ModerationReceipt {
                    flat: Flat::try_from(row)?,
                    handled_by: change.moderator_id,
                }))
            }
        }
    }
}
