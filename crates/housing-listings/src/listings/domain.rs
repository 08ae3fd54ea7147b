use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HouseId(pub i64);

/// Identifier of a unit within a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatId(pub i64);

/// Identifier of a moderator, supplied by role resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeratorId(pub i64);

impl fmt::Display for HouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FlatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ModeratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller role; decides listing visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Moderator,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Moderator => "moderator",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "client" => Ok(Role::Client),
            "moderator" => Ok(Role::Moderator),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no such user type: {0}")]
pub struct UnknownRole(pub String);

/// Moderation status of a flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatStatus {
    Created,
    #[serde(alias = "on moderation")]
    OnModeration,
    Approved,
    Declined,
}

impl FlatStatus {
    pub const fn label(self) -> &'static str {
        match self {
            FlatStatus::Created => "created",
            FlatStatus::OnModeration => "on_moderation",
            FlatStatus::Approved => "approved",
            FlatStatus::Declined => "declined",
        }
    }

    pub const fn visible_to(self, role: Role) -> bool {
        match role {
            Role::Moderator => true,
            Role::Client => matches!(self, FlatStatus::Approved),
        }
    }
}

impl FromStr for FlatStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created" => Ok(FlatStatus::Created),
            "on_moderation" | "on moderation" => Ok(FlatStatus::OnModeration),
            "approved" => Ok(FlatStatus::Approved),
            "declined" => Ok(FlatStatus::Declined),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown flat status: {0}")]
pub struct UnknownStatus(pub String);

/// A building as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub id: HouseId,
    pub address: String,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "update_at")]
    pub updated_at: DateTime<Utc>,
}

/// A unit as stored and listed. `moderator_id` is only ever set while `status` is
/// `OnModeration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flat {
    pub id: FlatId,
    pub house_id: HouseId,
    pub price: i64,
    pub rooms: i32,
    #[serde(rename = "flat_num")]
    pub number: i32,
    pub status: FlatStatus,
    #[serde(default)]
    pub moderator_id: Option<ModeratorId>,
}

impl Flat {
    pub fn claim_is_consistent(&self) -> bool {
        self.moderator_id.is_some() == (self.status == FlatStatus::OnModeration)
    }
}

/// House creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHouse {
    pub address: String,
    pub year: i32,
    #[serde(default)]
    pub developer: Option<String>,
}

/// Flat creation payload. `status` and `moderator_id` are accepted from callers but
/// never persisted: new flats always start `Created` and unclaimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFlat {
    pub house_id: HouseId,
    pub price: i64,
    pub rooms: i32,
    #[serde(rename = "flat_num")]
    pub number: i32,
    #[serde(default)]
    pub status: Option<FlatStatus>,
    #[serde(default)]
    pub moderator_id: Option<ModeratorId>,
}

/// A moderator's request to move a flat to a new status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub flat_id: FlatId,
    pub status: FlatStatus,
    pub moderator_id: ModeratorId,
}

/// Input validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("address must not be empty")]
    EmptyAddress,
    #[error("construction year {0} is out of range")]
    InvalidYear(i32),
    #[error("house id must be positive")]
    InvalidHouseId,
    #[error("price must not be negative")]
    NegativePrice,
    #[error("a flat needs at least one room")]
    InvalidRooms,
    #[error("flat number must be positive")]
    InvalidFlatNumber,
}

const EARLIEST_CONSTRUCTION_YEAR: i32 = 1000;

impl NewHouse {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.address.trim().is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        if self.year < EARLIEST_CONSTRUCTION_YEAR || self.year > 9999 {
            return Err(ValidationError::InvalidYear(self.year));
        }
        Ok(())
    }
}

impl NewFlat {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.house_id.0 <= 0 {
            return Err(ValidationError::InvalidHouseId);
        }
        if self.price < 0 {
            return Err(ValidationError::NegativePrice);
        }
        if self.rooms < 1 {
            return Err(ValidationError::InvalidRooms);
        }
        if self.number < 1 {
            return Err(ValidationError::InvalidFlatNumber);
        }
        Ok(())
    }
}

/// Current UTC time truncated to millisecond precision.
pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

pub(crate) fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::milliseconds(1)).unwrap_or(at)
}

/// Next `update_at` value for a house: now, but always strictly after the previous value.
pub(crate) fn next_touch(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + TimeDelta::milliseconds(1);
    if now > floor {
        now
    } else {
        floor
    }
}
