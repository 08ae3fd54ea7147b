//! The status transition rule shared by every store implementation.
//!
//! A flat in `OnModeration` is claimed by exactly one moderator. Only that moderator may
//! move it on; everyone else is rejected until the claim is released by leaving
//! `OnModeration`. Stores must evaluate [`decide`] and persist its result as one atomic
//! step per flat.

use serde::Serialize;

use super::domain::{Flat, FlatId, FlatStatus, ModeratorId, StatusChange};

/// The persisted `(status, moderator_id)` pair of a flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimState {
    pub status: FlatStatus,
    pub moderator_id: Option<ModeratorId>,
}

/// What a store should do with a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply(ClaimState),
    Reject { held_by: Option<ModeratorId> },
}

pub fn decide(current: ClaimState, change: &StatusChange) -> Decision {
    if current.status == FlatStatus::OnModeration
        && current.moderator_id != Some(change.moderator_id)
    {
        // A claimed-but-unowned row counts as claimed by someone else.
        return Decision::Reject {
            held_by: current.moderator_id,
        };
    }

    let moderator_id = match change.status {
        FlatStatus::OnModeration => Some(change.moderator_id),
        _ => None,
    };

    Decision::Apply(ClaimState {
        status: change.status,
        moderator_id,
    })
}

/// A transition that went through. `flat` reflects the persisted row; `handled_by` is the
/// moderator who performed the transition, reported even after the claim is released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModerationReceipt {
    #[serde(flatten)]
    pub flat: Flat,
    pub handled_by: ModeratorId,
}

/// A transition refused because another moderator holds the flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModerationRejection {
    pub flat_id: FlatId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_by: Option<ModeratorId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationOutcome {
    Applied(ModerationReceipt),
    Rejected(ModerationRejection),
}

impl ModerationOutcome {
    pub fn applied(&self) -> Option<&ModerationReceipt> {
        match self {
            ModerationOutcome::Applied(receipt) => Some(receipt),
            ModerationOutcome::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ModerationOutcome::Rejected(_))
    }
}
