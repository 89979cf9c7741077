//! The order lifecycle as an explicit transition table.
//!
//! ```text
//!  awaiting_validation ──validate──▶ validated ──settle──▶ settled ──archive──▶ archived
//!          │                            │                                        ▲
//!          └──────cancel──────▶ cancelled ◀──cancel─┘                            │
//!                                   └──────────────────archive───────────────────┘
//! ```
//!
//! Any (state, transition) pair that is not in [`TRANSITIONS`] is rejected with [`BookingError::InvalidTransition`].
//! Guards that depend on other records (e.g. "no paid payments" for a cancellation, "zero balance" for settlement) are
//! checked by the storage backend inside the same transaction that applies the change.
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Meeting, MeetingStatus, MeetingUpdate, OrderStatusType},
    traits::BookingError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderTransition {
    Validate,
    Cancel,
    Settle,
    Archive,
}

impl OrderTransition {
    /// Who is allowed to request the transition.
    pub fn actor(&self) -> Actor {
        match self {
            Self::Settle => Actor::System,
            Self::Validate | Self::Cancel | Self::Archive => Actor::Admin,
        }
    }
}

impl Display for OrderTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validate => "validate",
            Self::Cancel => "cancel",
            Self::Settle => "settle",
            Self::Archive => "archive",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin,
    /// Triggered by the engine itself, never through a request
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Apply(OrderStatusType),
    /// The order is already where the transition would take it
    NoOp,
}

use OrderStatusType::*;
use OrderTransition::*;

pub const TRANSITIONS: [(OrderStatusType, OrderTransition, OrderStatusType); 6] = [
    (AwaitingValidation, Validate, Validated),
    (AwaitingValidation, Cancel, Cancelled),
    (Validated, Cancel, Cancelled),
    (Validated, Settle, Settled),
    (Settled, Archive, Archived),
    (Cancelled, Archive, Archived),
];

/// Looks up `transition` from `from` in the transition table.
///
/// Settling an already settled order is the only idempotent transition and yields [`TransitionOutcome::NoOp`].
pub fn evaluate(from: OrderStatusType, transition: OrderTransition) -> Result<TransitionOutcome, BookingError> {
    if from == Settled && transition == Settle {
        return Ok(TransitionOutcome::NoOp);
    }
    TRANSITIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == transition)
        .map(|(_, _, to)| TransitionOutcome::Apply(*to))
        .ok_or(BookingError::InvalidTransition { from, transition })
}

/// The transitions that may currently be requested from `status`.
pub fn allowed_transitions(status: OrderStatusType) -> Vec<OrderTransition> {
    TRANSITIONS.iter().filter(|(f, _, _)| *f == status).map(|(_, t, _)| *t).collect()
}

//--------------------------------------       Meetings        ---------------------------------------------------------
/// The new state of a meeting after an update has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeetingChange {
    pub status: MeetingStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Works out what `update` does to `meeting`.
///
/// Scheduled meetings may be (re)timed, cancelled or completed. Repeating a cancellation or completion is a no-op
/// (`Ok(None)`), since scheduling providers retry their callbacks. Cancelled and completed meetings are otherwise
/// final.
pub fn evaluate_meeting_update(meeting: &Meeting, update: &MeetingUpdate) -> Result<Option<MeetingChange>, BookingError> {
    use MeetingStatus as S;
    let keep_times = |status| MeetingChange { status, start_time: meeting.start_time, end_time: meeting.end_time };
    match (meeting.status, update) {
        (S::Scheduled, MeetingUpdate::InviteeCreated { start_time, end_time }) => {
            if end_time <= start_time {
                return Err(BookingError::InvalidMeetingUpdate(format!(
                    "Meeting {} cannot end ({end_time}) before it starts ({start_time})",
                    meeting.link_ref
                )));
            }
            Ok(Some(MeetingChange { status: S::Scheduled, start_time: Some(*start_time), end_time: Some(*end_time) }))
        },
        (S::Scheduled, MeetingUpdate::InviteeCanceled) => Ok(Some(keep_times(S::Cancelled))),
        (S::Scheduled, MeetingUpdate::Completed) => Ok(Some(keep_times(S::Completed))),
        (S::Cancelled, MeetingUpdate::InviteeCanceled) | (S::Completed, MeetingUpdate::Completed) => Ok(None),
        (status, update) => Err(BookingError::InvalidMeetingUpdate(format!(
            "Meeting {} is {status} and cannot accept {update:?}",
            meeting.link_ref
        ))),
    }
}
