//! Legal request status transitions.
//!
//! Every status change in the system is looked up here. Callers still have
//! to check the row-level preconditions (item count, driver assignment) and
//! the actor's authority, but whether `from -> to` is a legal edge at all has
//! exactly one answer: [`transition`].

use crate::models::RequestStatus;

/// Who is allowed to trigger a transition, besides an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// The request's sender.
    Sender,
    /// The driver named in the transition itself.
    IncomingDriver,
    /// The driver already assigned to the request.
    AssignedDriver,
}

/// Row-level condition that must hold immediately before the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    Unconditional,
    /// The request owns at least one item.
    HasItems,
    /// No driver is assigned yet and the caller names one.
    DriverUnassigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub authority: Authority,
    pub precondition: Precondition,
}

use Authority::*;
use RequestStatus::*;

pub const TRANSITIONS: &[Transition] = &[
    Transition {
        from: Draft,
        to: Pending,
        authority: Sender,
        precondition: Precondition::HasItems,
    },
    Transition {
        from: Pending,
        to: Accepted,
        authority: IncomingDriver,
        precondition: Precondition::DriverUnassigned,
    },
    Transition {
        from: Accepted,
        to: Completed,
        authority: AssignedDriver,
        precondition: Precondition::Unconditional,
    },
    Transition {
        from: Accepted,
        to: Lost,
        authority: AssignedDriver,
        precondition: Precondition::Unconditional,
    },
    Transition {
        from: Draft,
        to: Cancelled,
        authority: Sender,
        precondition: Precondition::Unconditional,
    },
    Transition {
        from: Pending,
        to: Cancelled,
        authority: Sender,
        precondition: Precondition::Unconditional,
    },
];

/// Look up the edge `from -> to`. `None` means the move is illegal.
pub fn transition(from: RequestStatus, to: RequestStatus) -> Option<&'static Transition> {
    TRANSITIONS.iter().find(|t| t.from == from && t.to == to)
}

/// Status a request takes when its first item is added, if any.
///
/// Only an empty `Draft` is promoted, and it goes through the same
/// `Draft -> Pending` edge an explicit publish uses.
pub fn promotion_on_first_item(current: RequestStatus, items_before: u64) -> Option<RequestStatus> {
    if items_before != 0 {
        return None;
    }
    transition(current, Pending).map(|t| t.to)
}
