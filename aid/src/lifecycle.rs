//! The request lifecycle state machine.
//!
//! Every status change a request can undergo is an edge in [`EDGES`], keyed
//! on (from, to) with the roles allowed to drive it. Handlers never mutate a
//! request's status directly; they call [`transition`] and persist whatever
//! it returns, so the graph and its guards live in exactly one place.

use chrono::Utc;
use thiserror::Error;

use crate::model::{Request, Role, Status};

/// Who is attempting a transition. Food-bank actors carry the id of the bank
/// they administer, resolved from their session by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User,
    Foodbank { foodbank_id: i64 },
    Org,
}

impl Actor {
    pub fn role(self) -> Role {
        match self {
            Actor::User => Role::User,
            Actor::Foodbank { .. } => Role::Foodbank,
            Actor::Org => Role::Org,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot transition a {from} request to {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("transition to Assigned requires a target food bank")]
    MissingAssignment,

    #[error("{0}")]
    Forbidden(&'static str),

    /// Same-state no-ops, including a reassignment to the current bank.
    #[error("request is already {status}")]
    NoOp { status: Status },
}

/// Edges of the state graph and the roles permitted on each. The
/// Assigned→Assigned edge is reassignment.
const EDGES: &[(Status, Status, &[Role])] = &[
    (Status::Pending, Status::Assigned, &[Role::Org, Role::Foodbank]),
    (Status::Assigned, Status::Assigned, &[Role::Org, Role::Foodbank]),
    (Status::Assigned, Status::Fulfilled, &[Role::Foodbank]),
    (Status::Pending, Status::Cancelled, &[Role::Org]),
    (Status::Assigned, Status::Cancelled, &[Role::Org]),
];

fn allowed_roles(from: Status, to: Status) -> Option<&'static [Role]> {
    EDGES
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, roles)| *roles)
}

/// Validate and apply one status change, returning the updated request.
///
/// Checks run in a fixed order: terminal states reject everything, then the
/// edge must exist in the graph, then an assignment target must be present
/// where required, then the actor must be permitted. The returned request is
/// a copy; the caller persists it with a compare-and-swap on `version` so no
/// partial update is ever observable.
pub fn transition(
    request: &Request,
    to: Status,
    actor: Actor,
    target: Option<i64>,
) -> Result<Request, TransitionError> {
    let from = request.status;

    // Nothing ever leaves a terminal state, not even a repeat of itself.
    if from.is_terminal() {
        return Err(TransitionError::InvalidTransition { from, to });
    }

    let Some(roles) = allowed_roles(from, to) else {
        if from == to {
            return Err(TransitionError::NoOp { status: from });
        }
        return Err(TransitionError::InvalidTransition { from, to });
    };

    if to == Status::Assigned && target.is_none() {
        return Err(TransitionError::MissingAssignment);
    }

    if !roles.contains(&actor.role()) {
        return Err(match to {
            Status::Cancelled => {
                TransitionError::Forbidden("only organization admins may cancel a request")
            }
            Status::Fulfilled => {
                TransitionError::Forbidden("only the assigned food bank may fulfill a request")
            }
            _ => TransitionError::Forbidden("role is not permitted to assign requests"),
        });
    }

    if let Actor::Foodbank { foodbank_id } = actor {
        match to {
            // Food banks take requests for themselves; only org actors may
            // hand a request to a third bank.
            Status::Assigned if target != Some(foodbank_id) => {
                return Err(TransitionError::Forbidden(
                    "food banks may only assign requests to themselves",
                ));
            }
            Status::Fulfilled if request.assigned_to_id != Some(foodbank_id) => {
                return Err(TransitionError::Forbidden(
                    "only the assigned food bank may fulfill a request",
                ));
            }
            _ => {}
        }
    }

    if from == Status::Assigned && to == Status::Assigned && request.assigned_to_id == target {
        return Err(TransitionError::NoOp { status: from });
    }

    let mut updated = request.clone();
    updated.status = to;
    match to {
        Status::Assigned => updated.assigned_to_id = target,
        Status::Fulfilled => updated.fulfilled_at = Some(Utc::now()),
        // Cancellation clears the assignment so `assigned_to_id` keeps its
        // "non-null iff Assigned or Fulfilled" invariant.
        Status::Cancelled => updated.assigned_to_id = None,
        Status::Pending => {}
    }
    Ok(updated)
}
