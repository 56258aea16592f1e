//! Allowed ride status moves.
//!
//! ```text
//! CREATED -> ACCEPTED -> ON_WAY_FOR_PASSENGER -> ON_WAY_TO_DESTINATION -> COMPLETED
//!               \_______________________________^
//! any non-terminal -> CANCELED
//! ```
//!
//! `ACCEPTED -> ON_WAY_TO_DESTINATION` covers a passenger already waiting at
//! the pickup point.

use common::error::UsecaseError;
use common::status::RideStatus;
use thiserror::Error;

use crate::domain::ride::Ride;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot move ride from {current} to {requested}")]
    Invalid {
        current: RideStatus,
        requested: RideStatus,
    },
    #[error("ride is already {current}, cannot move to {requested}")]
    Terminal {
        current: RideStatus,
        requested: RideStatus,
    },
}

impl From<TransitionError> for UsecaseError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::Invalid { current, requested } => {
                UsecaseError::InvalidTransition { current, requested }
            }
            TransitionError::Terminal { current, requested } => {
                UsecaseError::TerminalState { current, requested }
            }
        }
    }
}

pub fn can_transition(current: RideStatus, requested: RideStatus) -> bool {
    use RideStatus::*;

    match (current, requested) {
        (Completed | Canceled, _) => false,
        (_, Canceled) => true,
        (Created, Accepted)
        | (Accepted, OnWayForPassenger)
        | (Accepted, OnWayToDestination)
        | (OnWayForPassenger, OnWayToDestination)
        | (OnWayToDestination, Completed) => true,
        _ => false,
    }
}

/// Checks the move without touching the ride.
pub fn check(current: RideStatus, requested: RideStatus) -> Result<(), TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::Terminal { current, requested });
    }
    if !can_transition(current, requested) {
        return Err(TransitionError::Invalid { current, requested });
    }
    Ok(())
}

/// Moves `ride` to `requested`, bumping its modification time.
pub fn apply(mut ride: Ride, requested: RideStatus) -> Result<Ride, TransitionError> {
    check(ride.status, requested)?;
    ride.status = requested;
    ride.audit.touch();
    Ok(ride)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ride::sample_ride;
    use RideStatus::*;

    const EDGES: [(RideStatus, RideStatus); 9] = [
        (Created, Accepted),
        (Accepted, OnWayForPassenger),
        (Accepted, OnWayToDestination),
        (OnWayForPassenger, OnWayToDestination),
        (OnWayToDestination, Completed),
        (Created, Canceled),
        (Accepted, Canceled),
        (OnWayForPassenger, Canceled),
        (OnWayToDestination, Canceled),
    ];

    #[test]
    fn test_every_pair_against_the_graph() {
        for current in RideStatus::ALL {
            for requested in RideStatus::ALL {
                let expected = EDGES.contains(&(current, requested));
                assert_eq!(
                    can_transition(current, requested),
                    expected,
                    "{current} -> {requested}"
                );

                let ride = sample_ride(1, current);
                let before = ride.audit.modified_at;
                match apply(ride, requested) {
                    Ok(moved) => {
                        assert!(expected, "{current} -> {requested} should fail");
                        assert_eq!(moved.status, requested);
                        assert!(moved.audit.modified_at >= before);
                    }
                    Err(TransitionError::Terminal { .. }) => {
                        assert!(current.is_terminal());
                    }
                    Err(TransitionError::Invalid { current: c, requested: r }) => {
                        assert!(!expected);
                        assert!(!current.is_terminal());
                        assert_eq!((c, r), (current, requested));
                    }
                }
            }
        }
    }

    #[test]
    fn test_same_state_is_invalid() {
        for status in [Created, Accepted, OnWayForPassenger, OnWayToDestination] {
            assert_eq!(
                check(status, status),
                Err(TransitionError::Invalid {
                    current: status,
                    requested: status
                })
            );
        }
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for terminal in [Completed, Canceled] {
            for requested in RideStatus::ALL {
                assert_eq!(
                    check(terminal, requested),
                    Err(TransitionError::Terminal {
                        current: terminal,
                        requested
                    })
                );
            }
        }
    }

    #[test]
    fn test_full_ride_then_terminal() {
        let ride = sample_ride(1, Created);
        let ride = apply(ride, Accepted).unwrap();
        let ride = apply(ride, OnWayToDestination).unwrap();
        let ride = apply(ride, Completed).unwrap();
        assert_eq!(ride.status, Completed);

        let err = apply(ride, Accepted).unwrap_err();
        assert!(matches!(err, TransitionError::Terminal { .. }));
        assert!(matches!(
            UsecaseError::from(err),
            UsecaseError::TerminalState {
                current: Completed,
                requested: Accepted
            }
        ));
    }
}
