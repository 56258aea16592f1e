use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical ride status, owned by the ride service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "ride_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Created,
    Accepted,
    OnWayForPassenger,
    OnWayToDestination,
    Completed,
    Canceled,
}

impl RideStatus {
    pub const ALL: [RideStatus; 6] = [
        RideStatus::Created,
        RideStatus::Accepted,
        RideStatus::OnWayForPassenger,
        RideStatus::OnWayToDestination,
        RideStatus::Completed,
        RideStatus::Canceled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RideStatus::Created => "CREATED",
            RideStatus::Accepted => "ACCEPTED",
            RideStatus::OnWayForPassenger => "ON_WAY_FOR_PASSENGER",
            RideStatus::OnWayToDestination => "ON_WAY_TO_DESTINATION",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver-side view of a ride. `Waiting` only exists here: the driver has
/// arrived at the pickup point and the ride service still reports
/// `OnWayForPassenger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "driver_ride_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverRideStatus {
    Created,
    Accepted,
    OnWayForPassenger,
    Waiting,
    OnWayToDestination,
    Completed,
    Canceled,
}

impl DriverRideStatus {
    /// Local status after receiving `incoming` from the ride service.
    /// A local `Waiting` is kept while the ride service still reports the
    /// super-state it refines.
    pub fn absorb(self, incoming: DriverRideStatus) -> DriverRideStatus {
        match (self, incoming) {
            (DriverRideStatus::Waiting, DriverRideStatus::OnWayForPassenger) => {
                DriverRideStatus::Waiting
            }
            _ => incoming,
        }
    }
}

impl From<RideStatus> for DriverRideStatus {
    fn from(status: RideStatus) -> Self {
        match status {
            RideStatus::Created => DriverRideStatus::Created,
            RideStatus::Accepted => DriverRideStatus::Accepted,
            RideStatus::OnWayForPassenger => DriverRideStatus::OnWayForPassenger,
            RideStatus::OnWayToDestination => DriverRideStatus::OnWayToDestination,
            RideStatus::Completed => DriverRideStatus::Completed,
            RideStatus::Canceled => DriverRideStatus::Canceled,
        }
    }
}

/// Passenger-side view of a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "passenger_ride_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassengerRideStatus {
    Created,
    Accepted,
    OnWayForPassenger,
    OnWayToDestination,
    Completed,
    Canceled,
}

impl From<RideStatus> for PassengerRideStatus {
    fn from(status: RideStatus) -> Self {
        match status {
            RideStatus::Created => PassengerRideStatus::Created,
            RideStatus::Accepted => PassengerRideStatus::Accepted,
            RideStatus::OnWayForPassenger => PassengerRideStatus::OnWayForPassenger,
            RideStatus::OnWayToDestination => PassengerRideStatus::OnWayToDestination,
            RideStatus::Completed => PassengerRideStatus::Completed,
            RideStatus::Canceled => PassengerRideStatus::Canceled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = RideStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![RideStatus::Completed, RideStatus::Canceled]);
    }

    #[test]
    fn test_status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&RideStatus::OnWayForPassenger).unwrap();
        assert_eq!(json, "\"ON_WAY_FOR_PASSENGER\"");
        assert_eq!(RideStatus::OnWayToDestination.to_string(), "ON_WAY_TO_DESTINATION");
    }

    #[test]
    fn test_driver_view_keeps_waiting() {
        let local = DriverRideStatus::Waiting;
        assert_eq!(
            local.absorb(DriverRideStatus::OnWayForPassenger),
            DriverRideStatus::Waiting
        );
        assert_eq!(
            local.absorb(DriverRideStatus::OnWayToDestination),
            DriverRideStatus::OnWayToDestination
        );
        assert_eq!(
            local.absorb(DriverRideStatus::Canceled),
            DriverRideStatus::Canceled
        );
    }

    #[test]
    fn test_views_never_project_waiting() {
        for status in RideStatus::ALL {
            assert_ne!(DriverRideStatus::from(status), DriverRideStatus::Waiting);
        }
    }
}
