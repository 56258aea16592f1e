use common::audit::Audit;
use common::events::RideNotification;
use common::status::DriverRideStatus;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: i64,
    pub name: String,
    /// Last aggregate pushed by the rating service.
    pub rating: f64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

/// A ride as the driver service last heard about it.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DriverRide {
    pub ride_id: i64,
    pub driver_id: i64,
    pub passenger_id: i64,
    pub address_from: String,
    pub address_to: String,
    pub cost: f64,
    pub status: DriverRideStatus,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

impl DriverRide {
    pub fn from_notification(notification: &RideNotification, driver_id: i64) -> Self {
        Self {
            ride_id: notification.id,
            driver_id,
            passenger_id: notification.passenger_id,
            address_from: notification.address_from.clone(),
            address_to: notification.address_to.clone(),
            cost: notification.cost,
            status: notification.driver_ride_status,
            audit: Audit::new(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_notification(ride_id: i64, driver_id: Option<i64>, status: DriverRideStatus) -> RideNotification {
    use common::status::PassengerRideStatus;

    RideNotification {
        id: ride_id,
        driver_id,
        passenger_id: 100,
        address_from: "Lenina 1".to_string(),
        address_to: "Central Station".to_string(),
        driver_ride_status: status,
        passenger_ride_status: PassengerRideStatus::Accepted,
        cost: 12.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_notification_takes_driver_view() {
        let notification = sample_notification(5, Some(8), DriverRideStatus::OnWayForPassenger);

        let ride = DriverRide::from_notification(&notification, 8);

        assert_eq!(ride.ride_id, 5);
        assert_eq!(ride.driver_id, 8);
        assert_eq!(ride.passenger_id, 100);
        assert_eq!(ride.status, DriverRideStatus::OnWayForPassenger);
    }
}
