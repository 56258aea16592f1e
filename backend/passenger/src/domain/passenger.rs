use common::audit::Audit;
use common::events::RideNotification;
use common::status::PassengerRideStatus;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub id: i64,
    pub name: String,
    pub rating: f64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PassengerRide {
    pub ride_id: i64,
    pub passenger_id: i64,
    pub driver_id: Option<i64>,
    pub address_from: String,
    pub address_to: String,
    pub cost: f64,
    pub status: PassengerRideStatus,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

impl From<&RideNotification> for PassengerRide {
    fn from(notification: &RideNotification) -> Self {
        Self {
            ride_id: notification.id,
            passenger_id: notification.passenger_id,
            driver_id: notification.driver_id,
            address_from: notification.address_from.clone(),
            address_to: notification.address_to.clone(),
            cost: notification.cost,
            status: notification.passenger_ride_status,
            audit: Audit::new(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_notification(ride_id: i64, status: PassengerRideStatus) -> RideNotification {
    use common::status::DriverRideStatus;

    RideNotification {
        id: ride_id,
        driver_id: None,
        passenger_id: 42,
        address_from: "Lenina 1".to_string(),
        address_to: "Airport".to_string(),
        driver_ride_status: DriverRideStatus::Created,
        passenger_ride_status: status,
        cost: 20.0,
    }
}
