use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bus::TopicSpec;
use crate::status::{DriverRideStatus, PassengerRideStatus};

pub const RIDE_DRIVER_TOPIC: TopicSpec = TopicSpec::new("ride-driver-notification");
pub const RIDE_PASSENGER_TOPIC: TopicSpec = TopicSpec::new("ride-passenger-notification");
pub const PASSENGER_RATING_TOPIC: TopicSpec = TopicSpec::new("passenger-rating-notification");
pub const DRIVER_RATING_TOPIC: TopicSpec = TopicSpec::new("driver-rating-notification");

pub const TOPICS: [&TopicSpec; 4] = [
    &RIDE_DRIVER_TOPIC,
    &RIDE_PASSENGER_TOPIC,
    &PASSENGER_RATING_TOPIC,
    &DRIVER_RATING_TOPIC,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    Driver,
    Passenger,
}

impl UserType {
    /// Topic the owning service listens on for rating updates.
    pub fn rating_topic(self) -> &'static TopicSpec {
        match self {
            UserType::Driver => &DRIVER_RATING_TOPIC,
            UserType::Passenger => &PASSENGER_RATING_TOPIC,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Driver => "DRIVER",
            UserType::Passenger => "PASSENGER",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published by the ride service on every ride change, to both the driver and
/// passenger topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideNotification {
    pub id: i64,
    pub driver_id: Option<i64>,
    pub passenger_id: i64,
    pub address_from: String,
    pub address_to: String,
    pub driver_ride_status: DriverRideStatus,
    pub passenger_ride_status: PassengerRideStatus,
    pub cost: f64,
}

/// Published by the rating service after a user's aggregate changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingNotification {
    pub user_id: i64,
    pub user_type: UserType,
    pub new_aggregate_rating: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ride_notification_wire_shape() {
        let notification = RideNotification {
            id: 12,
            driver_id: Some(3),
            passenger_id: 9,
            address_from: "Main St 1".to_string(),
            address_to: "Airport".to_string(),
            driver_ride_status: DriverRideStatus::Accepted,
            passenger_ride_status: PassengerRideStatus::Accepted,
            cost: 18.5,
        };

        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["id"], 12);
        assert_eq!(value["driverId"], 3);
        assert_eq!(value["passengerId"], 9);
        assert_eq!(value["addressFrom"], "Main St 1");
        assert_eq!(value["addressTo"], "Airport");
        assert_eq!(value["driverRideStatus"], "ACCEPTED");
        assert_eq!(value["passengerRideStatus"], "ACCEPTED");
        assert_eq!(value["cost"], 18.5);
    }

    #[test]
    fn test_rating_notification_wire_shape() {
        let raw = r#"{"userId":7,"userType":"DRIVER","newAggregateRating":3.0}"#;
        let notification: RatingNotification = serde_json::from_str(raw).unwrap();

        assert_eq!(notification.user_id, 7);
        assert_eq!(notification.user_type, UserType::Driver);
        assert_eq!(notification.new_aggregate_rating, 3.0);
    }

    #[test]
    fn test_rating_topic_per_user_type() {
        assert_eq!(UserType::Driver.rating_topic().name, "driver-rating-notification");
        assert_eq!(
            UserType::Passenger.rating_topic().name,
            "passenger-rating-notification"
        );
    }

    #[test]
    fn test_topics_are_provisioned_alike() {
        for topic in TOPICS {
            assert_eq!(topic.partitions, 3);
            assert_eq!(topic.replicas, 1);
        }
    }
}
