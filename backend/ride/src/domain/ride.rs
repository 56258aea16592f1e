use common::audit::Audit;
use common::events::RideNotification;
use common::status::RideStatus;
use serde::Serialize;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: i64,
    pub driver_id: Option<i64>,
    pub passenger_id: i64,
    pub address_from: String,
    pub address_to: String,
    pub cost: f64,
    pub status: RideStatus,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

/// A ride that has not been stored yet; the id comes from the database.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct NewRide {
    pub passenger_id: i64,
    #[validate(length(max = 255), custom(function = "not_blank"))]
    pub address_from: String,
    #[validate(length(max = 255), custom(function = "not_blank"))]
    pub address_to: String,
    #[validate(range(min = 0.0, max = 1_000_000.0))]
    pub cost: f64,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

impl NewRide {
    pub fn new(passenger_id: i64, address_from: String, address_to: String, cost: f64) -> Self {
        Self {
            passenger_id,
            address_from,
            address_to,
            cost,
        }
    }
}

impl Ride {
    pub fn to_notification(&self) -> RideNotification {
        RideNotification {
            id: self.id,
            driver_id: self.driver_id,
            passenger_id: self.passenger_id,
            address_from: self.address_from.clone(),
            address_to: self.address_to.clone(),
            driver_ride_status: self.status.into(),
            passenger_ride_status: self.status.into(),
            cost: self.cost,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_ride(id: i64, status: RideStatus) -> Ride {
    Ride {
        id,
        driver_id: None,
        passenger_id: 100,
        address_from: "Lenina 1".to_string(),
        address_to: "Central Station".to_string(),
        cost: 12.5,
        status,
        audit: Audit::new(),
    }
}

#[cfg(test)]
mod tests {
    use common::status::{DriverRideStatus, PassengerRideStatus};

    use super::*;

    #[test]
    fn test_notification_projects_both_views() {
        let mut ride = sample_ride(5, RideStatus::OnWayForPassenger);
        ride.driver_id = Some(8);

        let notification = ride.to_notification();

        assert_eq!(notification.id, 5);
        assert_eq!(notification.driver_id, Some(8));
        assert_eq!(notification.passenger_id, 100);
        assert_eq!(notification.driver_ride_status, DriverRideStatus::OnWayForPassenger);
        assert_eq!(
            notification.passenger_ride_status,
            PassengerRideStatus::OnWayForPassenger
        );
        assert_eq!(notification.cost, 12.5);
    }

    #[test]
    fn test_new_ride_validation() {
        let valid = NewRide::new(1, "Lenina 1".to_string(), "Airport".to_string(), 20.0);
        assert!(valid.validate().is_ok());

        let blank = NewRide::new(1, "   ".to_string(), "Airport".to_string(), 20.0);
        let errors = blank.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("address_from"));

        let negative = NewRide::new(1, "Lenina 1".to_string(), "Airport".to_string(), -1.0);
        let errors = negative.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("cost"));
    }

    #[test]
    fn test_deleted_flag_not_serialized() {
        let ride = sample_ride(1, RideStatus::Created);
        let value = serde_json::to_value(&ride).unwrap();

        assert_eq!(value["status"], "CREATED");
        assert_eq!(value["passengerId"], 100);
        assert!(value.get("deleted").is_none());
        assert!(value["createdAt"].is_string());
    }
}
