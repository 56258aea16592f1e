use common::error::UsecaseError;
use common::events::{RatingNotification, RideNotification, UserType};

use crate::domain::passenger::{Passenger, PassengerRide};
use crate::usecase::contracts::{PassengerRepository, PassengerRideRepository};

pub struct PassengersUseCase<P, R>
where
    P: PassengerRepository,
    R: PassengerRideRepository,
{
    passenger_repository: P,
    ride_repository: R,
}

impl<P, R> PassengersUseCase<P, R>
where
    P: PassengerRepository,
    R: PassengerRideRepository,
{
    pub fn new(passenger_repository: P, ride_repository: R) -> Self {
        Self {
            passenger_repository,
            ride_repository,
        }
    }

    #[tracing::instrument(skip(self, name))]
    pub async fn register(&self, name: String) -> Result<Passenger, UsecaseError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(UsecaseError::Validation("Name must not be empty".to_string()));
        }

        let passenger = self.passenger_repository.create(name).await?;

        tracing::info!(passenger_id = passenger.id, "passenger registered");
        Ok(passenger)
    }

    #[tracing::instrument(skip(self), fields(passenger_id = id))]
    pub async fn get_passenger(&self, id: i64) -> Result<Passenger, UsecaseError> {
        self.passenger_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Passenger".to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_rides(&self, passenger_id: i64) -> Result<Vec<PassengerRide>, UsecaseError> {
        let rides = self.ride_repository.find_by_passenger(passenger_id).await?;

        tracing::debug!(passenger_id, count = rides.len(), "retrieved rides");
        Ok(rides)
    }

    /// Last write wins: a redelivered notification stores the same state again.
    #[tracing::instrument(skip(self, notification), fields(ride_id = notification.id))]
    pub async fn on_ride_notification(&self, notification: RideNotification) -> anyhow::Result<()> {
        let ride = PassengerRide::from(&notification);
        self.ride_repository.upsert(&ride).await?;

        tracing::info!(
            passenger_id = ride.passenger_id,
            status = ?ride.status,
            "passenger ride updated"
        );
        Ok(())
    }

    #[tracing::instrument(skip(self, notification), fields(user_id = notification.user_id))]
    pub async fn on_rating_notification(&self, notification: RatingNotification) -> anyhow::Result<()> {
        if notification.user_type != UserType::Passenger {
            tracing::warn!(user_type = %notification.user_type, "rating for another role, ignoring");
            return Ok(());
        }

        let updated = self
            .passenger_repository
            .update_rating(notification.user_id, notification.new_aggregate_rating)
            .await?;

        if updated {
            tracing::info!(rating = notification.new_aggregate_rating, "passenger rating updated");
        } else {
            metrics::counter!("rating_updates_skipped_total", "reason" => "unknown_passenger")
                .increment(1);
            tracing::warn!("rating for unknown passenger, skipping");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::error::RepositoryError;
    use common::status::PassengerRideStatus;
    use mockall::predicate::eq;

    use super::*;
    use crate::domain::passenger::sample_notification;
    use crate::usecase::contracts::{MockPassengerRepository, MockPassengerRideRepository};

    #[tokio::test]
    async fn test_register_rejects_blank_name() {
        let mut passengers = MockPassengerRepository::new();
        passengers.expect_create().never();
        let usecase = PassengersUseCase::new(passengers, MockPassengerRideRepository::new());

        assert!(matches!(
            usecase.register(String::new()).await,
            Err(UsecaseError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_get_missing_passenger() {
        let mut passengers = MockPassengerRepository::new();
        passengers
            .expect_find_by_id()
            .with(eq(3))
            .returning(|_| Ok(None));
        let usecase = PassengersUseCase::new(passengers, MockPassengerRideRepository::new());

        assert!(matches!(
            usecase.get_passenger(3).await,
            Err(UsecaseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ride_notification_stores_passenger_view() {
        let mut rides = MockPassengerRideRepository::new();
        rides
            .expect_upsert()
            .withf(|ride| {
                ride.ride_id == 9
                    && ride.passenger_id == 42
                    && ride.driver_id.is_none()
                    && ride.status == PassengerRideStatus::Created
            })
            .times(1)
            .returning(|_| Ok(()));
        let usecase = PassengersUseCase::new(MockPassengerRepository::new(), rides);

        usecase
            .on_ride_notification(sample_notification(9, PassengerRideStatus::Created))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_redelivery_rewrites_same_state() {
        let mut rides = MockPassengerRideRepository::new();
        rides
            .expect_upsert()
            .withf(|ride| ride.status == PassengerRideStatus::Completed)
            .times(2)
            .returning(|_| Ok(()));
        let usecase = PassengersUseCase::new(MockPassengerRepository::new(), rides);

        let notification = sample_notification(9, PassengerRideStatus::Completed);
        usecase.on_ride_notification(notification.clone()).await.unwrap();
        usecase.on_ride_notification(notification).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_failure_is_returned_for_redelivery() {
        let mut rides = MockPassengerRideRepository::new();
        rides
            .expect_upsert()
            .returning(|_| Err(RepositoryError::DatabaseError("down".to_string())));
        let usecase = PassengersUseCase::new(MockPassengerRepository::new(), rides);

        let result = usecase
            .on_ride_notification(sample_notification(9, PassengerRideStatus::Accepted))
            .await;

        tokio_test::assert_err!(result);
    }

    #[tokio::test]
    async fn test_rating_notification_overwrites_rating() {
        let mut passengers = MockPassengerRepository::new();
        passengers
            .expect_update_rating()
            .with(eq(12), eq(4.5))
            .times(1)
            .returning(|_, _| Ok(true));
        let usecase = PassengersUseCase::new(passengers, MockPassengerRideRepository::new());

        usecase
            .on_rating_notification(RatingNotification {
                user_id: 12,
                user_type: UserType::Passenger,
                new_aggregate_rating: 4.5,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_driver_rating_is_ignored() {
        let mut passengers = MockPassengerRepository::new();
        passengers.expect_update_rating().never();
        let usecase = PassengersUseCase::new(passengers, MockPassengerRideRepository::new());

        usecase
            .on_rating_notification(RatingNotification {
                user_id: 12,
                user_type: UserType::Driver,
                new_aggregate_rating: 2.0,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rating_for_unknown_passenger_is_skipped() {
        let mut passengers = MockPassengerRepository::new();
        passengers
            .expect_update_rating()
            .times(1)
            .returning(|_, _| Ok(false));
        let usecase = PassengersUseCase::new(passengers, MockPassengerRideRepository::new());

        let result = usecase
            .on_rating_notification(RatingNotification {
                user_id: 404,
                user_type: UserType::Passenger,
                new_aggregate_rating: 4.0,
            })
            .await;

        tokio_test::assert_ok!(result);
    }
}
