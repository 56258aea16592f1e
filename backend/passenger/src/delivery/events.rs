use std::future::Future;
use std::sync::Arc;

use common::bus::Subscriptions;
use common::events::{PASSENGER_RATING_TOPIC, RIDE_PASSENGER_TOPIC, RatingNotification, RideNotification};

use crate::PassengersService;

/// What the passenger service does with each event it consumes.
pub trait PassengerEvents: Send + Sync + 'static {
    fn ride_notification(
        &self,
        notification: RideNotification,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn rating_notification(
        &self,
        notification: RatingNotification,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl PassengerEvents for PassengersService {
    fn ride_notification(
        &self,
        notification: RideNotification,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        self.on_ride_notification(notification)
    }

    fn rating_notification(
        &self,
        notification: RatingNotification,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        self.on_rating_notification(notification)
    }
}

/// Topics the passenger service consumes and the use case each one feeds.
pub fn subscriptions<E: PassengerEvents>(passengers: Arc<E>) -> Subscriptions {
    let on_ride = Arc::clone(&passengers);
    let on_rating = passengers;

    Subscriptions::new()
        .on(&RIDE_PASSENGER_TOPIC, move |notification: RideNotification| {
            let passengers = Arc::clone(&on_ride);
            async move { passengers.ride_notification(notification).await }
        })
        .on(&PASSENGER_RATING_TOPIC, move |notification: RatingNotification| {
            let passengers = Arc::clone(&on_rating);
            async move { passengers.rating_notification(notification).await }
        })
}

#[cfg(test)]
mod tests {
    use common::bus::memory::InMemoryEventBus;
    use common::bus::publish_json;
    use common::events::{DRIVER_RATING_TOPIC, RIDE_DRIVER_TOPIC, UserType};
    use common::status::PassengerRideStatus;
    use mockall::predicate::eq;

    use super::*;
    use crate::domain::passenger::sample_notification;
    use crate::usecase::contracts::{MockPassengerRepository, MockPassengerRideRepository};
    use crate::usecase::passengers::PassengersUseCase;

    type MockPassengers = PassengersUseCase<MockPassengerRepository, MockPassengerRideRepository>;

    impl PassengerEvents for MockPassengers {
        fn ride_notification(
            &self,
            notification: RideNotification,
        ) -> impl Future<Output = anyhow::Result<()>> + Send {
            self.on_ride_notification(notification)
        }

        fn rating_notification(
            &self,
            notification: RatingNotification,
        ) -> impl Future<Output = anyhow::Result<()>> + Send {
            self.on_rating_notification(notification)
        }
    }

    #[test]
    fn test_driver_topics_are_not_consumed() {
        let subscriptions = subscriptions(Arc::new(MockPassengers::new(
            MockPassengerRepository::new(),
            MockPassengerRideRepository::new(),
        )));

        let mut topics: Vec<&str> = subscriptions.topics().map(|topic| topic.name).collect();
        topics.sort_unstable();
        let mut expected = vec![RIDE_PASSENGER_TOPIC.name, PASSENGER_RATING_TOPIC.name];
        expected.sort_unstable();
        assert_eq!(topics, expected);
        assert!(subscriptions.handler(RIDE_DRIVER_TOPIC.name).is_none());
        assert!(subscriptions.handler(DRIVER_RATING_TOPIC.name).is_none());
    }

    #[tokio::test]
    async fn test_events_reach_the_passenger_use_case() {
        let mut passengers = MockPassengerRepository::new();
        passengers
            .expect_update_rating()
            .with(eq(42), eq(4.5))
            .times(1)
            .returning(|_, _| Ok(true));
        let mut rides = MockPassengerRideRepository::new();
        rides
            .expect_upsert()
            .withf(|ride| ride.ride_id == 9 && ride.status == PassengerRideStatus::Accepted)
            .times(1)
            .returning(|_| Ok(()));
        let usecase = Arc::new(MockPassengers::new(passengers, rides));

        let bus = InMemoryEventBus::new();
        let handle = bus.start(subscriptions(Arc::clone(&usecase)));

        publish_json(
            &bus,
            &RIDE_PASSENGER_TOPIC,
            "9".to_string(),
            &sample_notification(9, PassengerRideStatus::Accepted),
        );
        publish_json(
            &bus,
            &PASSENGER_RATING_TOPIC,
            "42".to_string(),
            &RatingNotification {
                user_id: 42,
                user_type: UserType::Passenger,
                new_aggregate_rating: 4.5,
            },
        );
        // Nobody in this service listens on the driver side.
        publish_json(
            &bus,
            &DRIVER_RATING_TOPIC,
            "42".to_string(),
            &RatingNotification {
                user_id: 42,
                user_type: UserType::Passenger,
                new_aggregate_rating: 1.0,
            },
        );
        handle.shutdown().await;

        // Dropping the last reference checks every expectation was met.
        let usecase = Arc::try_unwrap(usecase).ok().unwrap();
        drop(usecase);
    }
}
