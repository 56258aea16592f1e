use std::future::Future;
use std::sync::Arc;

use common::bus::Subscriptions;
use common::events::{DRIVER_RATING_TOPIC, RIDE_DRIVER_TOPIC, RatingNotification, RideNotification};

use crate::DriversService;

/// What the driver service does with each event it consumes.
pub trait DriverEvents: Send + Sync + 'static {
    fn ride_notification(
        &self,
        notification: RideNotification,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn rating_notification(
        &self,
        notification: RatingNotification,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl DriverEvents for DriversService {
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

/// Topics the driver service consumes and the use case each one feeds.
pub fn subscriptions<E: DriverEvents>(drivers: Arc<E>) -> Subscriptions {
    let on_ride = Arc::clone(&drivers);
    let on_rating = drivers;

    Subscriptions::new()
        .on(&RIDE_DRIVER_TOPIC, move |notification: RideNotification| {
            let drivers = Arc::clone(&on_ride);
            async move { drivers.ride_notification(notification).await }
        })
        .on(&DRIVER_RATING_TOPIC, move |notification: RatingNotification| {
            let drivers = Arc::clone(&on_rating);
            async move { drivers.rating_notification(notification).await }
        })
}

#[cfg(test)]
mod tests {
    use common::bus::memory::InMemoryEventBus;
    use common::bus::publish_json;
    use common::events::{PASSENGER_RATING_TOPIC, RIDE_PASSENGER_TOPIC, UserType};
    use common::status::DriverRideStatus;
    use mockall::predicate::eq;

    use super::*;
    use crate::domain::driver::sample_notification;
    use crate::usecase::contracts::{MockDriverRepository, MockDriverRideRepository};
    use crate::usecase::drivers::DriversUseCase;

    type MockDrivers = DriversUseCase<MockDriverRepository, MockDriverRideRepository>;

    impl DriverEvents for MockDrivers {
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
    fn test_only_driver_topics_are_consumed() {
        let subscriptions = subscriptions(Arc::new(MockDrivers::new(
            MockDriverRepository::new(),
            MockDriverRideRepository::new(),
        )));

        let mut topics: Vec<&str> = subscriptions.topics().map(|topic| topic.name).collect();
        topics.sort_unstable();
        let mut expected = vec![RIDE_DRIVER_TOPIC.name, DRIVER_RATING_TOPIC.name];
        expected.sort_unstable();
        assert_eq!(topics, expected);
        assert!(subscriptions.handler(RIDE_PASSENGER_TOPIC.name).is_none());
        assert!(subscriptions.handler(PASSENGER_RATING_TOPIC.name).is_none());
    }

    #[tokio::test]
    async fn test_events_reach_the_driver_use_case() {
        let mut drivers = MockDriverRepository::new();
        drivers
            .expect_update_rating()
            .with(eq(8), eq(3.0))
            .times(1)
            .returning(|_, _| Ok(true));
        let mut rides = MockDriverRideRepository::new();
        rides.expect_find().with(eq(3)).returning(|_| Ok(None));
        rides
            .expect_upsert()
            .withf(|ride, _| ride.ride_id == 3 && ride.status == DriverRideStatus::Accepted)
            .times(1)
            .returning(|_, _| Ok(true));
        let usecase = Arc::new(MockDrivers::new(drivers, rides));

        let bus = InMemoryEventBus::new();
        let handle = bus.start(subscriptions(Arc::clone(&usecase)));

        publish_json(
            &bus,
            &RIDE_DRIVER_TOPIC,
            "3".to_string(),
            &sample_notification(3, Some(8), DriverRideStatus::Accepted),
        );
        publish_json(
            &bus,
            &DRIVER_RATING_TOPIC,
            "8".to_string(),
            &RatingNotification {
                user_id: 8,
                user_type: UserType::Driver,
                new_aggregate_rating: 3.0,
            },
        );
        handle.shutdown().await;

        // Dropping the last reference checks every expectation was met.
        let usecase = Arc::try_unwrap(usecase).ok().unwrap();
        drop(usecase);
    }
}
