use common::bus::{EventPublisher, PartitionKeyStrategy, publish_json};
use common::error::{RepositoryError, UsecaseError};
use common::events::{RIDE_DRIVER_TOPIC, RIDE_PASSENGER_TOPIC};
use common::status::RideStatus;
use validator::Validate;

use crate::domain::ride::{NewRide, Ride};
use crate::domain::transition;
use crate::usecase::contracts::RideRepository;

pub struct RidesUseCase<R, P>
where
    R: RideRepository,
    P: EventPublisher,
{
    ride_repository: R,
    publisher: P,
    key_strategy: PartitionKeyStrategy,
}

impl<R, P> RidesUseCase<R, P>
where
    R: RideRepository,
    P: EventPublisher,
{
    pub fn new(ride_repository: R, publisher: P, key_strategy: PartitionKeyStrategy) -> Self {
        Self {
            ride_repository,
            publisher,
            key_strategy,
        }
    }

    #[tracing::instrument(skip(self, address_from, address_to))]
    pub async fn create_ride(
        &self,
        passenger_id: i64,
        address_from: String,
        address_to: String,
        cost: f64,
    ) -> Result<Ride, UsecaseError> {
        tracing::debug!("creating ride");

        let new_ride = NewRide::new(passenger_id, address_from, address_to, cost);
        if let Err(validation_errors) = new_ride.validate() {
            tracing::warn!(?validation_errors, "validation failed");
            return Err(UsecaseError::Validation(validation_errors.to_string()));
        }

        let ride = self.ride_repository.create(&new_ride).await?;

        self.notify(&ride);

        tracing::info!(ride_id = ride.id, passenger_id, "ride created");
        Ok(ride)
    }

    #[tracing::instrument(skip(self), fields(ride_id = id))]
    pub async fn get_ride(&self, id: i64) -> Result<Ride, UsecaseError> {
        tracing::debug!("getting ride");

        self.ride_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Ride".to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_by_passenger(&self, passenger_id: i64) -> Result<Vec<Ride>, UsecaseError> {
        tracing::debug!("listing rides by passenger");

        let rides = self.ride_repository.find_by_passenger_id(passenger_id).await?;

        tracing::debug!(passenger_id, count = rides.len(), "retrieved rides");
        Ok(rides)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_by_driver(&self, driver_id: i64) -> Result<Vec<Ride>, UsecaseError> {
        tracing::debug!("listing rides by driver");

        let rides = self.ride_repository.find_by_driver_id(driver_id).await?;

        tracing::debug!(driver_id, count = rides.len(), "retrieved rides");
        Ok(rides)
    }

    /// Validates the move against the status graph, persists it and notifies
    /// the driver and passenger services. Accepting a ride assigns its driver.
    /// The write only lands if the ride is still in the status it was read in.
    #[tracing::instrument(skip(self), fields(ride_id = id, requested = %requested))]
    pub async fn change_status(
        &self,
        id: i64,
        requested: RideStatus,
        driver_id: Option<i64>,
    ) -> Result<Ride, UsecaseError> {
        tracing::debug!("changing ride status");

        let ride = self.get_ride(id).await?;
        let current = ride.status;
        if let Err(e) = transition::check(current, requested) {
            metrics::counter!("ride_transitions_rejected_total", "from" => current.as_str())
                .increment(1);
            return Err(e.into());
        }

        let assigned_driver = match (requested, driver_id) {
            (RideStatus::Accepted, Some(driver_id)) => Some(driver_id),
            (RideStatus::Accepted, None) => {
                return Err(UsecaseError::Validation(
                    "A driver id is required to accept a ride".to_string(),
                ));
            }
            _ => ride.driver_id,
        };

        let mut ride = transition::apply(ride, requested)?;
        ride.driver_id = assigned_driver;
        if !self.ride_repository.update_status(&ride, current).await? {
            metrics::counter!("ride_transitions_rejected_total", "from" => current.as_str())
                .increment(1);
            tracing::warn!(ride_id = id, from = %current, to = %requested, "concurrent status change");
            return Err(UsecaseError::Conflict(
                "Ride status changed, try again".to_string(),
            ));
        }

        self.notify(&ride);

        metrics::counter!("ride_transitions_total", "to" => requested.as_str()).increment(1);
        tracing::info!(ride_id = id, from = %current, to = %requested, "ride status changed");
        Ok(ride)
    }

    #[tracing::instrument(skip(self), fields(ride_id = id))]
    pub async fn delete_ride(&self, id: i64) -> Result<(), UsecaseError> {
        tracing::debug!("deleting ride");

        self.ride_repository.soft_delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => UsecaseError::NotFound("Ride".to_string()),
            other => other.into(),
        })?;

        tracing::info!(ride_id = id, "ride deleted");
        Ok(())
    }

    /// The driver topic is only used once a driver is assigned.
    fn notify(&self, ride: &Ride) {
        let notification = ride.to_notification();

        if ride.driver_id.is_some() {
            publish_json(
                &self.publisher,
                &RIDE_DRIVER_TOPIC,
                self.key_strategy.key(ride.id),
                &notification,
            );
        }
        publish_json(
            &self.publisher,
            &RIDE_PASSENGER_TOPIC,
            self.key_strategy.key(ride.id),
            &notification,
        );
    }
}
