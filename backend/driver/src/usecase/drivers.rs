use common::error::UsecaseError;
use common::events::{RatingNotification, RideNotification, UserType};
use common::status::DriverRideStatus;

use crate::domain::driver::{Driver, DriverRide};
use crate::usecase::contracts::{DriverRepository, DriverRideRepository};

const MAX_SAVE_ATTEMPTS: u32 = 3;

pub struct DriversUseCase<D, R>
where
    D: DriverRepository,
    R: DriverRideRepository,
{
    driver_repository: D,
    ride_repository: R,
}

impl<D, R> DriversUseCase<D, R>
where
    D: DriverRepository,
    R: DriverRideRepository,
{
    pub fn new(driver_repository: D, ride_repository: R) -> Self {
        Self {
            driver_repository,
            ride_repository,
        }
    }

    #[tracing::instrument(skip(self, name))]
    pub async fn register(&self, name: String) -> Result<Driver, UsecaseError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(UsecaseError::Validation("Name must not be empty".to_string()));
        }

        let driver = self.driver_repository.create(name).await?;

        tracing::info!(driver_id = driver.id, "driver registered");
        Ok(driver)
    }

    #[tracing::instrument(skip(self), fields(driver_id = id))]
    pub async fn get_driver(&self, id: i64) -> Result<Driver, UsecaseError> {
        self.driver_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Driver".to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_rides(&self, driver_id: i64) -> Result<Vec<DriverRide>, UsecaseError> {
        let rides = self.ride_repository.find_by_driver(driver_id).await?;

        tracing::debug!(driver_id, count = rides.len(), "retrieved rides");
        Ok(rides)
    }

    /// The driver reached the pickup point and waits for the passenger.
    #[tracing::instrument(skip(self))]
    pub async fn mark_waiting(&self, driver_id: i64, ride_id: i64) -> Result<DriverRide, UsecaseError> {
        let ride = self
            .ride_repository
            .find(ride_id)
            .await?
            .filter(|ride| ride.driver_id == driver_id)
            .ok_or_else(|| UsecaseError::NotFound("Ride".to_string()))?;

        if ride.status != DriverRideStatus::OnWayForPassenger {
            return Err(UsecaseError::Conflict(
                "Only a ride on the way for the passenger can start waiting".to_string(),
            ));
        }

        // A notification may have moved the ride since it was read.
        let updated = self
            .ride_repository
            .update_status_if(
                ride_id,
                driver_id,
                DriverRideStatus::OnWayForPassenger,
                DriverRideStatus::Waiting,
            )
            .await?
            .ok_or_else(|| {
                UsecaseError::Conflict("Ride status changed, try again".to_string())
            })?;

        tracing::info!(driver_id, ride_id, "driver waiting for passenger");
        Ok(updated)
    }

    /// Applies a ride notification to the local read-state. The ride service
    /// owns the transition graph, so the status is taken as given, except that
    /// a local `Waiting` absorbs the super-state it refines. The write is
    /// guarded by the status it was computed from, so a concurrent
    /// `mark_waiting` forces a re-read instead of being overwritten.
    #[tracing::instrument(skip(self, notification), fields(ride_id = notification.id))]
    pub async fn on_ride_notification(&self, notification: RideNotification) -> anyhow::Result<()> {
        let Some(driver_id) = notification.driver_id else {
            tracing::debug!("ride has no driver, ignoring");
            return Ok(());
        };

        for attempt in 1..=MAX_SAVE_ATTEMPTS {
            let mut ride = DriverRide::from_notification(&notification, driver_id);
            let existing = self.ride_repository.find(notification.id).await?;
            let expected = existing.map(|existing| {
                ride.status = existing.status.absorb(notification.driver_ride_status);
                ride.audit.created_at = existing.audit.created_at;
                existing.status
            });

            if self.ride_repository.upsert(&ride, expected).await? {
                tracing::info!(driver_id, status = ?ride.status, "driver ride updated");
                return Ok(());
            }
            tracing::debug!(attempt, "driver ride changed concurrently, retrying");
        }

        anyhow::bail!("driver ride {} kept changing, giving up", notification.id)
    }

    #[tracing::instrument(skip(self, notification), fields(user_id = notification.user_id))]
    pub async fn on_rating_notification(&self, notification: RatingNotification) -> anyhow::Result<()> {
        if notification.user_type != UserType::Driver {
            tracing::warn!(user_type = %notification.user_type, "rating for another role, ignoring");
            return Ok(());
        }

        let updated = self
            .driver_repository
            .update_rating(notification.user_id, notification.new_aggregate_rating)
            .await?;

        if updated {
            tracing::info!(rating = notification.new_aggregate_rating, "driver rating updated");
        } else {
            metrics::counter!("rating_updates_skipped_total", "reason" => "unknown_driver")
                .increment(1);
            tracing::warn!("rating for unknown driver, skipping");
        }
        Ok(())
    }
}
