use common::error::RepositoryError;
use common::status::DriverRideStatus;

use crate::domain::driver::{Driver, DriverRide};

#[cfg_attr(test, mockall::automock)]
pub trait DriverRepository: Send + Sync {
    async fn create(&self, name: String) -> Result<Driver, RepositoryError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Driver>, RepositoryError>;
    /// Returns `false` when no live driver has this id.
    async fn update_rating(&self, id: i64, rating: f64) -> Result<bool, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait DriverRideRepository: Send + Sync {
    async fn find(&self, ride_id: i64) -> Result<Option<DriverRide>, RepositoryError>;
    async fn find_by_driver(&self, driver_id: i64) -> Result<Vec<DriverRide>, RepositoryError>;
    /// Inserts the ride when `expected` is `None`, otherwise overwrites the
    /// stored copy while its status is still `expected`. Returns `false` when
    /// the stored row did not match, leaving it untouched.
    async fn upsert(
        &self,
        ride: &DriverRide,
        expected: Option<DriverRideStatus>,
    ) -> Result<bool, RepositoryError>;
    /// Moves the ride to `to` only while it is still in `from`.
    /// Returns the updated ride, or `None` when nothing matched.
    async fn update_status_if(
        &self,
        ride_id: i64,
        driver_id: i64,
        from: DriverRideStatus,
        to: DriverRideStatus,
    ) -> Result<Option<DriverRide>, RepositoryError>;
}
