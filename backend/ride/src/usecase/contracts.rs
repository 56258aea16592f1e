use common::error::RepositoryError;
use common::status::RideStatus;

use crate::domain::ride::{NewRide, Ride};

#[cfg_attr(test, mockall::automock)]
pub trait RideRepository: Send + Sync {
    async fn create(&self, ride: &NewRide) -> Result<Ride, RepositoryError>;
    /// Soft-deleted rides are never returned.
    async fn find_by_id(&self, id: i64) -> Result<Option<Ride>, RepositoryError>;
    async fn find_by_passenger_id(&self, passenger_id: i64) -> Result<Vec<Ride>, RepositoryError>;
    async fn find_by_driver_id(&self, driver_id: i64) -> Result<Vec<Ride>, RepositoryError>;
    /// Persists status, driver and modification time of an existing ride,
    /// provided its stored status is still `expected`. Returns `false` when
    /// another write got there first.
    async fn update_status(&self, ride: &Ride, expected: RideStatus) -> Result<bool, RepositoryError>;
    async fn soft_delete(&self, id: i64) -> Result<(), RepositoryError>;
}
