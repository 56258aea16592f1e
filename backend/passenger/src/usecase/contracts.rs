use common::error::RepositoryError;

use crate::domain::passenger::{Passenger, PassengerRide};

#[cfg_attr(test, mockall::automock)]
pub trait PassengerRepository: Send + Sync {
    async fn create(&self, name: String) -> Result<Passenger, RepositoryError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Passenger>, RepositoryError>;
    /// Returns `false` when no live passenger has this id.
    async fn update_rating(&self, id: i64, rating: f64) -> Result<bool, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait PassengerRideRepository: Send + Sync {
    async fn find_by_passenger(&self, passenger_id: i64) -> Result<Vec<PassengerRide>, RepositoryError>;
    /// Inserts the ride or overwrites the stored copy, keeping its creation time.
    async fn upsert(&self, ride: &PassengerRide) -> Result<(), RepositoryError>;
}
