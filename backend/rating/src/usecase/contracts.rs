use common::error::{RepositoryError, UsecaseError};
use common::events::UserType;

use crate::domain::rating::{NewRating, RatingRecord};

#[cfg_attr(test, mockall::automock)]
pub trait RatingRepository: Send + Sync {
    /// Fails with `Conflict` when the user already rated this ride.
    async fn create(&self, rating: &NewRating) -> Result<RatingRecord, RepositoryError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<RatingRecord>, RepositoryError>;
    async fn find_by_user(
        &self,
        user_id: i64,
        user_type: UserType,
    ) -> Result<Vec<RatingRecord>, RepositoryError>;
    /// Returns `None` when no live rating has this id.
    async fn update(
        &self,
        id: i64,
        rating: i16,
        comment: Option<String>,
    ) -> Result<Option<RatingRecord>, RepositoryError>;
}

/// Confirms a ride exists before a rating referencing it is stored.
#[cfg_attr(test, mockall::automock)]
pub trait RideGate: Send + Sync {
    /// `NotFound` when the ride does not exist, `Unavailable` when the ride
    /// service cannot be reached or the circuit is open.
    async fn ensure_ride_exists(&self, ride_id: i64) -> Result<(), UsecaseError>;
}
