use std::time::Duration;

use common::bus::{EventPublisher, PartitionKeyStrategy, publish_json};
use common::error::{RepositoryError, UsecaseError};
use common::events::{RatingNotification, UserType};

use crate::domain::rating::{NewRating, RatingRecord, average, validate_rating};
use crate::usecase::cache::{CacheKey, CachedRatings, Lookup, RatingCache};
use crate::usecase::contracts::{RatingRepository, RideGate};

pub struct RatingsUseCase<R, G, P>
where
    R: RatingRepository,
    G: RideGate,
    P: EventPublisher,
{
    rating_repository: R,
    ride_gate: G,
    publisher: P,
    cache: RatingCache,
    cache_ttl: Duration,
    key_strategy: PartitionKeyStrategy,
}

impl<R, G, P> RatingsUseCase<R, G, P>
where
    R: RatingRepository,
    G: RideGate,
    P: EventPublisher,
{
    pub fn new(
        rating_repository: R,
        ride_gate: G,
        publisher: P,
        cache_ttl: Duration,
        key_strategy: PartitionKeyStrategy,
    ) -> Self {
        Self {
            rating_repository,
            ride_gate,
            publisher,
            cache: RatingCache::new(),
            cache_ttl,
            key_strategy,
        }
    }

    /// Stores a rating for a ride that the ride service knows about, then
    /// refreshes the user's aggregate.
    #[tracing::instrument(skip(self, comment))]
    pub async fn create_rating(
        &self,
        ride_id: Option<i64>,
        user_id: i64,
        user_type: UserType,
        rating: i16,
        comment: Option<String>,
    ) -> Result<RatingRecord, UsecaseError> {
        tracing::debug!("creating rating");

        let Some(ride_id) = ride_id else {
            return Err(UsecaseError::Validation("Ride id is required".to_string()));
        };
        validate_rating(rating)?;

        self.ride_gate.ensure_ride_exists(ride_id).await?;

        let new_rating = NewRating {
            ride_id,
            user_id,
            user_type,
            rating,
            comment,
        };
        let created = self
            .rating_repository
            .create(&new_rating)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict => {
                    UsecaseError::Conflict("Ride is already rated by this user".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(rating_id = created.id, ride_id, user_id, %user_type, "rating created");
        self.refresh_aggregate(user_type, user_id).await;

        Ok(created)
    }

    #[tracing::instrument(skip(self, comment), fields(rating_id = id))]
    pub async fn update_rating(
        &self,
        id: i64,
        rating: i16,
        comment: Option<String>,
    ) -> Result<RatingRecord, UsecaseError> {
        tracing::debug!("updating rating");

        validate_rating(rating)?;

        let updated = self
            .rating_repository
            .update(id, rating, comment)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Rating".to_string()))?;

        tracing::info!(rating_id = id, "rating updated");
        self.refresh_aggregate(updated.user_type, updated.user_id).await;

        Ok(updated)
    }

    #[tracing::instrument(skip(self), fields(rating_id = id))]
    pub async fn get_rating(&self, id: i64) -> Result<RatingRecord, UsecaseError> {
        self.rating_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Rating".to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_ratings(
        &self,
        user_type: UserType,
        user_id: i64,
    ) -> Result<Vec<RatingRecord>, UsecaseError> {
        Ok(self.cached(user_type, user_id).await?.ratings)
    }

    #[tracing::instrument(skip(self))]
    pub async fn average_rating(&self, user_type: UserType, user_id: i64) -> Result<f64, UsecaseError> {
        Ok(self.cached(user_type, user_id).await?.average)
    }

    async fn cached(&self, user_type: UserType, user_id: i64) -> Result<CachedRatings, UsecaseError> {
        let key = CacheKey::new(user_type, user_id);

        let generation = match self.cache.get(&key) {
            Lookup::Hit(value) => {
                tracing::debug!(key = %key, "cache hit");
                return Ok(value);
            }
            Lookup::Miss { generation } => generation,
        };

        let ratings = self.rating_repository.find_by_user(user_id, user_type).await?;
        let value = CachedRatings {
            average: average(&ratings),
            ratings,
        };
        self.cache.put(key, value.clone(), self.cache_ttl, generation);

        Ok(value)
    }

    /// Drops the cached entry, recomputes the aggregate from the store and
    /// tells the owning service. The rating itself is already stored, so a
    /// failure here is logged rather than returned.
    async fn refresh_aggregate(&self, user_type: UserType, user_id: i64) {
        let key = CacheKey::new(user_type, user_id);
        self.cache.invalidate(&key);

        let ratings = match self.rating_repository.find_by_user(user_id, user_type).await {
            Ok(ratings) => ratings,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "failed to recompute aggregate rating");
                return;
            }
        };

        let notification = RatingNotification {
            user_id,
            user_type,
            new_aggregate_rating: average(&ratings),
        };
        tracing::debug!(
            key = %key,
            aggregate = notification.new_aggregate_rating,
            "aggregate rating recomputed"
        );

        publish_json(
            &self.publisher,
            user_type.rating_topic(),
            self.key_strategy.key(user_id),
            &notification,
        );
    }
}
