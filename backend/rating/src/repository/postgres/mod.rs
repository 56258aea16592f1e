use common::error::RepositoryError;
use common::events::UserType;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    domain::rating::{NewRating, RatingRecord},
    usecase::contracts::RatingRepository,
};

const RATING_COLUMNS: &str = r#"
    id, ride_id, user_id, user_type, rating, comment,
    created_at, modified_at, deleted
"#;

pub struct PostgresRatingRepository {
    pool: PgPool,
}

impl PostgresRatingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RatingRepository for PostgresRatingRepository {
    #[tracing::instrument(skip(self, rating), fields(ride_id = rating.ride_id, user_id = rating.user_id))]
    async fn create(&self, rating: &NewRating) -> Result<RatingRecord, RepositoryError> {
        tracing::debug!("creating rating");

        let created = sqlx::query_as::<_, RatingRecord>(&format!(
            r#"
            INSERT INTO ratings (ride_id, user_id, user_type, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RATING_COLUMNS}
            "#
        ))
        .bind(rating.ride_id)
        .bind(rating.user_id)
        .bind(rating.user_type)
        .bind(rating.rating)
        .bind(&rating.comment)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(rating_id = created.id, "rating created successfully");
        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(rating_id = id))]
    async fn find_by_id(&self, id: i64) -> Result<Option<RatingRecord>, RepositoryError> {
        let rating = sqlx::query_as::<_, RatingRecord>(&format!(
            r#"
            SELECT {RATING_COLUMNS}
            FROM ratings
            WHERE id = $1 AND deleted = FALSE
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rating)
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_user(
        &self,
        user_id: i64,
        user_type: UserType,
    ) -> Result<Vec<RatingRecord>, RepositoryError> {
        tracing::debug!("finding ratings by user");

        let ratings = sqlx::query_as::<_, RatingRecord>(&format!(
            r#"
            SELECT {RATING_COLUMNS}
            FROM ratings
            WHERE user_id = $1 AND user_type = $2 AND deleted = FALSE
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .bind(user_type)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = ratings.len(), "found ratings");
        Ok(ratings)
    }

    #[tracing::instrument(skip(self, comment), fields(rating_id = id))]
    async fn update(
        &self,
        id: i64,
        rating: i16,
        comment: Option<String>,
    ) -> Result<Option<RatingRecord>, RepositoryError> {
        tracing::debug!("updating rating");

        let updated = sqlx::query_as::<_, RatingRecord>(&format!(
            r#"
            UPDATE ratings
            SET rating = $2, comment = $3, modified_at = NOW()
            WHERE id = $1 AND deleted = FALSE
            RETURNING {RATING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(rating)
        .bind(comment)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
