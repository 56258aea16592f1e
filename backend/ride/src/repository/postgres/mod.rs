use common::error::RepositoryError;
use common::status::RideStatus;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    domain::ride::{NewRide, Ride},
    usecase::contracts::RideRepository,
};

const RIDE_COLUMNS: &str = r#"
    id, driver_id, passenger_id, address_from, address_to, cost, status,
    created_at, modified_at, deleted
"#;

pub struct PostgresRideRepository {
    pool: PgPool,
}

impl PostgresRideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RideRepository for PostgresRideRepository {
    #[tracing::instrument(skip(self, ride), fields(passenger_id = ride.passenger_id))]
    async fn create(&self, ride: &NewRide) -> Result<Ride, RepositoryError> {
        tracing::debug!("creating ride");

        let created = sqlx::query_as::<_, Ride>(&format!(
            r#"
            INSERT INTO rides (passenger_id, address_from, address_to, cost)
            VALUES ($1, $2, $3, $4)
            RETURNING {RIDE_COLUMNS}
            "#
        ))
        .bind(ride.passenger_id)
        .bind(&ride.address_from)
        .bind(&ride.address_to)
        .bind(ride.cost)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(ride_id = created.id, "ride created successfully");
        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(ride_id = id))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Ride>, RepositoryError> {
        tracing::debug!("finding ride by id");

        let ride = sqlx::query_as::<_, Ride>(&format!(
            r#"
            SELECT {RIDE_COLUMNS}
            FROM rides
            WHERE id = $1 AND deleted = FALSE
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self), fields(passenger_id = passenger_id))]
    async fn find_by_passenger_id(&self, passenger_id: i64) -> Result<Vec<Ride>, RepositoryError> {
        tracing::debug!("finding rides by passenger_id");

        let rides = sqlx::query_as::<_, Ride>(&format!(
            r#"
            SELECT {RIDE_COLUMNS}
            FROM rides
            WHERE passenger_id = $1 AND deleted = FALSE
            ORDER BY created_at DESC
            "#
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(passenger_id, count = rides.len(), "found rides");
        Ok(rides)
    }

    #[tracing::instrument(skip(self), fields(driver_id = driver_id))]
    async fn find_by_driver_id(&self, driver_id: i64) -> Result<Vec<Ride>, RepositoryError> {
        tracing::debug!("finding rides by driver_id");

        let rides = sqlx::query_as::<_, Ride>(&format!(
            r#"
            SELECT {RIDE_COLUMNS}
            FROM rides
            WHERE driver_id = $1 AND deleted = FALSE
            ORDER BY created_at DESC
            "#
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(driver_id, count = rides.len(), "found rides");
        Ok(rides)
    }

    #[tracing::instrument(skip(self, ride), fields(ride_id = ride.id, status = %ride.status, expected = %expected))]
    async fn update_status(&self, ride: &Ride, expected: RideStatus) -> Result<bool, RepositoryError> {
        tracing::debug!("updating ride status");

        let result = sqlx::query(
            r#"
            UPDATE rides
            SET status = $2, driver_id = $3, modified_at = $4
            WHERE id = $1 AND status = $5 AND deleted = FALSE
            "#,
        )
        .bind(ride.id)
        .bind(ride.status)
        .bind(ride.driver_id)
        .bind(ride.audit.modified_at)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(ride_id = ride.id, "ride changed since it was read");
            return Ok(false);
        }

        tracing::debug!(ride_id = ride.id, "ride status updated successfully");
        Ok(true)
    }

    #[tracing::instrument(skip(self), fields(ride_id = id))]
    async fn soft_delete(&self, id: i64) -> Result<(), RepositoryError> {
        tracing::debug!("soft-deleting ride");

        let result = sqlx::query(
            r#"
            UPDATE rides
            SET deleted = TRUE, modified_at = NOW()
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(ride_id = id, "ride soft-deleted successfully");
        Ok(())
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
