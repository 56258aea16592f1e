use common::error::RepositoryError;
use common::status::DriverRideStatus;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    domain::driver::{Driver, DriverRide},
    usecase::contracts::{DriverRepository, DriverRideRepository},
};

const DRIVER_COLUMNS: &str = "id, name, rating, created_at, modified_at, deleted";

const DRIVER_RIDE_COLUMNS: &str = r#"
    ride_id, driver_id, passenger_id, address_from, address_to, cost, status,
    created_at, modified_at, deleted
"#;

pub struct PostgresDriverRepository {
    pool: PgPool,
}

impl PostgresDriverRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DriverRepository for PostgresDriverRepository {
    #[tracing::instrument(skip(self, name))]
    async fn create(&self, name: String) -> Result<Driver, RepositoryError> {
        let driver = sqlx::query_as::<_, Driver>(&format!(
            r#"
            INSERT INTO drivers (name)
            VALUES ($1)
            RETURNING {DRIVER_COLUMNS}
            "#
        ))
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(driver_id = driver.id, "driver created successfully");
        Ok(driver)
    }

    #[tracing::instrument(skip(self), fields(driver_id = id))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Driver>, RepositoryError> {
        let driver = sqlx::query_as::<_, Driver>(&format!(
            r#"
            SELECT {DRIVER_COLUMNS}
            FROM drivers
            WHERE id = $1 AND deleted = FALSE
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self), fields(driver_id = id))]
    async fn update_rating(&self, id: i64, rating: f64) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE drivers
            SET rating = $2, modified_at = NOW()
            WHERE id = $1 AND deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(rating)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct PostgresDriverRideRepository {
    pool: PgPool,
}

impl PostgresDriverRideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DriverRideRepository for PostgresDriverRideRepository {
    #[tracing::instrument(skip(self))]
    async fn find(&self, ride_id: i64) -> Result<Option<DriverRide>, RepositoryError> {
        let ride = sqlx::query_as::<_, DriverRide>(&format!(
            r#"
            SELECT {DRIVER_RIDE_COLUMNS}
            FROM driver_rides
            WHERE ride_id = $1 AND deleted = FALSE
            "#
        ))
        .bind(ride_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_driver(&self, driver_id: i64) -> Result<Vec<DriverRide>, RepositoryError> {
        let rides = sqlx::query_as::<_, DriverRide>(&format!(
            r#"
            SELECT {DRIVER_RIDE_COLUMNS}
            FROM driver_rides
            WHERE driver_id = $1 AND deleted = FALSE
            ORDER BY modified_at DESC
            "#
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = rides.len(), "found rides");
        Ok(rides)
    }

    #[tracing::instrument(skip(self, ride), fields(ride_id = ride.ride_id, status = ?ride.status, expected = ?expected))]
    async fn upsert(
        &self,
        ride: &DriverRide,
        expected: Option<DriverRideStatus>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO driver_rides
                (ride_id, driver_id, passenger_id, address_from, address_to, cost, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (ride_id) DO UPDATE SET
                driver_id = EXCLUDED.driver_id,
                passenger_id = EXCLUDED.passenger_id,
                address_from = EXCLUDED.address_from,
                address_to = EXCLUDED.address_to,
                cost = EXCLUDED.cost,
                status = EXCLUDED.status,
                modified_at = NOW()
            WHERE driver_rides.status = $9
            "#,
        )
        .bind(ride.ride_id)
        .bind(ride.driver_id)
        .bind(ride.passenger_id)
        .bind(&ride.address_from)
        .bind(&ride.address_to)
        .bind(ride.cost)
        .bind(ride.status)
        .bind(ride.audit.created_at)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self))]
    async fn update_status_if(
        &self,
        ride_id: i64,
        driver_id: i64,
        from: DriverRideStatus,
        to: DriverRideStatus,
    ) -> Result<Option<DriverRide>, RepositoryError> {
        let ride = sqlx::query_as::<_, DriverRide>(&format!(
            r#"
            UPDATE driver_rides
            SET status = $4, modified_at = NOW()
            WHERE ride_id = $1 AND driver_id = $2 AND status = $3 AND deleted = FALSE
            RETURNING {DRIVER_RIDE_COLUMNS}
            "#
        ))
        .bind(ride_id)
        .bind(driver_id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ride)
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
