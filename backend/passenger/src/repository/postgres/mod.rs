use common::error::RepositoryError;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    domain::passenger::{Passenger, PassengerRide},
    usecase::contracts::{PassengerRepository, PassengerRideRepository},
};

const PASSENGER_COLUMNS: &str = "id, name, rating, created_at, modified_at, deleted";

const PASSENGER_RIDE_COLUMNS: &str = r#"
    ride_id, passenger_id, driver_id, address_from, address_to, cost, status,
    created_at, modified_at, deleted
"#;

pub struct PostgresPassengerRepository {
    pool: PgPool,
}

impl PostgresPassengerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PassengerRepository for PostgresPassengerRepository {
    #[tracing::instrument(skip(self, name))]
    async fn create(&self, name: String) -> Result<Passenger, RepositoryError> {
        let passenger = sqlx::query_as::<_, Passenger>(&format!(
            r#"
            INSERT INTO passengers (name)
            VALUES ($1)
            RETURNING {PASSENGER_COLUMNS}
            "#
        ))
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(passenger_id = passenger.id, "passenger created successfully");
        Ok(passenger)
    }

    #[tracing::instrument(skip(self), fields(passenger_id = id))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Passenger>, RepositoryError> {
        let passenger = sqlx::query_as::<_, Passenger>(&format!(
            r#"
            SELECT {PASSENGER_COLUMNS}
            FROM passengers
            WHERE id = $1 AND deleted = FALSE
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(passenger)
    }

    #[tracing::instrument(skip(self), fields(passenger_id = id))]
    async fn update_rating(&self, id: i64, rating: f64) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE passengers
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

pub struct PostgresPassengerRideRepository {
    pool: PgPool,
}

impl PostgresPassengerRideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PassengerRideRepository for PostgresPassengerRideRepository {
    #[tracing::instrument(skip(self))]
    async fn find_by_passenger(&self, passenger_id: i64) -> Result<Vec<PassengerRide>, RepositoryError> {
        let rides = sqlx::query_as::<_, PassengerRide>(&format!(
            r#"
            SELECT {PASSENGER_RIDE_COLUMNS}
            FROM passenger_rides
            WHERE passenger_id = $1 AND deleted = FALSE
            ORDER BY modified_at DESC
            "#
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = rides.len(), "found rides");
        Ok(rides)
    }

    #[tracing::instrument(skip(self, ride), fields(ride_id = ride.ride_id, status = ?ride.status))]
    async fn upsert(&self, ride: &PassengerRide) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO passenger_rides
                (ride_id, passenger_id, driver_id, address_from, address_to, cost, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (ride_id) DO UPDATE SET
                passenger_id = EXCLUDED.passenger_id,
                driver_id = EXCLUDED.driver_id,
                address_from = EXCLUDED.address_from,
                address_to = EXCLUDED.address_to,
                cost = EXCLUDED.cost,
                status = EXCLUDED.status,
                modified_at = NOW()
            "#,
        )
        .bind(ride.ride_id)
        .bind(ride.passenger_id)
        .bind(ride.driver_id)
        .bind(&ride.address_from)
        .bind(&ride.address_to)
        .bind(ride.cost)
        .bind(ride.status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
