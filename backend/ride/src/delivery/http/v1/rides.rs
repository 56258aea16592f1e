use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::error::UsecaseError;
use common::status::RideStatus;
use serde::Deserialize;
use validator::Validate;

use crate::AppState;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRideRequest {
    pub passenger_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub address_from: String,
    #[validate(length(min = 1, max = 255))]
    pub address_to: String,
    #[validate(range(min = 0.0))]
    pub cost: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    pub status: RideStatus,
    pub driver_id: Option<i64>,
}

#[tracing::instrument(skip(state, payload), fields(passenger_id = payload.passenger_id))]
pub async fn create_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRideRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling create ride request");

    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(validation_errors.to_string()));
    }

    let ride = state
        .rides_usecase
        .create_ride(
            payload.passenger_id,
            payload.address_from,
            payload.address_to,
            payload.cost,
        )
        .await?;

    tracing::debug!(ride_id = ride.id, "ride created");
    Ok((StatusCode::CREATED, Json(ride)))
}

#[tracing::instrument(skip(state))]
pub async fn get_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling get ride request");

    let ride = state.rides_usecase.get_ride(id).await?;
    Ok((StatusCode::OK, Json(ride)))
}

#[tracing::instrument(skip(state, payload), fields(requested = %payload.status))]
pub async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<ChangeStatusRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling change status request");

    let ride = state
        .rides_usecase
        .change_status(id, payload.status, payload.driver_id)
        .await?;

    Ok((StatusCode::OK, Json(ride)))
}

#[tracing::instrument(skip(state))]
pub async fn delete_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling delete ride request");

    state.rides_usecase.delete_ride(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state))]
pub async fn list_passenger_rides(
    State(state): State<Arc<AppState>>,
    Path(passenger_id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    let rides = state.rides_usecase.list_by_passenger(passenger_id).await?;
    Ok((StatusCode::OK, Json(rides)))
}

#[tracing::instrument(skip(state))]
pub async fn list_driver_rides(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    let rides = state.rides_usecase.list_by_driver(driver_id).await?;
    Ok((StatusCode::OK, Json(rides)))
}
