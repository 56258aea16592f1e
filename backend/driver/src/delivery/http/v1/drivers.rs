use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::error::UsecaseError;
use serde::Deserialize;
use validator::Validate;

use crate::AppState;

#[derive(Deserialize, Validate)]
pub struct RegisterDriverRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[tracing::instrument(skip(state, payload))]
pub async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterDriverRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(validation_errors.to_string()));
    }

    let driver = state.drivers_usecase.register(payload.name).await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

#[tracing::instrument(skip(state))]
pub async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    let driver = state.drivers_usecase.get_driver(id).await?;
    Ok((StatusCode::OK, Json(driver)))
}

#[tracing::instrument(skip(state))]
pub async fn list_rides(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    let rides = state.drivers_usecase.list_rides(id).await?;
    Ok((StatusCode::OK, Json(rides)))
}

#[tracing::instrument(skip(state))]
pub async fn mark_waiting(
    State(state): State<Arc<AppState>>,
    Path((driver_id, ride_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, UsecaseError> {
    let ride = state.drivers_usecase.mark_waiting(driver_id, ride_id).await?;
    Ok((StatusCode::OK, Json(ride)))
}
