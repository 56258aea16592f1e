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
pub struct RegisterPassengerRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[tracing::instrument(skip(state, payload))]
pub async fn register_passenger(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterPassengerRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(validation_errors.to_string()));
    }

    let passenger = state.passengers_usecase.register(payload.name).await?;
    Ok((StatusCode::CREATED, Json(passenger)))
}

#[tracing::instrument(skip(state))]
pub async fn get_passenger(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    let passenger = state.passengers_usecase.get_passenger(id).await?;
    Ok((StatusCode::OK, Json(passenger)))
}

#[tracing::instrument(skip(state))]
pub async fn list_rides(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    let rides = state.passengers_usecase.list_rides(id).await?;
    Ok((StatusCode::OK, Json(rides)))
}
