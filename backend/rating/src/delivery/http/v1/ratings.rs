use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::error::UsecaseError;
use common::events::UserType;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::domain::rating::RatingRecord;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRatingRequest {
    pub ride_id: Option<i64>,
    pub user_id: i64,
    pub user_type: UserType,
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateRatingRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageRatingResponse {
    pub user_id: i64,
    pub user_type: UserType,
    pub average_rating: f64,
}

#[tracing::instrument(skip(state, payload), fields(user_id = payload.user_id, user_type = %payload.user_type))]
pub async fn create_rating(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRatingRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling create rating request");

    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(validation_errors.to_string()));
    }

    let rating = state
        .ratings_usecase
        .create_rating(
            payload.ride_id,
            payload.user_id,
            payload.user_type,
            payload.rating,
            payload.comment,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(rating)))
}

#[tracing::instrument(skip(state, payload))]
pub async fn update_rating(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRatingRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling update rating request");

    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(validation_errors.to_string()));
    }

    let rating = state
        .ratings_usecase
        .update_rating(id, payload.rating, payload.comment)
        .await?;

    Ok((StatusCode::OK, Json(rating)))
}

#[tracing::instrument(skip(state))]
pub async fn get_rating(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    let rating = state.ratings_usecase.get_rating(id).await?;
    Ok((StatusCode::OK, Json(rating)))
}

#[tracing::instrument(skip(state))]
pub async fn list_driver_ratings(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    list_ratings(&state, UserType::Driver, driver_id).await
}

#[tracing::instrument(skip(state))]
pub async fn list_passenger_ratings(
    State(state): State<Arc<AppState>>,
    Path(passenger_id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    list_ratings(&state, UserType::Passenger, passenger_id).await
}

#[tracing::instrument(skip(state))]
pub async fn driver_average(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    average(&state, UserType::Driver, driver_id).await
}

#[tracing::instrument(skip(state))]
pub async fn passenger_average(
    State(state): State<Arc<AppState>>,
    Path(passenger_id): Path<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    average(&state, UserType::Passenger, passenger_id).await
}

async fn list_ratings(
    state: &AppState,
    user_type: UserType,
    user_id: i64,
) -> Result<Json<Vec<RatingRecord>>, UsecaseError> {
    let ratings = state.ratings_usecase.list_ratings(user_type, user_id).await?;
    Ok(Json(ratings))
}

async fn average(
    state: &AppState,
    user_type: UserType,
    user_id: i64,
) -> Result<Json<AverageRatingResponse>, UsecaseError> {
    let average_rating = state.ratings_usecase.average_rating(user_type, user_id).await?;
    Ok(Json(AverageRatingResponse {
        user_id,
        user_type,
        average_rating,
    }))
}
