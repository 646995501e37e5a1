use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        activity::{bucket_by_day, Activity},
        trip::Trip,
    },
    state::AppState,
    validate::{self, ValidatedJson, ValidatedPath, ValidationErrors},
};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/trips/:trip_id/activities",
        get(list_activities)
            .post(create_activity)
            .delete(delete_activity),
    )
}

#[derive(Debug, Deserialize)]
pub struct CreateActivityBody {
    pub title: String,
    pub occurs_at: DateTime<Utc>,
}

async fn create_activity(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
    ValidatedJson(body): ValidatedJson<CreateActivityBody>,
) -> Result<Json<Value>, AppError> {
    let mut errors = ValidationErrors::default();
    validate::require_min_chars(&mut errors, "title", &body.title, 4);
    errors.into_result()?;

    let trip = Trip::find(&state.db, &trip_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;

    if body.occurs_at < trip.starts_at || body.occurs_at > trip.ends_at {
        return Err(AppError::client(
            "Activity date must fall within the trip dates",
        ));
    }

    let activity = Activity::new(&trip.id, &body.title, body.occurs_at);
    Activity::insert(&state.db, &activity).await?;
    Ok(Json(json!({ "activityId": activity.id })))
}

/// Activities grouped into one bucket per calendar day of the trip, days
/// ascending, activities within a day ascending by occurrence.
async fn list_activities(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let trip = Trip::find(&state.db, &trip_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;

    let activities = Activity::list_for_trip(&state.db, &trip.id).await?;
    let buckets = bucket_by_day(trip.starts_at, trip.ends_at, activities);
    Ok(Json(json!({ "activities": buckets })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteActivityBody {
    pub activity_id: Uuid,
}

async fn delete_activity(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
    ValidatedJson(body): ValidatedJson<DeleteActivityBody>,
) -> Result<StatusCode, AppError> {
    let trip_id = trip_id.to_string();
    Trip::find(&state.db, &trip_id)
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;

    let activity = Activity::find(&state.db, &body.activity_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Activity not found"))?;

    if activity.trip_id != trip_id {
        return Err(AppError::forbidden(
            "Activity does not belong to this trip",
        ));
    }

    Activity::delete(&state.db, &activity.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
