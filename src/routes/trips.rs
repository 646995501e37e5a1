use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{participant::Participant, trip::Trip},
    state::AppState,
    validate::{self, ValidatedJson, ValidatedPath, ValidatedQuery, ValidationErrors},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", post(create_trip))
        .route(
            "/trips/:trip_id",
            get(get_trip).patch(update_trip).delete(delete_trip),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateTripBody {
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub owner_name: String,
    pub owner_email: String,
    pub emails_to_invite: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTripResponse {
    trip_id: String,
    participant_id: String,
}

async fn create_trip(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateTripBody>,
) -> Result<Json<CreateTripResponse>, AppError> {
    let mut errors = ValidationErrors::default();
    validate::require_min_chars(&mut errors, "destination", &body.destination, 4);
    validate::require_email(&mut errors, "owner_email", &body.owner_email);
    for (index, email) in body.emails_to_invite.iter().enumerate() {
        if !validate::is_email(email) {
            errors.push(
                format!("emails_to_invite.{index}"),
                "must be a valid email address",
            );
        }
    }
    errors.into_result()?;

    if body.starts_at < Utc::now() {
        return Err(AppError::client("Trip start date must be in the future"));
    }
    if body.ends_at < body.starts_at {
        return Err(AppError::client("Trip end date must be after the start date"));
    }

    let (trip, owner, invitees) = Trip::create_with_participants(
        &state.db,
        &body.destination,
        body.starts_at,
        body.ends_at,
        &body.owner_name,
        &body.owner_email,
        &body.emails_to_invite,
    )
    .await?;

    // Settle-all fan-out: every recipient gets its own send, and a failure is
    // logged without aborting the request or the other sends. The rows are
    // already committed at this point.
    let owner_send = {
        let trip = &trip;
        let owner = &owner;
        let mailer = &state.mailer;
        async move {
            if let Err(err) = mailer.send_trip_created(trip, owner).await {
                warn!(email = %owner.email, "failed to send trip confirmation: {err:?}");
            }
        }
    };
    let invitee_sends = invitees.iter().map(|participant| {
        let trip = &trip;
        let mailer = &state.mailer;
        async move {
            if let Err(err) = mailer.send_invitation(trip, participant).await {
                warn!(email = %participant.email, "failed to send invitation: {err:?}");
            }
        }
    });
    tokio::join!(owner_send, join_all(invitee_sends));

    Ok(Json(CreateTripResponse {
        trip_id: trip.id,
        participant_id: owner.id,
    }))
}

async fn get_trip(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let trip = Trip::find(&state.db, &trip_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;
    Ok(Json(json!({ "trip": trip.summary() })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTripBody {
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantQuery {
    pub participant_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTripResponse {
    trip_id: String,
    trip: Trip,
}

async fn update_trip(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
    ValidatedQuery(query): ValidatedQuery<ParticipantQuery>,
    ValidatedJson(body): ValidatedJson<UpdateTripBody>,
) -> Result<Json<UpdateTripResponse>, AppError> {
    let mut errors = ValidationErrors::default();
    validate::require_min_chars(&mut errors, "destination", &body.destination, 4);
    errors.into_result()?;

    let trip_id = trip_id.to_string();
    Trip::find(&state.db, &trip_id)
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;

    // The gate only checks that the participant exists and owns *a* trip,
    // not that it belongs to this one.
    let participant = Participant::find(&state.db, &query.participant_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Participant not found"))?;
    if !participant.is_owner {
        return Err(AppError::forbidden(
            "Only the trip owner can change trip details",
        ));
    }

    if body.starts_at < Utc::now() {
        return Err(AppError::client("Trip start date must be in the future"));
    }
    if body.ends_at < body.starts_at {
        return Err(AppError::client("Trip end date must be after the start date"));
    }

    let trip = Trip::update_details(
        &state.db,
        &trip_id,
        &body.destination,
        body.starts_at,
        body.ends_at,
    )
    .await?
    .ok_or_else(|| AppError::not_found("Trip not found"))?;

    Ok(Json(UpdateTripResponse {
        trip_id: trip.id.clone(),
        trip,
    }))
}

async fn delete_trip(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
    ValidatedQuery(query): ValidatedQuery<ParticipantQuery>,
) -> Result<Json<Value>, AppError> {
    let trip_id = trip_id.to_string();
    Trip::find(&state.db, &trip_id)
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;

    let owner = Participant::find_owner(&state.db, &trip_id).await?;
    let authorized = owner
        .map(|owner| owner.id == query.participant_id.to_string())
        .unwrap_or(false);
    if !authorized {
        return Err(AppError::forbidden(
            "Only the trip owner can cancel this trip",
        ));
    }

    Trip::delete(&state.db, &trip_id).await?;
    Ok(Json(json!({ "message": "Trip has been canceled successfully" })))
}
