use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{participant::Participant, trip::Trip},
    state::AppState,
    validate::{self, ValidatedJson, ValidatedPath, ValidationErrors},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/participants/:participant_id",
            get(get_participant).delete(delete_participant),
        )
        .route(
            "/participants/:participant_id/confirm",
            get(confirm_by_link).patch(confirm_with_details),
        )
        .route(
            "/trips/:trip_id/participants",
            get(list_participants).patch(add_participant),
        )
        .route("/trips/:trip_id/invites", post(create_invite))
}

async fn get_participant(
    State(state): State<AppState>,
    ValidatedPath(participant_id): ValidatedPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let participant = Participant::find(&state.db, &participant_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Participant not found"))?;
    let trip = Trip::find(&state.db, &participant.trip_id)
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;
    Ok(Json(json!({
        "participant": participant,
        "trip": trip.summary(),
    })))
}

/// One-click confirmation from the invitation email. Idempotent: an already
/// confirmed participant gets the same redirect without a second write.
async fn confirm_by_link(
    State(state): State<AppState>,
    ValidatedPath(participant_id): ValidatedPath<Uuid>,
) -> Result<Response, AppError> {
    let id = participant_id.to_string();
    let participant = Participant::find(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found("Participant not found"))?;

    let confirmed_page = format!(
        "{}/participants/{}/confirmed?tripId={}",
        state.config.web_base_url, participant.id, participant.trip_id
    );
    if participant.is_confirmed {
        return Ok(found(&confirmed_page));
    }

    Participant::confirm(&state.db, &id, None).await?;
    Ok(found(&confirmed_page))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
    pub name: String,
    pub email: String,
}

/// Manual confirmation with name and email. The supplied email must match
/// the invited address, which keeps a guessed participant id useless.
async fn confirm_with_details(
    State(state): State<AppState>,
    ValidatedPath(participant_id): ValidatedPath<Uuid>,
    ValidatedJson(body): ValidatedJson<ConfirmBody>,
) -> Result<Response, AppError> {
    let mut errors = ValidationErrors::default();
    validate::require_min_chars(&mut errors, "name", &body.name, 2);
    validate::require_email(&mut errors, "email", &body.email);
    errors.into_result()?;

    let id = participant_id.to_string();
    let participant = Participant::find(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found("Participant not found"))?;

    if participant.is_confirmed {
        // Distinct payload from the ClientError shape so the frontend can
        // route straight to the trip page.
        return Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "message": "Participant is already confirmed on this trip",
                "tripId": participant.trip_id,
            })),
        )
            .into_response());
    }

    if participant.email != body.email {
        return Err(AppError::client(
            "The supplied email does not match the invited address",
        ));
    }

    Participant::confirm(&state.db, &id, Some(&body.name)).await?;
    Ok(Json(json!({ "ok": true, "tripId": participant.trip_id })).into_response())
}

async fn delete_participant(
    State(state): State<AppState>,
    ValidatedPath(participant_id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    let id = participant_id.to_string();
    let participant = Participant::find(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::not_found("Participant not found"))?;

    if participant.is_owner {
        return Err(AppError::forbidden(
            "The trip owner cannot be removed from the trip",
        ));
    }

    Participant::delete(&state.db, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct ParticipantSummary {
    id: String,
    name: Option<String>,
    email: String,
    is_confirmed: bool,
}

async fn list_participants(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let trip_id = trip_id.to_string();
    Trip::find(&state.db, &trip_id)
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;

    let participants: Vec<ParticipantSummary> = Participant::list_for_trip(&state.db, &trip_id)
        .await?
        .into_iter()
        .map(|participant| ParticipantSummary {
            id: participant.id,
            name: participant.name,
            email: participant.email,
            is_confirmed: participant.is_confirmed,
        })
        .collect();
    Ok(Json(json!({ "participants": participants })))
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantBody {
    pub name: String,
    pub email: String,
}

/// Owner-gated invite: rejects duplicate emails on the trip before inserting.
async fn add_participant(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
    ValidatedJson(body): ValidatedJson<AddParticipantBody>,
) -> Result<Json<Value>, AppError> {
    let mut errors = ValidationErrors::default();
    validate::require_min_chars(&mut errors, "name", &body.name, 2);
    validate::require_email(&mut errors, "email", &body.email);
    errors.into_result()?;

    let trip = Trip::find(&state.db, &trip_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;

    // Every trip gets its owner row in the same transaction that creates it,
    // so a missing owner means corrupted data rather than a user mistake.
    if Participant::find_owner(&state.db, &trip.id).await?.is_none() {
        return Err(AppError::client("Trip has no owner participant"));
    }

    if Participant::find_by_email(&state.db, &trip.id, &body.email)
        .await?
        .is_some()
    {
        return Err(AppError::conflict("Email already invited on this trip"));
    }

    let participant = Participant::invitee(&trip.id, Some(&body.name), &body.email);
    Participant::insert(&state.db, &participant).await?;
    state.mailer.send_invitation(&trip, &participant).await?;

    Ok(Json(json!({
        "message": "Participant added successfully",
        "participantId": participant.id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct InviteBody {
    pub email: String,
}

/// Standalone invite. Unlike add_participant this path does not check for a
/// duplicate email on the trip.
async fn create_invite(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
    ValidatedJson(body): ValidatedJson<InviteBody>,
) -> Result<Json<Value>, AppError> {
    let mut errors = ValidationErrors::default();
    validate::require_email(&mut errors, "email", &body.email);
    errors.into_result()?;

    let trip = Trip::find(&state.db, &trip_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;

    let participant = Participant::invitee(&trip.id, None, &body.email);
    Participant::insert(&state.db, &participant).await?;
    state
        .mailer
        .send_invite_confirmation(&trip, &participant)
        .await?;

    Ok(Json(json!({ "participantId": participant.id })))
}

fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}
