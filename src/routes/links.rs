use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{link::Link, trip::Trip},
    state::AppState,
    validate::{self, ValidatedJson, ValidatedPath, ValidationErrors},
};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/trips/:trip_id/links",
        get(list_links).post(create_link).delete(delete_link),
    )
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkBody {
    pub title: String,
    pub url: String,
}

async fn create_link(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
    ValidatedJson(body): ValidatedJson<CreateLinkBody>,
) -> Result<Json<Value>, AppError> {
    let mut errors = ValidationErrors::default();
    validate::require_min_chars(&mut errors, "title", &body.title, 4);
    validate::require_url(&mut errors, "url", &body.url);
    errors.into_result()?;

    let trip = Trip::find(&state.db, &trip_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;

    let link = Link::new(&trip.id, &body.title, &body.url);
    Link::insert(&state.db, &link).await?;
    Ok(Json(json!({ "linkId": link.id })))
}

async fn list_links(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let trip_id = trip_id.to_string();
    Trip::find(&state.db, &trip_id)
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;

    let links = Link::list_for_trip(&state.db, &trip_id).await?;
    Ok(Json(json!({ "links": links })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteLinkBody {
    pub link_id: Uuid,
}

async fn delete_link(
    State(state): State<AppState>,
    ValidatedPath(trip_id): ValidatedPath<Uuid>,
    ValidatedJson(body): ValidatedJson<DeleteLinkBody>,
) -> Result<StatusCode, AppError> {
    let trip_id = trip_id.to_string();
    Trip::find(&state.db, &trip_id)
        .await?
        .ok_or_else(|| AppError::not_found("Trip not found"))?;

    let link = Link::find(&state.db, &body.link_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Link not found"))?;

    if link.trip_id != trip_id {
        return Err(AppError::client("Link does not belong to this trip"));
    }

    Link::delete(&state.db, &link.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
