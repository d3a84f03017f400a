use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use galeries_types::api::{CreateTicketRequest, Envelope};
use galeries_types::models::Role;

use crate::error::ApiError;
use crate::extract::{Body, CurrentUser};
use crate::state::{AppState, run};
use crate::validation::Validator;
use crate::views;

pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Body(req): Body<CreateTicketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .length("header", &req.header, 5, 30)
        .length("body", &req.body, 10, 200)
        .finish()?;

    let user_id = me.id.clone();
    let ticket = run(&state, move |db| {
        Ok(db.create_ticket(&user_id, req.header.trim(), req.body.trim(), Utc::now())?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(Envelope::new("POST", views::ticket(ticket)))))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Admin)?;
    let rows = run(&state, |db| Ok(db.list_tickets()?)).await?;

    let tickets: Vec<_> = rows.into_iter().map(views::ticket).collect();
    Ok(Json(Envelope::new("GET", tickets)))
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(ticket_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Admin)?;
    let id = ticket_id.clone();
    if !run(&state, move |db| Ok(db.delete_ticket(&id)?)).await? {
        return Err(ApiError::not_found("ticket not found"));
    }

    Ok(Json(Envelope::new("DELETE", views::deleted(&ticket_id))))
}
