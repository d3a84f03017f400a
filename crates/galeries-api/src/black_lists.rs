use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use galeries_db::black_lists::{BlackListOutcome, ExpiryChange};
use galeries_types::api::{CreateBlackListRequest, Envelope, ExpireBlackListsResponse, UpdateBlackListRequest};
use galeries_types::models::Role;

use crate::error::ApiError;
use crate::extract::{Body, CurrentUser};
use crate::state::{AppState, run};
use crate::validation::{Validator, expires_at, field_error};
use crate::views;

pub async fn create_black_list(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(user_id): Path<String>,
    Body(req): Body<CreateBlackListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Moderator)?;
    Validator::new()
        .length("reason", &req.reason, 1, 200)
        .expiry_hours("expires_in_hours", req.expires_in_hours)
        .finish()?;
    if user_id == me.id {
        return Err(ApiError::bad_request("you cannot black list yourself"));
    }

    let actor = me.0.clone();
    let outcome = run(&state, move |db| {
        let target = db
            .get_user(&user_id)?
            .ok_or_else(|| ApiError::not_found("user not found"))?;
        if target.role >= actor.role {
            return Err(ApiError::unauthorized("you're not allowed to black list this user"));
        }

        let now = Utc::now();
        let time = req
            .expires_in_hours
            .map(|hours| expires_at("expires_in_hours", now, hours))
            .transpose()?;
        Ok(db.create_black_list(&target.id, &actor.id, req.reason.trim(), time, now)?)
    })
    .await?;

    match outcome {
        BlackListOutcome::Created(row) => {
            info!("Moderator {} black listed user {}", me.id, row.user_id);
            Ok((StatusCode::CREATED, Json(Envelope::new("POST", views::black_list(row)))))
        }
        BlackListOutcome::UserNotFound => Err(ApiError::not_found("user not found")),
        BlackListOutcome::AlreadyBlackListed => Err(ApiError::bad_request("user is already black listed")),
    }
}

pub async fn list_black_lists(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Moderator)?;
    let rows = run(&state, |db| Ok(db.list_black_lists()?)).await?;

    let black_lists: Vec<_> = rows.into_iter().map(views::black_list).collect();
    Ok(Json(Envelope::new("GET", black_lists)))
}

/// Expired rows are removed on read and answer 404.
pub async fn get_black_list(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(black_list_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Moderator)?;
    let row = run(&state, move |db| {
        db.get_black_list(&black_list_id, Utc::now())?
            .ok_or_else(|| ApiError::not_found("black list not found"))
    })
    .await?;

    Ok(Json(Envelope::new("GET", views::black_list(row))))
}

pub async fn update_black_list(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(black_list_id): Path<String>,
    Body(req): Body<UpdateBlackListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Moderator)?;
    let mut validator = Validator::new();
    if let Some(reason) = req.reason.as_deref() {
        validator.length("reason", reason, 1, 200);
    }
    validator.expiry_hours("expires_in_hours", req.expires_in_hours).finish()?;
    if req.permanent && req.expires_in_hours.is_some() {
        return Err(field_error("permanent", "cannot be combined with expires_in_hours"));
    }

    let actor_id = me.id.clone();
    let row = run(&state, move |db| {
        let now = Utc::now();
        let expiry = match req.expires_in_hours {
            Some(hours) => ExpiryChange::At(expires_at("expires_in_hours", now, hours)?),
            None if req.permanent => ExpiryChange::Never,
            None => ExpiryChange::Keep,
        };
        let reason = req.reason.as_deref().map(str::trim);
        db.update_black_list(&black_list_id, reason, expiry, &actor_id, now)?
            .ok_or_else(|| ApiError::not_found("black list not found"))
    })
    .await?;

    Ok(Json(Envelope::new("PUT", views::black_list(row))))
}

pub async fn delete_black_list(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(black_list_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Moderator)?;
    let id = black_list_id.clone();
    let user_id = run(&state, move |db| {
        db.delete_black_list(&id, Utc::now())?
            .ok_or_else(|| ApiError::not_found("black list not found"))
    })
    .await?;

    info!("Moderator {} lifted black list {} of user {}", me.id, black_list_id, user_id);
    Ok(Json(Envelope::new("DELETE", views::deleted(&black_list_id))))
}

/// Deactivate every black-list whose expiry has passed.
pub async fn expire_black_lists(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Admin)?;
    let deactivated = run(&state, |db| Ok(db.expire_black_lists(Utc::now())?)).await?;

    info!("Black-list sweep deactivated {} rows", deactivated);
    Ok(Json(Envelope::new("POST", ExpireBlackListsResponse { deactivated })))
}
