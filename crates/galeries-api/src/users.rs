use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::info;

use galeries_types::api::{ChangeRoleRequest, DeleteAccountRequest, Envelope};
use galeries_types::models::Role;

use crate::auth::{clear_refresh_cookie, verify_password};
use crate::error::ApiError;
use crate::extract::{Body, CurrentUser};
use crate::state::{AppState, run};
use crate::validation::field_error;
use crate::views;

pub async fn get_me(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    // Re-read so has_new_notifications is current.
    let user_id = me.id.clone();
    let user = run(&state, move |db| {
        db.get_user(&user_id)?
            .ok_or_else(|| ApiError::not_found("user not found"))
    })
    .await?;

    Ok(Json(Envelope::new("GET", views::me(&user))))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run(&state, move |db| {
        db.get_user(&user_id)?
            .ok_or_else(|| ApiError::not_found("user not found"))
    })
    .await?;

    Ok(Json(Envelope::new("GET", views::user(&user))))
}

/// Soft delete the caller's account after confirming their password.
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    jar: CookieJar,
    Body(req): Body<DeleteAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = me.0.clone();
    run(&state, move |db| {
        if !verify_password(&req.password, &user.password)? {
            return Err(field_error("password", "wrong password"));
        }
        db.soft_delete_user(&user.id, Utc::now())?;
        Ok(())
    })
    .await?;

    info!("User {} deleted their account", me.id);
    Ok((clear_refresh_cookie(jar), Json(Envelope::new("DELETE", views::deleted(&me.id)))))
}

/// Whether `actor` may move `target` from `current` to `next`.
fn can_change_role(actor: Role, current: Role, next: Role) -> Result<(), ApiError> {
    if next == Role::SuperAdmin {
        return Err(ApiError::bad_request("the superAdmin role cannot be granted"));
    }
    if current == Role::SuperAdmin {
        return Err(ApiError::unauthorized("you're not allowed to change the role of a superAdmin"));
    }
    if actor != Role::SuperAdmin && (current == Role::Admin || next == Role::Admin) {
        return Err(ApiError::unauthorized("only a superAdmin can change the role of an admin"));
    }
    if current == next {
        return Err(ApiError::bad_request(format!("user's role is already {}", next.as_str())));
    }
    Ok(())
}

pub async fn change_role(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(user_id): Path<String>,
    Body(req): Body<ChangeRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Admin)?;
    if user_id == me.id {
        return Err(ApiError::bad_request("you cannot change your own role"));
    }

    let actor = me.0.clone();
    let user = run(&state, move |db| {
        let target = db
            .get_user(&user_id)?
            .ok_or_else(|| ApiError::not_found("user not found"))?;
        can_change_role(actor.role, target.role, req.role)?;

        db.change_role(&target.id, req.role, &actor.id, Utc::now())?
            .ok_or_else(|| ApiError::not_found("user not found"))
    })
    .await?;

    info!("User {} set role of {} to {}", me.id, user.id, user.role.as_str());
    Ok(Json(Envelope::new("PUT", views::user(&user))))
}

pub async fn create_profile_picture(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let picture = run(&state, move |db| Ok(db.create_profile_picture(&user_id, Utc::now())?)).await?;

    Ok((StatusCode::CREATED, Json(Envelope::new("POST", views::profile_picture(picture)))))
}

pub async fn delete_profile_picture(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(picture_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let id = picture_id.clone();
    let deleted = run(&state, move |db| Ok(db.delete_profile_picture(&id, &user_id)?)).await?;
    if !deleted {
        return Err(ApiError::not_found("profile picture not found"));
    }

    Ok(Json(Envelope::new("DELETE", views::deleted(&picture_id))))
}
