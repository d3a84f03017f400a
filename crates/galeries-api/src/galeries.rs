use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use galeries_db::Database;
use galeries_db::galeries::SubscribeOutcome;
use galeries_types::api::{ChangeGalerieRoleRequest, CreateGalerieRequest, CreateInvitationRequest, Envelope};
use galeries_types::models::GalerieRole;

use crate::error::ApiError;
use crate::extract::{Body, CurrentUser};
use crate::state::{AppState, random_code, run};
use crate::validation::{Validator, expires_at};
use crate::views;

/// The caller's role in a galerie. Non-members see a 404.
pub(crate) fn membership(db: &Database, galerie_id: &str, user_id: &str) -> Result<GalerieRole, ApiError> {
    db.galerie_role(galerie_id, user_id)?
        .ok_or_else(|| ApiError::not_found("galerie not found"))
}

pub async fn list_galeries(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let rows = run(&state, move |db| Ok(db.list_galeries_for(&user_id)?)).await?;

    let galeries: Vec<_> = rows.into_iter().map(|(row, role)| views::galerie(row, role)).collect();
    Ok(Json(Envelope::new("GET", galeries)))
}

pub async fn create_galerie(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Body(req): Body<CreateGalerieRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .length("name", &req.name, 1, 50)
        .optional_length("description", req.description.as_deref(), 200)
        .finish()?;

    let user_id = me.id.clone();
    let galerie = run(&state, move |db| {
        let description = req.description.as_deref().map(str::trim).filter(|d| !d.is_empty());
        Ok(db.create_galerie(req.name.trim(), description, &user_id, Utc::now())?)
    })
    .await?;

    info!("User {} created galerie {}", me.id, galerie.id);
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new("POST", views::galerie(galerie, GalerieRole::Creator))),
    ))
}

pub async fn get_galerie(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(galerie_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let (galerie, role) = run(&state, move |db| {
        let role = membership(db, &galerie_id, &user_id)?;
        let galerie = db
            .get_galerie(&galerie_id)?
            .ok_or_else(|| ApiError::not_found("galerie not found"))?;
        Ok((galerie, role))
    })
    .await?;

    Ok(Json(Envelope::new("GET", views::galerie(galerie, role))))
}

pub async fn create_invitation(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(galerie_id): Path<String>,
    Body(req): Body<CreateInvitationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .positive("num_of_invits", req.num_of_invits)
        .expiry_hours("expires_in_hours", req.expires_in_hours)
        .finish()?;

    let user_id = me.id.clone();
    let invitation = run(&state, move |db| {
        if !membership(db, &galerie_id, &user_id)?.can_manage() {
            return Err(ApiError::unauthorized("you're not allowed to create invitations"));
        }
        let now = Utc::now();
        let time = req
            .expires_in_hours
            .map(|hours| expires_at("expires_in_hours", now, hours))
            .transpose()?;
        Ok(db.create_invitation(&galerie_id, &user_id, &random_code(), req.num_of_invits, time, now)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(Envelope::new("POST", views::invitation(invitation)))))
}

/// Join a galerie with an invitation code.
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let outcome = run(&state, move |db| Ok(db.subscribe(&code, &user_id, Utc::now())?)).await?;

    match outcome {
        SubscribeOutcome::Joined(galerie) => {
            info!("User {} joined galerie {}", me.id, galerie.id);
            Ok(Json(Envelope::new("POST", views::galerie(galerie, GalerieRole::User))))
        }
        SubscribeOutcome::InvalidCode => Err(ApiError::not_found("invitation not found")),
        SubscribeOutcome::Expired => Err(ApiError::bad_request("invitation expired")),
        SubscribeOutcome::AlreadyMember => Err(ApiError::bad_request("you are already subscribed to this galerie")),
    }
}

/// Checks a galerie role change before it reaches the database.
fn can_change_galerie_role(
    actor: GalerieRole,
    current: GalerieRole,
    next: GalerieRole,
) -> Result<(), ApiError> {
    if !actor.can_manage() {
        return Err(ApiError::unauthorized("you're not allowed to change roles in this galerie"));
    }
    if next == GalerieRole::Creator {
        return Err(ApiError::bad_request("the creator role cannot be granted"));
    }
    if current == GalerieRole::Creator {
        return Err(ApiError::bad_request("the creator's role cannot be changed"));
    }
    if actor == GalerieRole::Admin && current == GalerieRole::Admin {
        return Err(ApiError::unauthorized("you're not allowed to change the role of an admin"));
    }
    if current == next {
        return Err(ApiError::bad_request(format!("user's role is already {}", next.as_str())));
    }
    Ok(())
}

pub async fn change_galerie_role(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path((galerie_id, user_id)): Path<(String, String)>,
    Body(req): Body<ChangeGalerieRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == me.id {
        return Err(ApiError::bad_request("you cannot change your own role"));
    }

    let actor_id = me.id.clone();
    run(&state, move |db| {
        let actor = membership(db, &galerie_id, &actor_id)?;
        let current = db
            .galerie_role(&galerie_id, &user_id)?
            .ok_or_else(|| ApiError::not_found("user not found"))?;
        can_change_galerie_role(actor, current, req.role)?;

        if !db.change_galerie_role(&galerie_id, &user_id, req.role, &actor_id, Utc::now())? {
            return Err(ApiError::not_found("user not found"));
        }
        info!("User {} set role of {} in galerie {} to {}", actor_id, user_id, galerie_id, req.role.as_str());
        Ok(())
    })
    .await?;

    Ok(Json(Envelope::new("PUT", req.role)))
}

pub async fn leave_galerie(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(galerie_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let id = galerie_id.clone();
    run(&state, move |db| {
        if membership(db, &id, &user_id)? == GalerieRole::Creator {
            return Err(ApiError::bad_request("the creator cannot leave the galerie"));
        }
        if !db.leave_galerie(&id, &user_id)? {
            return Err(ApiError::not_found("galerie not found"));
        }
        Ok(())
    })
    .await?;

    info!("User {} left galerie {}", me.id, galerie_id);
    Ok(Json(Envelope::new("DELETE", views::deleted(&galerie_id))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_members_cannot_change_roles() {
        assert!(can_change_galerie_role(GalerieRole::User, GalerieRole::User, GalerieRole::Admin).is_err());
    }

    #[test]
    fn creator_role_is_fixed() {
        assert!(can_change_galerie_role(GalerieRole::Creator, GalerieRole::User, GalerieRole::Creator).is_err());
        assert!(can_change_galerie_role(GalerieRole::Admin, GalerieRole::Creator, GalerieRole::User).is_err());
    }

    #[test]
    fn admins_only_manage_plain_members() {
        assert!(can_change_galerie_role(GalerieRole::Admin, GalerieRole::User, GalerieRole::Admin).is_ok());
        assert!(can_change_galerie_role(GalerieRole::Admin, GalerieRole::Admin, GalerieRole::User).is_err());
        assert!(can_change_galerie_role(GalerieRole::Creator, GalerieRole::Admin, GalerieRole::User).is_ok());
    }
}
