use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use galeries_types::api::{CreateBetaKeyRequest, Envelope};
use galeries_types::models::Role;

use crate::error::ApiError;
use crate::extract::{Body, CurrentUser};
use crate::state::{AppState, random_code, run};
use crate::validation::Validator;
use crate::views;

pub async fn list_beta_keys(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Admin)?;
    let rows = run(&state, |db| Ok(db.list_beta_keys()?)).await?;

    let keys: Vec<_> = rows.into_iter().map(views::beta_key).collect();
    Ok(Json(Envelope::new("GET", keys)))
}

pub async fn create_beta_key(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Body(req): Body<CreateBetaKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Admin)?;
    if let Some(email) = req.email.as_deref() {
        Validator::new().email("email", email).finish()?;
    }

    let created_by = me.id.clone();
    let key = run(&state, move |db| {
        let email = req.email.as_deref().map(|e| e.trim().to_lowercase());
        Ok(db.create_beta_key(&random_code(), email.as_deref(), Some(&created_by), Utc::now())?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(Envelope::new("POST", views::beta_key(key)))))
}

pub async fn delete_beta_key(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(key_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Role::Admin)?;
    let id = key_id.clone();
    if !run(&state, move |db| Ok(db.delete_beta_key(&id)?)).await? {
        return Err(ApiError::not_found("beta key not found"));
    }

    Ok(Json(Envelope::new("DELETE", views::deleted(&key_id))))
}
