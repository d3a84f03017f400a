use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use galeries_db::Database;
use galeries_db::models::FrameRow;
use galeries_types::api::{Envelope, LikeResponse, PostFrameRequest};

use crate::error::ApiError;
use crate::extract::{Body, CurrentUser};
use crate::galeries::membership;
use crate::state::{AppState, run};
use crate::validation::Validator;
use crate::views;

/// A frame the caller can see: it exists and they belong to its galerie.
pub(crate) fn visible_frame(db: &Database, frame_id: &str, user_id: &str) -> Result<FrameRow, ApiError> {
    let frame = db
        .get_frame(frame_id)?
        .ok_or_else(|| ApiError::not_found("frame not found"))?;
    if db.galerie_role(&frame.galerie_id, user_id)?.is_none() {
        return Err(ApiError::not_found("frame not found"));
    }
    Ok(frame)
}

pub async fn list_frames(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(galerie_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let rows = run(&state, move |db| {
        membership(db, &galerie_id, &user_id)?;
        Ok(db.list_frames(&galerie_id, &user_id)?)
    })
    .await?;

    let frames: Vec<_> = rows.into_iter().map(|(row, liked)| views::frame(row, liked)).collect();
    Ok(Json(Envelope::new("GET", frames)))
}

pub async fn post_frame(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(galerie_id): Path<String>,
    Body(req): Body<PostFrameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .optional_length("description", req.description.as_deref(), 200)
        .finish()?;

    let user_id = me.id.clone();
    let frame = run(&state, move |db| {
        membership(db, &galerie_id, &user_id)?;
        let description = req.description.as_deref().map(str::trim).filter(|d| !d.is_empty());
        Ok(db.post_frame(&galerie_id, &user_id, description, Utc::now())?)
    })
    .await?;

    info!("User {} posted frame {} in galerie {}", me.id, frame.id, frame.galerie_id);
    Ok((StatusCode::CREATED, Json(Envelope::new("POST", views::frame(frame, false)))))
}

/// Authors delete their own frames; galerie creator and admins delete any.
pub async fn delete_frame(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(frame_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let id = frame_id.clone();
    run(&state, move |db| {
        let frame = visible_frame(db, &id, &user_id)?;
        if frame.user_id != user_id && !membership(db, &frame.galerie_id, &user_id)?.can_manage() {
            return Err(ApiError::unauthorized("you're not allowed to delete this frame"));
        }
        if !db.delete_frame(&id)? {
            return Err(ApiError::not_found("frame not found"));
        }
        Ok(())
    })
    .await?;

    info!("User {} deleted frame {}", me.id, frame_id);
    Ok(Json(Envelope::new("DELETE", views::deleted(&frame_id))))
}

/// Like the frame, or remove the caller's like if present.
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(frame_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let id = frame_id.clone();
    let (liked, num_of_likes) = run(&state, move |db| {
        visible_frame(db, &id, &user_id)?;
        db.toggle_like(&id, &user_id, Utc::now())?
            .ok_or_else(|| ApiError::not_found("frame not found"))
    })
    .await?;

    let response = LikeResponse {
        frame_id: frame_id
            .parse()
            .map_err(|_| ApiError::not_found("frame not found"))?,
        liked,
        num_of_likes,
    };
    Ok(Json(Envelope::new("POST", response)))
}
