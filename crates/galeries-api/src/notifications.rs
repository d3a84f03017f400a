use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use galeries_types::api::{Envelope, NotificationPosted};
use galeries_types::events::NotificationEvent;

use crate::error::ApiError;
use crate::extract::{Body, CurrentUser};
use crate::state::{AppState, run};
use crate::views;

/// Newest first. Reading the list clears the "new notifications" flag.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let rows = run(&state, move |db| Ok(db.list_notifications(&user_id)?)).await?;

    let notifications: Vec<_> = rows.into_iter().map(views::notification).collect();
    Ok(Json(Envelope::new("GET", notifications)))
}

pub async fn mark_seen(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(notification_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let row = run(&state, move |db| {
        if !db.mark_notification_seen(&notification_id, &user_id, Utc::now())? {
            return Err(ApiError::not_found("notification not found"));
        }
        db.get_notification(&notification_id)?
            .ok_or_else(|| ApiError::not_found("notification not found"))
    })
    .await?;

    Ok(Json(Envelope::new("PUT", views::notification(row))))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(notification_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = me.id.clone();
    let id = notification_id.clone();
    if !run(&state, move |db| Ok(db.delete_notification(&id, &user_id)?)).await? {
        return Err(ApiError::not_found("notification not found"));
    }

    Ok(Json(Envelope::new("DELETE", views::deleted(&notification_id))))
}

/// Trusted entry point for other services. Runs the same aggregation as the
/// in-process handlers.
pub async fn post_notification(
    State(state): State<AppState>,
    Body(event): Body<NotificationEvent>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = event.kind();
    let recipients = run(&state, move |db| {
        db.post_notification(&event, Utc::now())?
            .ok_or_else(|| ApiError::not_found("resource not found"))
    })
    .await?;

    info!("Posted {} notification to {} recipients", kind.as_str(), recipients);
    Ok((StatusCode::CREATED, Json(Envelope::new("POST", NotificationPosted { recipients }))))
}
