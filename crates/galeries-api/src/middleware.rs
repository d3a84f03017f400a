use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::{AppState, run};

/// Header carrying the server-to-server notification token.
pub const NOTIFICATION_TOKEN_HEADER: &str = "notificationtoken";

/// Validate the bearer token, load the caller and run the black-list check.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("not authenticated"))?;

    let claims = state.keys.verify_access(token).map_err(|e| {
        debug!("Rejected access token: {}", e);
        ApiError::unauthorized("token not valid")
    })?;

    let user_id = claims.sub.to_string();
    let user = run(&state, move |db| {
        let user = db
            .get_user(&user_id)?
            .ok_or_else(|| ApiError::unauthorized("user not found"))?;
        if db.check_black_list(&user.id, Utc::now())? {
            return Err(ApiError::unauthorized("you are black listed"));
        }
        Ok(user)
    })
    .await?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Gate for trusted services posting notification events.
pub async fn require_notification_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(NOTIFICATION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing notification token"))?;

    state.keys.verify_notification(token).map_err(|e| {
        debug!("Rejected notification token: {}", e);
        ApiError::unauthorized("notification token not valid")
    })?;

    Ok(next.run(req).await)
}
