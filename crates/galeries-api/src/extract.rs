use std::ops::Deref;

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use galeries_db::models::UserRow;
use galeries_types::models::Role;

use crate::error::ApiError;

/// The authenticated caller, inserted by `require_auth`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

impl CurrentUser {
    /// Reject callers below `role`.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.0.role < role {
            return Err(ApiError::unauthorized("you're not allowed to do this"));
        }
        Ok(())
    }
}

impl Deref for CurrentUser {
    type Target = UserRow;

    fn deref(&self) -> &UserRow {
        &self.0
    }
}

/// `Json` whose rejections use the `{ "errors": ... }` body.
pub struct Body<T>(pub T);

impl<S, T> FromRequest<S> for Body<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(Self(value))
    }
}
