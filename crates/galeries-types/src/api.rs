use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{GalerieRole, Me, Role};

// -- Envelope --

/// Every successful response body: `{ "action": "POST", "data": ... }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub action: &'static str,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(action: &'static str, data: T) -> Self {
        Self { action, data }
    }
}

// -- JWT Claims --

/// Distinguishes the three token families signed with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Notification,
}

/// Short-lived bearer token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub user_name: String,
    pub typ: TokenKind,
    pub exp: usize,
}

/// Refresh cookie claims. `ver` must match the user's token version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub ver: i64,
    pub typ: TokenKind,
    pub exp: usize,
}

/// Server-to-server notification token. Never expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationClaims {
    pub iss: String,
    pub typ: TokenKind,
}

// -- Users / auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub user_name: String,
    pub pseudonym: String,
    pub email: String,
    pub password: String,
    pub beta_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub user_name_or_email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: Me,
    pub token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteAccountRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

// -- Galeries --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGalerieRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateInvitationRequest {
    pub num_of_invits: Option<i64>,
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeGalerieRoleRequest {
    pub role: GalerieRole,
}

// -- Frames --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostFrameRequest {
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub frame_id: Uuid,
    pub liked: bool,
    pub num_of_likes: i64,
}

// -- Moderation --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBlackListRequest {
    pub reason: String,
    pub expires_in_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBlackListRequest {
    pub reason: Option<String>,
    pub expires_in_hours: Option<i64>,
    /// Drop the expiry. Cannot be combined with `expires_in_hours`.
    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Serialize)]
pub struct ExpireBlackListsResponse {
    pub deactivated: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportRequest {
    pub reason: Option<String>,
}

// -- Beta keys / tickets --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBetaKeyRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTicketRequest {
    pub header: String,
    pub body: String,
}

// -- Notifications --

#[derive(Debug, Serialize)]
pub struct NotificationPosted {
    pub recipients: usize,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
}
