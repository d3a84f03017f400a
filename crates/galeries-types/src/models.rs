use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a stored enum column holds an unknown value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

// -- Roles --

/// Site-wide role. Declaration order is privilege order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    User,
    Moderator,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
            Self::SuperAdmin => "superAdmin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            "superAdmin" => Ok(Self::SuperAdmin),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Role of a member inside a single galerie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GalerieRole {
    Creator,
    Admin,
    User,
}

impl GalerieRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Creator and admins manage invitations, roles and frames of others.
    pub fn can_manage(&self) -> bool {
        matches!(self, Self::Creator | Self::Admin)
    }
}

impl FromStr for GalerieRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creator" => Ok(Self::Creator),
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

// -- Notifications --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    FrameLiked,
    FramePosted,
    BetaKeyUsed,
    RoleChange,
    GalerieRoleChange,
    UserSubscribe,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrameLiked => "FRAME_LIKED",
            Self::FramePosted => "FRAME_POSTED",
            Self::BetaKeyUsed => "BETA_KEY_USED",
            Self::RoleChange => "ROLE_CHANGE",
            Self::GalerieRoleChange => "GALERIE_ROLE_CHANGE",
            Self::UserSubscribe => "USER_SUBSCRIBE",
        }
    }

    /// Whether events of this type fold into an existing notification
    /// inside the window. Role changes always get their own row.
    pub fn aggregates(&self) -> bool {
        !matches!(self, Self::RoleChange | Self::GalerieRoleChange)
    }
}

impl FromStr for NotificationType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FRAME_LIKED" => Ok(Self::FrameLiked),
            "FRAME_POSTED" => Ok(Self::FramePosted),
            "BETA_KEY_USED" => Ok(Self::BetaKeyUsed),
            "ROLE_CHANGE" => Ok(Self::RoleChange),
            "GALERIE_ROLE_CHANGE" => Ok(Self::GalerieRoleChange),
            "USER_SUBSCRIBE" => Ok(Self::UserSubscribe),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

// -- Public models --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub user_name: String,
    pub pseudonym: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// The authenticated user's own view, with private fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Me {
    pub id: Uuid,
    pub user_name: String,
    pub pseudonym: String,
    pub email: String,
    pub role: Role,
    pub has_new_notifications: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Galerie {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub role: GalerieRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub galerie_id: Uuid,
    pub code: String,
    pub num_of_invits: Option<i64>,
    pub time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    pub galerie_id: Uuid,
    pub user_id: Uuid,
    pub description: Option<String>,
    pub num_of_likes: i64,
    pub liked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilePicture {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub num: i64,
    pub seen: bool,
    pub frame_id: Option<Uuid>,
    pub galerie_id: Option<Uuid>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackList {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_by_id: Option<Uuid>,
    pub updated_by_id: Option<Uuid>,
    pub reason: String,
    pub time: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub frame_id: Option<Uuid>,
    pub profile_picture_id: Option<Uuid>,
    pub num_of_reports: i64,
    pub classed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaKey {
    pub id: Uuid,
    pub code: String,
    pub email: Option<String>,
    pub created_by_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub header: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::User < Role::Moderator);
        assert!(Role::Moderator < Role::Admin);
        assert!(Role::Admin < Role::SuperAdmin);
    }

    #[test]
    fn role_strings_match_serde_names() {
        for role in [Role::User, Role::Moderator, Role::Admin, Role::SuperAdmin] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn notification_type_strings_match_serde_names() {
        let kinds = [
            NotificationType::FrameLiked,
            NotificationType::FramePosted,
            NotificationType::BetaKeyUsed,
            NotificationType::RoleChange,
            NotificationType::GalerieRoleChange,
            NotificationType::UserSubscribe,
        ];
        for kind in kinds {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("LIKED".parse::<NotificationType>().is_err());
    }
}
