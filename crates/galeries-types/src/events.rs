use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{GalerieRole, NotificationType, Role};

/// Something that happened and may notify one or more users.
///
/// Handlers build these after a state change; the trusted
/// `POST /notifications` endpoint accepts them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    /// A user liked a frame; the frame author is notified.
    FrameLiked { frame_id: Uuid, liker_id: Uuid },

    /// A frame was posted; every other galerie member is notified.
    FramePosted { frame_id: Uuid },

    /// A beta key was consumed at signup; its creator is notified.
    BetaKeyUsed { beta_key_id: Uuid },

    /// An admin changed a user's site role.
    RoleChange {
        user_id: Uuid,
        role: Role,
        changed_by: Uuid,
    },

    /// A galerie manager changed a member's galerie role.
    GalerieRoleChange {
        galerie_id: Uuid,
        user_id: Uuid,
        role: GalerieRole,
        changed_by: Uuid,
    },

    /// A user joined a galerie; its creator and admins are notified.
    UserSubscribe { galerie_id: Uuid, user_id: Uuid },
}

impl NotificationEvent {
    pub fn kind(&self) -> NotificationType {
        match self {
            Self::FrameLiked { .. } => NotificationType::FrameLiked,
            Self::FramePosted { .. } => NotificationType::FramePosted,
            Self::BetaKeyUsed { .. } => NotificationType::BetaKeyUsed,
            Self::RoleChange { .. } => NotificationType::RoleChange,
            Self::GalerieRoleChange { .. } => NotificationType::GalerieRoleChange,
            Self::UserSubscribe { .. } => NotificationType::UserSubscribe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_is_tagged_by_type() {
        let frame_id = Uuid::new_v4();
        let liker_id = Uuid::new_v4();
        let json = serde_json::json!({
            "type": "FRAME_LIKED",
            "frame_id": frame_id,
            "liker_id": liker_id,
        });

        let event: NotificationEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event, NotificationEvent::FrameLiked { frame_id, liker_id });
        assert_eq!(event.kind(), NotificationType::FrameLiked);
    }

    #[test]
    fn role_change_carries_role() {
        let json = serde_json::json!({
            "type": "ROLE_CHANGE",
            "user_id": Uuid::new_v4(),
            "role": "moderator",
            "changed_by": Uuid::new_v4(),
        });

        let event: NotificationEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(event, NotificationEvent::RoleChange { role: Role::Moderator, .. }));
    }
}
