//! Row to API model conversions.

use tracing::warn;
use uuid::Uuid;

use galeries_db::models::{
    BetaKeyRow, BlackListRow, FrameRow, GalerieRow, InvitationRow, NotificationRow, ProfilePictureRow, ReportRow,
    TicketRow, UserRow,
};
use galeries_types::models::{
    BetaKey, BlackList, Frame, Galerie, GalerieRole, Invitation, Me, Notification, ProfilePicture, Report, Ticket,
    User,
};

fn uuid(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|_| {
        warn!("Corrupt uuid in database: {}", raw);
        Uuid::nil()
    })
}

fn opt_uuid(raw: Option<&str>) -> Option<Uuid> {
    raw.map(uuid)
}

pub fn me(row: &UserRow) -> Me {
    Me {
        id: uuid(&row.id),
        user_name: row.user_name.clone(),
        pseudonym: row.pseudonym.clone(),
        email: row.email.clone(),
        role: row.role,
        has_new_notifications: row.has_new_notifications,
        created_at: row.created_at,
    }
}

pub fn user(row: &UserRow) -> User {
    User {
        id: uuid(&row.id),
        user_name: row.user_name.clone(),
        pseudonym: row.pseudonym.clone(),
        role: row.role,
        created_at: row.created_at,
    }
}

pub fn galerie(row: GalerieRow, role: GalerieRole) -> Galerie {
    Galerie {
        id: uuid(&row.id),
        name: row.name,
        description: row.description,
        role,
        created_at: row.created_at,
    }
}

pub fn invitation(row: InvitationRow) -> Invitation {
    Invitation {
        id: uuid(&row.id),
        galerie_id: uuid(&row.galerie_id),
        code: row.code,
        num_of_invits: row.num_of_invits,
        time: row.time,
        created_at: row.created_at,
    }
}

pub fn frame(row: FrameRow, liked: bool) -> Frame {
    Frame {
        id: uuid(&row.id),
        galerie_id: uuid(&row.galerie_id),
        user_id: uuid(&row.user_id),
        description: row.description,
        num_of_likes: row.num_of_likes,
        liked,
        created_at: row.created_at,
    }
}

pub fn profile_picture(row: ProfilePictureRow) -> ProfilePicture {
    ProfilePicture {
        id: uuid(&row.id),
        user_id: uuid(&row.user_id),
        current: row.current,
        created_at: row.created_at,
    }
}

pub fn notification(row: NotificationRow) -> Notification {
    Notification {
        id: uuid(&row.id),
        kind: row.kind,
        num: row.num,
        seen: row.seen,
        frame_id: opt_uuid(row.frame_id.as_deref()),
        galerie_id: opt_uuid(row.galerie_id.as_deref()),
        role: row.role,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn black_list(row: BlackListRow) -> BlackList {
    BlackList {
        id: uuid(&row.id),
        user_id: uuid(&row.user_id),
        created_by_id: opt_uuid(row.created_by_id.as_deref()),
        updated_by_id: opt_uuid(row.updated_by_id.as_deref()),
        reason: row.reason,
        time: row.time,
        active: row.active,
        created_at: row.created_at,
    }
}

pub fn report(row: ReportRow) -> Report {
    Report {
        id: uuid(&row.id),
        frame_id: opt_uuid(row.frame_id.as_deref()),
        profile_picture_id: opt_uuid(row.profile_picture_id.as_deref()),
        num_of_reports: row.num_of_reports,
        classed: row.classed,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn beta_key(row: BetaKeyRow) -> BetaKey {
    BetaKey {
        id: uuid(&row.id),
        code: row.code,
        email: row.email,
        created_by_id: opt_uuid(row.created_by_id.as_deref()),
        user_id: opt_uuid(row.user_id.as_deref()),
        created_at: row.created_at,
    }
}

pub fn ticket(row: TicketRow) -> Ticket {
    Ticket {
        id: uuid(&row.id),
        user_id: opt_uuid(row.user_id.as_deref()),
        header: row.header,
        body: row.body,
        created_at: row.created_at,
    }
}

/// Id of a row we just deleted, for `Deleted` bodies.
pub fn deleted(raw: &str) -> galeries_types::api::Deleted {
    galeries_types::api::Deleted { id: uuid(raw) }
}
