//! Database row types. These map directly to SQLite rows and stay
//! independent of the galeries-types API models.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use galeries_types::models::{GalerieRole, NotificationType, Role};
use rusqlite::Row;
use rusqlite::types::Type;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub user_name: String,
    pub pseudonym: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub is_black_listed: bool,
    pub has_new_notifications: bool,
    pub auth_token_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BlackListRow {
    pub id: String,
    pub user_id: String,
    pub created_by_id: Option<String>,
    pub updated_by_id: Option<String>,
    pub reason: String,
    pub time: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlackListRow {
    /// Inactive rows and rows whose expiry has passed no longer hold.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.active || self.time.is_some_and(|t| t <= now)
    }
}

#[derive(Debug, Clone)]
pub struct GalerieRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InvitationRow {
    pub id: String,
    pub galerie_id: String,
    pub created_by_id: Option<String>,
    pub code: String,
    pub num_of_invits: Option<i64>,
    pub time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FrameRow {
    pub id: String,
    pub galerie_id: String,
    pub user_id: String,
    pub description: Option<String>,
    pub num_of_likes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProfilePictureRow {
    pub id: String,
    pub user_id: String,
    pub current: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReportRow {
    pub id: String,
    pub frame_id: Option<String>,
    pub profile_picture_id: Option<String>,
    pub num_of_reports: i64,
    pub classed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationType,
    pub num: i64,
    pub seen: bool,
    pub frame_id: Option<String>,
    pub galerie_id: Option<String>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BetaKeyRow {
    pub id: String,
    pub code: String,
    pub email: Option<String>,
    pub created_by_id: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TicketRow {
    pub id: String,
    pub user_id: Option<String>,
    pub header: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// -- Row mappers --

/// Read a TEXT column holding one of our string enums.
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) const USER_COLUMNS: &str = "id, user_name, pseudonym, email, password, role, \
     is_black_listed, has_new_notifications, auth_token_version, created_at, updated_at";

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        user_name: row.get(1)?,
        pseudonym: row.get(2)?,
        email: row.get(3)?,
        password: row.get(4)?,
        role: parse_column::<Role>(row, 5)?,
        is_black_listed: row.get(6)?,
        has_new_notifications: row.get(7)?,
        auth_token_version: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub(crate) const BLACK_LIST_COLUMNS: &str =
    "id, user_id, created_by_id, updated_by_id, reason, time, active, created_at, updated_at";

pub(crate) fn map_black_list(row: &Row<'_>) -> rusqlite::Result<BlackListRow> {
    Ok(BlackListRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_by_id: row.get(2)?,
        updated_by_id: row.get(3)?,
        reason: row.get(4)?,
        time: row.get(5)?,
        active: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub(crate) fn map_galerie(row: &Row<'_>) -> rusqlite::Result<GalerieRow> {
    Ok(GalerieRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn parse_galerie_role(row: &Row<'_>, idx: usize) -> rusqlite::Result<GalerieRole> {
    parse_column::<GalerieRole>(row, idx)
}

pub(crate) const INVITATION_COLUMNS: &str =
    "id, galerie_id, created_by_id, code, num_of_invits, time, created_at";

pub(crate) fn map_invitation(row: &Row<'_>) -> rusqlite::Result<InvitationRow> {
    Ok(InvitationRow {
        id: row.get(0)?,
        galerie_id: row.get(1)?,
        created_by_id: row.get(2)?,
        code: row.get(3)?,
        num_of_invits: row.get(4)?,
        time: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub(crate) const FRAME_COLUMNS: &str =
    "id, galerie_id, user_id, description, num_of_likes, created_at";

pub(crate) fn map_frame(row: &Row<'_>) -> rusqlite::Result<FrameRow> {
    Ok(FrameRow {
        id: row.get(0)?,
        galerie_id: row.get(1)?,
        user_id: row.get(2)?,
        description: row.get(3)?,
        num_of_likes: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) fn map_profile_picture(row: &Row<'_>) -> rusqlite::Result<ProfilePictureRow> {
    Ok(ProfilePictureRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        current: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) const REPORT_COLUMNS: &str =
    "id, frame_id, profile_picture_id, num_of_reports, classed, created_at, updated_at";

pub(crate) fn map_report(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        frame_id: row.get(1)?,
        profile_picture_id: row.get(2)?,
        num_of_reports: row.get(3)?,
        classed: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) const NOTIFICATION_COLUMNS: &str =
    "id, user_id, type, num, seen, frame_id, galerie_id, role, created_at, updated_at";

pub(crate) fn map_notification(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: parse_column::<NotificationType>(row, 2)?,
        num: row.get(3)?,
        seen: row.get(4)?,
        frame_id: row.get(5)?,
        galerie_id: row.get(6)?,
        role: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub(crate) const BETA_KEY_COLUMNS: &str = "id, code, email, created_by_id, user_id, created_at";

pub(crate) fn map_beta_key(row: &Row<'_>) -> rusqlite::Result<BetaKeyRow> {
    Ok(BetaKeyRow {
        id: row.get(0)?,
        code: row.get(1)?,
        email: row.get(2)?,
        created_by_id: row.get(3)?,
        user_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) fn map_ticket(row: &Row<'_>) -> rusqlite::Result<TicketRow> {
    Ok(TicketRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        header: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
    })
}
