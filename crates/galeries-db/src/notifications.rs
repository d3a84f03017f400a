//! Notification aggregation.
//!
//! Events fold into one row per `(recipient, type, frame, galerie, role)`
//! while that row is inside the window. Each folded event leaves a row in
//! `notification_sources`, and `notifications.num` always equals the number
//! of those rows: both are written in the caller's transaction.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use galeries_types::events::NotificationEvent;
use galeries_types::models::{GalerieRole, NotificationType};
use rusqlite::Connection;
use tracing::debug;

use crate::models::{NOTIFICATION_COLUMNS, NotificationRow, map_notification};
use crate::{Database, OptionalExt, new_id};

/// Length of the aggregation window.
pub const WINDOW_DAYS: i64 = 4;

/// Whether an existing notification still absorbs new events: unseen rows
/// always do, seen rows only until the window after their last update ends.
pub fn within_window(seen: bool, updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    !seen || now.signed_duration_since(updated_at) < Duration::days(WINDOW_DAYS)
}

/// Identifies the row an event folds into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationKey {
    pub user_id: String,
    pub kind: NotificationType,
    pub frame_id: Option<String>,
    pub galerie_id: Option<String>,
    pub role: Option<String>,
}

impl NotificationKey {
    fn new(user_id: &str, kind: NotificationType) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            frame_id: None,
            galerie_id: None,
            role: None,
        }
    }

    fn frame(mut self, frame_id: &str) -> Self {
        self.frame_id = Some(frame_id.to_string());
        self
    }

    fn galerie(mut self, galerie_id: &str) -> Self {
        self.galerie_id = Some(galerie_id.to_string());
        self
    }

    fn role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }
}

/// The entity that contributed one unit to a notification's counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    User(String),
    Frame(String),
}

impl Source {
    fn columns(&self) -> (Option<&str>, Option<&str>) {
        match self {
            Self::User(id) => (Some(id.as_str()), None),
            Self::Frame(id) => (None, Some(id.as_str())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Created { id: String },
    Incremented { id: String, num: i64 },
    /// The source was already folded into this notification.
    AlreadyCounted { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retracted {
    Deleted { id: String },
    Decremented { id: String, num: i64 },
    Missing,
}

/// Fold one source into the recipient's notification, creating it when no
/// row in the window matches. Flags the recipient as having news unless the
/// source was already counted.
pub fn record(
    conn: &Connection,
    key: &NotificationKey,
    source: &Source,
    now: DateTime<Utc>,
) -> Result<Recorded> {
    let existing = if key.kind.aggregates() {
        find_in_window(conn, key, now)?
    } else {
        None
    };

    let recorded = match existing {
        Some((id, _)) if has_source(conn, &id, source)? => Recorded::AlreadyCounted { id },
        Some((id, num)) => {
            conn.execute(
                "UPDATE notifications SET num = num + 1, seen = 0, updated_at = ?2 WHERE id = ?1",
                (&id, now),
            )?;
            attach_source(conn, &id, source, now)?;
            Recorded::Incremented { id, num: num + 1 }
        }
        None => {
            let id = new_id();
            conn.execute(
                "INSERT INTO notifications (id, user_id, type, num, seen, frame_id, galerie_id, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, 0, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    &id,
                    &key.user_id,
                    key.kind.as_str(),
                    &key.frame_id,
                    &key.galerie_id,
                    &key.role,
                    now
                ],
            )?;
            attach_source(conn, &id, source, now)?;
            Recorded::Created { id }
        }
    };

    if !matches!(recorded, Recorded::AlreadyCounted { .. }) {
        conn.execute(
            "UPDATE users SET has_new_notifications = 1 WHERE id = ?1",
            [&key.user_id],
        )?;
    }

    debug!("Notification {} for {}: {:?}", key.kind.as_str(), key.user_id, recorded);
    Ok(recorded)
}

/// Undo one source. The row goes away when it was the last one.
pub fn retract(conn: &Connection, key: &NotificationKey, source: &Source) -> Result<Retracted> {
    let (source_user, source_frame) = source.columns();
    let found: Option<(String, i64)> = conn
        .query_row(
            "SELECT n.id, n.num FROM notifications n
             JOIN notification_sources s ON s.notification_id = n.id
             WHERE n.user_id = ?1 AND n.type = ?2 AND n.frame_id IS ?3 AND n.galerie_id IS ?4
               AND n.role IS ?5 AND s.user_id IS ?6 AND s.frame_id IS ?7
             ORDER BY n.updated_at DESC
             LIMIT 1",
            rusqlite::params![
                &key.user_id,
                key.kind.as_str(),
                &key.frame_id,
                &key.galerie_id,
                &key.role,
                source_user,
                source_frame
            ],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((id, num)) = found else {
        return Ok(Retracted::Missing);
    };

    if num <= 1 {
        conn.execute("DELETE FROM notifications WHERE id = ?1", [&id])?;
        return Ok(Retracted::Deleted { id });
    }

    conn.execute("UPDATE notifications SET num = num - 1 WHERE id = ?1", [&id])?;
    conn.execute(
        "DELETE FROM notification_sources
         WHERE notification_id = ?1 AND user_id IS ?2 AND frame_id IS ?3",
        (&id, source_user, source_frame),
    )?;
    Ok(Retracted::Decremented { id, num: num - 1 })
}

/// Record an event for every recipient it resolves to.
///
/// Returns `None` when an entity the event references does not exist,
/// otherwise the number of recipients.
pub fn record_event(conn: &Connection, event: &NotificationEvent, now: DateTime<Utc>) -> Result<Option<usize>> {
    let Some(targets) = resolve(conn, event)? else {
        return Ok(None);
    };

    for (key, source) in &targets {
        record(conn, key, source, now)?;
    }
    Ok(Some(targets.len()))
}

/// Retract an event from every notification that counted it. Recipients
/// come from the stored sources, not from current membership, so a member
/// whose role changed since the event is still unwound. Returns how many
/// notifications changed.
pub fn retract_event(conn: &Connection, event: &NotificationEvent) -> Result<usize> {
    let Some((template, source)) = retraction_target(conn, event)? else {
        return Ok(0);
    };

    let (source_user, source_frame) = source.columns();
    let mut stmt = conn.prepare(
        "SELECT DISTINCT n.user_id FROM notifications n
         JOIN notification_sources s ON s.notification_id = n.id
         WHERE n.type = ?1 AND n.frame_id IS ?2 AND n.galerie_id IS ?3 AND n.role IS ?4
           AND s.user_id IS ?5 AND s.frame_id IS ?6",
    )?;
    let recipients = stmt
        .query_map(
            rusqlite::params![
                template.kind.as_str(),
                &template.frame_id,
                &template.galerie_id,
                &template.role,
                source_user,
                source_frame
            ],
            |row| row.get::<_, String>(0),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    drop(stmt);

    let mut changed = 0;
    for recipient in recipients {
        let key = NotificationKey {
            user_id: recipient,
            ..template.clone()
        };
        if retract(conn, &key, &source)? != Retracted::Missing {
            changed += 1;
        }
    }
    Ok(changed)
}

/// The key (without recipient) and the source an event was counted under.
fn retraction_target(conn: &Connection, event: &NotificationEvent) -> Result<Option<(NotificationKey, Source)>> {
    let kind = event.kind();

    let target = match event {
        NotificationEvent::FrameLiked { frame_id, liker_id } => (
            NotificationKey::new("", kind).frame(&frame_id.to_string()),
            Source::User(liker_id.to_string()),
        ),
        NotificationEvent::FramePosted { frame_id } => {
            let frame_id = frame_id.to_string();
            let Some((_, galerie_id)) = frame_owner(conn, &frame_id)? else {
                return Ok(None);
            };
            (NotificationKey::new("", kind).galerie(&galerie_id), Source::Frame(frame_id))
        }
        NotificationEvent::BetaKeyUsed { beta_key_id } => {
            let used_by: Option<Option<String>> = conn
                .query_row(
                    "SELECT user_id FROM beta_keys WHERE id = ?1",
                    [beta_key_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(Some(used_by)) = used_by else {
                return Ok(None);
            };
            (NotificationKey::new("", kind), Source::User(used_by))
        }
        NotificationEvent::RoleChange { role, changed_by, .. } => (
            NotificationKey::new("", kind).role(role.as_str()),
            Source::User(changed_by.to_string()),
        ),
        NotificationEvent::GalerieRoleChange { galerie_id, role, changed_by, .. } => (
            NotificationKey::new("", kind).galerie(&galerie_id.to_string()).role(role.as_str()),
            Source::User(changed_by.to_string()),
        ),
        NotificationEvent::UserSubscribe { galerie_id, user_id } => (
            NotificationKey::new("", kind).galerie(&galerie_id.to_string()),
            Source::User(user_id.to_string()),
        ),
    };

    Ok(Some(target))
}

/// Map an event to the `(key, source)` pair of each recipient.
fn resolve(conn: &Connection, event: &NotificationEvent) -> Result<Option<Vec<(NotificationKey, Source)>>> {
    let kind = event.kind();

    let targets = match event {
        NotificationEvent::FrameLiked { frame_id, liker_id } => {
            let frame_id = frame_id.to_string();
            let liker_id = liker_id.to_string();
            let Some((author_id, _)) = frame_owner(conn, &frame_id)? else {
                return Ok(None);
            };
            if !user_exists(conn, &liker_id)? {
                return Ok(None);
            }
            if author_id == liker_id {
                vec![]
            } else {
                vec![(
                    NotificationKey::new(&author_id, kind).frame(&frame_id),
                    Source::User(liker_id),
                )]
            }
        }

        NotificationEvent::FramePosted { frame_id } => {
            let frame_id = frame_id.to_string();
            let Some((author_id, galerie_id)) = frame_owner(conn, &frame_id)? else {
                return Ok(None);
            };
            galerie_members(conn, &galerie_id, false)?
                .into_iter()
                .filter(|member| *member != author_id)
                .map(|member| {
                    (
                        NotificationKey::new(&member, kind).galerie(&galerie_id),
                        Source::Frame(frame_id.clone()),
                    )
                })
                .collect()
        }

        NotificationEvent::BetaKeyUsed { beta_key_id } => {
            let key: Option<(Option<String>, Option<String>)> = conn
                .query_row(
                    "SELECT created_by_id, user_id FROM beta_keys WHERE id = ?1",
                    [beta_key_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            match key {
                None => return Ok(None),
                Some((Some(creator), Some(used_by))) if user_exists(conn, &creator)? => {
                    vec![(NotificationKey::new(&creator, kind), Source::User(used_by))]
                }
                Some(_) => vec![],
            }
        }

        NotificationEvent::RoleChange { user_id, role, changed_by } => {
            let user_id = user_id.to_string();
            let changed_by = changed_by.to_string();
            if !user_exists(conn, &user_id)? || !user_exists(conn, &changed_by)? {
                return Ok(None);
            }
            vec![(
                NotificationKey::new(&user_id, kind).role(role.as_str()),
                Source::User(changed_by),
            )]
        }

        NotificationEvent::GalerieRoleChange { galerie_id, user_id, role, changed_by } => {
            let galerie_id = galerie_id.to_string();
            let user_id = user_id.to_string();
            let changed_by = changed_by.to_string();
            if !galerie_members(conn, &galerie_id, false)?.contains(&user_id) || !user_exists(conn, &changed_by)? {
                return Ok(None);
            }
            vec![(
                NotificationKey::new(&user_id, kind).galerie(&galerie_id).role(role.as_str()),
                Source::User(changed_by),
            )]
        }

        NotificationEvent::UserSubscribe { galerie_id, user_id } => {
            let galerie_id = galerie_id.to_string();
            let user_id = user_id.to_string();
            if !galerie_exists(conn, &galerie_id)? || !user_exists(conn, &user_id)? {
                return Ok(None);
            }
            galerie_members(conn, &galerie_id, true)?
                .into_iter()
                .filter(|member| *member != user_id)
                .map(|member| {
                    (
                        NotificationKey::new(&member, kind).galerie(&galerie_id),
                        Source::User(user_id.clone()),
                    )
                })
                .collect()
        }
    };

    Ok(Some(targets))
}

fn find_in_window(
    conn: &Connection,
    key: &NotificationKey,
    now: DateTime<Utc>,
) -> Result<Option<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT id, num, seen, updated_at FROM notifications
         WHERE user_id = ?1 AND type = ?2 AND frame_id IS ?3 AND galerie_id IS ?4 AND role IS ?5
         ORDER BY updated_at DESC",
    )?;

    let candidates = stmt
        .query_map(
            rusqlite::params![&key.user_id, key.kind.as_str(), &key.frame_id, &key.galerie_id, &key.role],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, DateTime<Utc>>(3)?,
                ))
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(candidates
        .into_iter()
        .find(|(_, _, seen, updated_at)| within_window(*seen, *updated_at, now))
        .map(|(id, num, _, _)| (id, num)))
}

fn has_source(conn: &Connection, notification_id: &str, source: &Source) -> Result<bool> {
    let (user_id, frame_id) = source.columns();
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM notification_sources
             WHERE notification_id = ?1 AND user_id IS ?2 AND frame_id IS ?3",
            (notification_id, user_id, frame_id),
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn attach_source(conn: &Connection, notification_id: &str, source: &Source, now: DateTime<Utc>) -> Result<()> {
    let (user_id, frame_id) = source.columns();
    conn.execute(
        "INSERT INTO notification_sources (id, notification_id, user_id, frame_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![new_id(), notification_id, user_id, frame_id, now],
    )?;
    Ok(())
}

fn frame_owner(conn: &Connection, frame_id: &str) -> Result<Option<(String, String)>> {
    conn.query_row(
        "SELECT user_id, galerie_id FROM frames WHERE id = ?1",
        [frame_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

fn user_exists(conn: &Connection, user_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM users WHERE id = ?1 AND deleted_at IS NULL",
            [user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn galerie_exists(conn: &Connection, galerie_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM galeries WHERE id = ?1", [galerie_id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Live members of a galerie, optionally only its creator and admins.
fn galerie_members(conn: &Connection, galerie_id: &str, managers_only: bool) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT gu.user_id, gu.role FROM galerie_users gu
         JOIN users u ON u.id = gu.user_id
         WHERE gu.galerie_id = ?1 AND u.deleted_at IS NULL",
    )?;

    let members = stmt
        .query_map([galerie_id], |row| {
            Ok((row.get::<_, String>(0)?, crate::models::parse_galerie_role(row, 1)?))
        })?
        .collect::<std::result::Result<Vec<(String, GalerieRole)>, _>>()?;

    Ok(members
        .into_iter()
        .filter(|(_, role)| !managers_only || role.can_manage())
        .map(|(id, _)| id)
        .collect())
}

impl Database {
    /// Entry point for the trusted notification endpoint.
    pub fn post_notification(&self, event: &NotificationEvent, now: DateTime<Utc>) -> Result<Option<usize>> {
        self.with_tx(|tx| record_event(tx, event, now))
    }

    /// A user's notifications, newest first. Reading them clears the
    /// user's "has new notifications" flag.
    pub fn list_notifications(&self, user_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_tx(|tx| {
            let sql = format!(
                "SELECT {} FROM notifications WHERE user_id = ?1 ORDER BY updated_at DESC",
                NOTIFICATION_COLUMNS
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_notification)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            tx.execute("UPDATE users SET has_new_notifications = 0 WHERE id = ?1", [user_id])?;
            Ok(rows)
        })
    }

    pub fn get_notification(&self, id: &str) -> Result<Option<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLUMNS);
            conn.query_row(&sql, [id], map_notification).optional()
        })
    }

    /// Mark a notification seen. Its window restarts from now.
    pub fn mark_notification_seen(&self, id: &str, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET seen = 1, updated_at = ?3 WHERE id = ?1 AND user_id = ?2",
                (id, user_id, now),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(deleted > 0)
        })
    }

    /// Number of source rows attached to a notification.
    pub fn count_notification_sources(&self, id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM notification_sources WHERE notification_id = ?1",
                [id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}
