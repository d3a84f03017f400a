use anyhow::Result;
use chrono::{DateTime, Utc};
use galeries_types::events::NotificationEvent;
use rusqlite::Connection;
use uuid::Uuid;

use crate::models::{FRAME_COLUMNS, FrameRow, map_frame};
use crate::{Database, OptionalExt, new_id, notifications};

impl Database {
    /// Post a frame and notify the other galerie members.
    pub fn post_frame(
        &self,
        galerie_id: &str,
        user_id: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<FrameRow> {
        self.with_tx(|tx| {
            let id = new_id();
            tx.execute(
                "INSERT INTO frames (id, galerie_id, user_id, description, num_of_likes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
                (&id, galerie_id, user_id, description, now),
            )?;

            let event = NotificationEvent::FramePosted { frame_id: id.parse::<Uuid>()? };
            notifications::record_event(tx, &event, now)?;

            Ok(FrameRow {
                id,
                galerie_id: galerie_id.to_string(),
                user_id: user_id.to_string(),
                description: description.map(str::to_string),
                num_of_likes: 0,
                created_at: now,
            })
        })
    }

    pub fn get_frame(&self, id: &str) -> Result<Option<FrameRow>> {
        self.with_conn(|conn| find_frame(conn, id))
    }

    /// Frames of a galerie, newest first, each with whether `viewer_id`
    /// liked it.
    pub fn list_frames(&self, galerie_id: &str, viewer_id: &str) -> Result<Vec<(FrameRow, bool)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.id, f.galerie_id, f.user_id, f.description, f.num_of_likes, f.created_at,
                        EXISTS (SELECT 1 FROM likes l WHERE l.frame_id = f.id AND l.user_id = ?2)
                 FROM frames f
                 WHERE f.galerie_id = ?1
                 ORDER BY f.created_at DESC",
            )?;
            let rows = stmt
                .query_map((galerie_id, viewer_id), |row| Ok((map_frame(row)?, row.get(6)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn has_liked(&self, frame_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| liked(conn, frame_id, user_id))
    }

    /// Delete a frame, taking back its FRAME_POSTED notifications first.
    pub fn delete_frame(&self, id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            if find_frame(tx, id)?.is_none() {
                return Ok(false);
            }

            let event = NotificationEvent::FramePosted { frame_id: id.parse::<Uuid>()? };
            notifications::retract_event(tx, &event)?;

            tx.execute("DELETE FROM frames WHERE id = ?1", [id])?;
            Ok(true)
        })
    }

    /// Like or unlike a frame. The like row, the frame's counter and the
    /// author's FRAME_LIKED notification move together.
    ///
    /// Returns `(liked, num_of_likes)` or `None` when the frame is gone.
    pub fn toggle_like(&self, frame_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<Option<(bool, i64)>> {
        self.with_tx(|tx| {
            if find_frame(tx, frame_id)?.is_none() {
                return Ok(None);
            }

            let event = NotificationEvent::FrameLiked {
                frame_id: frame_id.parse::<Uuid>()?,
                liker_id: user_id.parse::<Uuid>()?,
            };

            let now_liked = if liked(tx, frame_id, user_id)? {
                tx.execute(
                    "DELETE FROM likes WHERE frame_id = ?1 AND user_id = ?2",
                    (frame_id, user_id),
                )?;
                tx.execute(
                    "UPDATE frames SET num_of_likes = num_of_likes - 1 WHERE id = ?1",
                    [frame_id],
                )?;
                notifications::retract_event(tx, &event)?;
                false
            } else {
                tx.execute(
                    "INSERT INTO likes (frame_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    (frame_id, user_id, now),
                )?;
                tx.execute(
                    "UPDATE frames SET num_of_likes = num_of_likes + 1 WHERE id = ?1",
                    [frame_id],
                )?;
                notifications::record_event(tx, &event, now)?;
                true
            };

            let num_of_likes =
                tx.query_row("SELECT num_of_likes FROM frames WHERE id = ?1", [frame_id], |row| row.get(0))?;
            Ok(Some((now_liked, num_of_likes)))
        })
    }
}

fn find_frame(conn: &Connection, id: &str) -> Result<Option<FrameRow>> {
    let sql = format!("SELECT {} FROM frames WHERE id = ?1", FRAME_COLUMNS);
    conn.query_row(&sql, [id], map_frame).optional()
}

fn liked(conn: &Connection, frame_id: &str, user_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM likes WHERE frame_id = ?1 AND user_id = ?2",
            (frame_id, user_id),
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
