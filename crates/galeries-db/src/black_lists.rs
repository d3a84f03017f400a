use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::models::{BLACK_LIST_COLUMNS, BlackListRow, map_black_list};
use crate::{Database, OptionalExt, new_id, users};

/// What an update does to a black-list's expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryChange {
    Keep,
    /// Make it permanent.
    Never,
    At(DateTime<Utc>),
}

#[derive(Debug)]
pub enum BlackListOutcome {
    Created(BlackListRow),
    UserNotFound,
    AlreadyBlackListed,
}

impl Database {
    /// Whether the user is currently black-listed.
    ///
    /// Expiry is lazy: when the newest black-list has run out it is deleted
    /// and the user's flag cleared on the way through. Calling this again
    /// afterwards is a cheap `false`.
    pub fn check_black_list(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.with_tx(|tx| is_black_listed(tx, user_id, now))
    }

    pub fn create_black_list(
        &self,
        user_id: &str,
        created_by_id: &str,
        reason: &str,
        time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<BlackListOutcome> {
        self.with_tx(|tx| {
            if users::find_user(tx, user_id)?.is_none() {
                return Ok(BlackListOutcome::UserNotFound);
            }
            if is_black_listed(tx, user_id, now)? {
                return Ok(BlackListOutcome::AlreadyBlackListed);
            }

            let id = new_id();
            tx.execute(
                "INSERT INTO black_lists (id, user_id, created_by_id, reason, time, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
                rusqlite::params![&id, user_id, created_by_id, reason, time, now],
            )?;
            tx.execute(
                "UPDATE users SET is_black_listed = 1, updated_at = ?2 WHERE id = ?1",
                (user_id, now),
            )?;

            info!("User {} black-listed by {}", user_id, created_by_id);
            let row = find_black_list(tx, &id)?
                .ok_or_else(|| anyhow::anyhow!("black list {} vanished after insert", id))?;
            Ok(BlackListOutcome::Created(row))
        })
    }

    /// Fetch a black-list, expiring it on the way when it has run out.
    pub fn get_black_list(&self, id: &str, now: DateTime<Utc>) -> Result<Option<BlackListRow>> {
        self.with_tx(|tx| {
            let Some(row) = find_black_list(tx, id)? else {
                return Ok(None);
            };
            if row.is_expired(now) {
                tx.execute("DELETE FROM black_lists WHERE id = ?1", [&row.id])?;
                sync_flag(tx, &row.user_id, now)?;
                return Ok(None);
            }
            Ok(Some(row))
        })
    }

    pub fn list_black_lists(&self) -> Result<Vec<BlackListRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM black_lists ORDER BY created_at DESC, rowid DESC",
                BLACK_LIST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_black_list)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Change the reason or the expiry of a black-list that still holds.
    ///
    /// Rows that have run out or were deactivated by the sweep are expired
    /// on the way and answer `None`, like [`Database::get_black_list`].
    pub fn update_black_list(
        &self,
        id: &str,
        reason: Option<&str>,
        expiry: ExpiryChange,
        updated_by_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BlackListRow>> {
        self.with_tx(|tx| {
            let Some(row) = find_black_list(tx, id)? else {
                return Ok(None);
            };
            if row.is_expired(now) {
                tx.execute("DELETE FROM black_lists WHERE id = ?1", [&row.id])?;
                sync_flag(tx, &row.user_id, now)?;
                return Ok(None);
            }

            let time = match expiry {
                ExpiryChange::Keep => row.time,
                ExpiryChange::Never => None,
                ExpiryChange::At(time) => Some(time),
            };
            tx.execute(
                "UPDATE black_lists
                 SET reason = COALESCE(?2, reason), time = ?3, updated_by_id = ?4, updated_at = ?5
                 WHERE id = ?1",
                rusqlite::params![id, reason, time, updated_by_id, now],
            )?;
            sync_flag(tx, &row.user_id, now)?;
            find_black_list(tx, id)
        })
    }

    /// Lift a black-list. Returns the affected user's id.
    pub fn delete_black_list(&self, id: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        self.with_tx(|tx| {
            let user_id: Option<String> = tx
                .query_row(
                    "DELETE FROM black_lists WHERE id = ?1 RETURNING user_id",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(user_id) = &user_id {
                sync_flag(tx, user_id, now)?;
            }
            Ok(user_id)
        })
    }

    /// Maintenance sweep: deactivate every black-list whose expiry has
    /// passed and clear the flag of users left without one.
    pub fn expire_black_lists(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_tx(|tx| {
            let mut stmt = tx.prepare(
                "UPDATE black_lists SET active = 0, updated_at = ?1
                 WHERE active = 1 AND time IS NOT NULL AND time <= ?1
                 RETURNING user_id",
            )?;
            let user_ids = stmt
                .query_map([now], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            drop(stmt);

            for user_id in &user_ids {
                sync_flag(tx, user_id, now)?;
            }

            if !user_ids.is_empty() {
                info!("Deactivated {} expired black lists", user_ids.len());
            }
            Ok(user_ids.len())
        })
    }
}

pub(crate) fn is_black_listed(conn: &Connection, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
    let flagged: Option<bool> = conn
        .query_row(
            "SELECT is_black_listed FROM users WHERE id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .optional()?;
    if flagged != Some(true) {
        return Ok(false);
    }

    let sql = format!(
        "SELECT {} FROM black_lists WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
        BLACK_LIST_COLUMNS
    );
    let newest = conn.query_row(&sql, [user_id], map_black_list).optional()?;

    match newest {
        Some(row) if !row.is_expired(now) => Ok(true),
        stale => {
            if let Some(row) = stale {
                conn.execute("DELETE FROM black_lists WHERE id = ?1", [&row.id])?;
            }
            conn.execute(
                "UPDATE users SET is_black_listed = 0, updated_at = ?2 WHERE id = ?1",
                (user_id, now),
            )?;
            info!("Black list of user {} expired", user_id);
            Ok(false)
        }
    }
}

fn find_black_list(conn: &Connection, id: &str) -> Result<Option<BlackListRow>> {
    let sql = format!("SELECT {} FROM black_lists WHERE id = ?1", BLACK_LIST_COLUMNS);
    conn.query_row(&sql, [id], map_black_list).optional()
}

/// Recompute a user's flag from their remaining live black-lists.
fn sync_flag(conn: &Connection, user_id: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE users SET is_black_listed = EXISTS (
             SELECT 1 FROM black_lists
             WHERE user_id = ?1 AND active = 1 AND (time IS NULL OR time > ?2)
         ), updated_at = ?2
         WHERE id = ?1",
        (user_id, now),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{db, t0, user};
    use chrono::Duration;

    #[test]
    fn expired_black_list_clears_flag_idempotently() {
        let db = db();
        let moderator = user(&db, "moderator");
        let alice = user(&db, "alice");

        let expiry = t0() + Duration::hours(2);
        db.create_black_list(&alice.id, &moderator.id, "spam", Some(expiry), t0()).unwrap();
        assert!(db.check_black_list(&alice.id, t0() + Duration::hours(1)).unwrap());
        assert!(db.get_user(&alice.id).unwrap().unwrap().is_black_listed);

        let later = t0() + Duration::hours(3);
        assert!(!db.check_black_list(&alice.id, later).unwrap());
        assert!(!db.get_user(&alice.id).unwrap().unwrap().is_black_listed);
        assert!(db.list_black_lists().unwrap().is_empty());

        assert!(!db.check_black_list(&alice.id, later).unwrap());
        assert!(!db.get_user(&alice.id).unwrap().unwrap().is_black_listed);
    }

    #[test]
    fn permanent_black_list_holds() {
        let db = db();
        let moderator = user(&db, "moderator");
        let alice = user(&db, "alice");

        db.create_black_list(&alice.id, &moderator.id, "abuse", None, t0()).unwrap();
        assert!(db.check_black_list(&alice.id, t0() + Duration::days(365)).unwrap());
    }

    #[test]
    fn cannot_black_list_twice() {
        let db = db();
        let moderator = user(&db, "moderator");
        let alice = user(&db, "alice");

        db.create_black_list(&alice.id, &moderator.id, "spam", None, t0()).unwrap();
        let again = db.create_black_list(&alice.id, &moderator.id, "spam", None, t0()).unwrap();
        assert!(matches!(again, BlackListOutcome::AlreadyBlackListed));

        let missing = db
            .create_black_list("nobody", &moderator.id, "spam", None, t0())
            .unwrap();
        assert!(matches!(missing, BlackListOutcome::UserNotFound));
    }

    #[test]
    fn black_list_again_after_expiry() {
        let db = db();
        let moderator = user(&db, "moderator");
        let alice = user(&db, "alice");

        db.create_black_list(&alice.id, &moderator.id, "spam", Some(t0() + Duration::hours(1)), t0())
            .unwrap();
        let later = t0() + Duration::hours(2);
        let outcome = db.create_black_list(&alice.id, &moderator.id, "spam again", None, later).unwrap();
        assert!(matches!(outcome, BlackListOutcome::Created(_)));
        assert!(db.check_black_list(&alice.id, later).unwrap());
    }

    #[test]
    fn sweep_deactivates_expired_rows() {
        let db = db();
        let moderator = user(&db, "moderator");
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        db.create_black_list(&alice.id, &moderator.id, "spam", Some(t0() + Duration::hours(1)), t0())
            .unwrap();
        db.create_black_list(&bob.id, &moderator.id, "abuse", None, t0()).unwrap();

        let swept = db.expire_black_lists(t0() + Duration::hours(2)).unwrap();
        assert_eq!(swept, 1);
        assert!(!db.get_user(&alice.id).unwrap().unwrap().is_black_listed);
        assert!(db.get_user(&bob.id).unwrap().unwrap().is_black_listed);

        let rows = db.list_black_lists().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.user_id == alice.id && !r.active));

        assert_eq!(db.expire_black_lists(t0() + Duration::hours(3)).unwrap(), 0);
    }

    #[test]
    fn lifting_black_list_clears_flag() {
        let db = db();
        let moderator = user(&db, "moderator");
        let alice = user(&db, "alice");

        let BlackListOutcome::Created(row) =
            db.create_black_list(&alice.id, &moderator.id, "spam", None, t0()).unwrap()
        else {
            panic!("expected black list to be created");
        };

        assert_eq!(db.delete_black_list(&row.id, t0()).unwrap(), Some(alice.id.clone()));
        assert!(!db.check_black_list(&alice.id, t0()).unwrap());
        assert_eq!(db.delete_black_list(&row.id, t0()).unwrap(), None);
    }

    #[test]
    fn get_expires_lazily() {
        let db = db();
        let moderator = user(&db, "moderator");
        let alice = user(&db, "alice");

        let BlackListOutcome::Created(row) = db
            .create_black_list(&alice.id, &moderator.id, "spam", Some(t0() + Duration::hours(1)), t0())
            .unwrap()
        else {
            panic!("expected black list to be created");
        };

        assert!(db.get_black_list(&row.id, t0()).unwrap().is_some());
        assert!(db.get_black_list(&row.id, t0() + Duration::hours(2)).unwrap().is_none());
        assert!(!db.get_user(&alice.id).unwrap().unwrap().is_black_listed);
    }

    #[test]
    fn update_records_moderator_and_expiry() {
        let db = db();
        let moderator = user(&db, "moderator");
        let alice = user(&db, "alice");

        let BlackListOutcome::Created(row) =
            db.create_black_list(&alice.id, &moderator.id, "spam", None, t0()).unwrap()
        else {
            panic!("expected black list to be created");
        };

        let expiry = t0() + Duration::days(1);
        let updated = db
            .update_black_list(&row.id, Some("spam, again"), ExpiryChange::At(expiry), &moderator.id, t0())
            .unwrap()
            .unwrap();
        assert_eq!(updated.reason, "spam, again");
        assert_eq!(updated.time, Some(expiry));
        assert_eq!(updated.updated_by_id.as_deref(), Some(moderator.id.as_str()));
    }

    #[test]
    fn update_skips_rows_the_sweep_deactivated() {
        let db = db();
        let moderator = user(&db, "moderator");
        let alice = user(&db, "alice");

        let BlackListOutcome::Created(row) = db
            .create_black_list(&alice.id, &moderator.id, "spam", Some(t0() + Duration::hours(1)), t0())
            .unwrap()
        else {
            panic!("expected black list to be created");
        };

        let later = t0() + Duration::hours(2);
        assert_eq!(db.expire_black_lists(later).unwrap(), 1);

        let pushed = ExpiryChange::At(later + Duration::days(30));
        assert!(db.update_black_list(&row.id, None, pushed, &moderator.id, later).unwrap().is_none());
        assert!(!db.check_black_list(&alice.id, later).unwrap());
        assert!(db.list_black_lists().unwrap().is_empty());
    }

    #[test]
    fn update_can_make_black_list_permanent() {
        let db = db();
        let moderator = user(&db, "moderator");
        let alice = user(&db, "alice");

        let BlackListOutcome::Created(row) = db
            .create_black_list(&alice.id, &moderator.id, "spam", Some(t0() + Duration::hours(1)), t0())
            .unwrap()
        else {
            panic!("expected black list to be created");
        };

        let updated = db
            .update_black_list(&row.id, None, ExpiryChange::Never, &moderator.id, t0())
            .unwrap()
            .unwrap();
        assert_eq!(updated.time, None);
        assert_eq!(updated.reason, "spam");
        assert!(db.check_black_list(&alice.id, t0() + Duration::days(365)).unwrap());

        let kept = db
            .update_black_list(&row.id, Some("abuse"), ExpiryChange::Keep, &moderator.id, t0())
            .unwrap()
            .unwrap();
        assert_eq!(kept.time, None);
        assert_eq!(kept.reason, "abuse");
    }
}
