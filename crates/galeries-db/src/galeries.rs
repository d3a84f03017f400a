use anyhow::Result;
use chrono::{DateTime, Utc};
use galeries_types::events::NotificationEvent;
use galeries_types::models::GalerieRole;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    GalerieRow, INVITATION_COLUMNS, InvitationRow, map_galerie, map_invitation, parse_galerie_role,
};
use crate::{Database, OptionalExt, new_id, notifications};

#[derive(Debug)]
pub enum SubscribeOutcome {
    Joined(GalerieRow),
    InvalidCode,
    Expired,
    AlreadyMember,
}

impl Database {
    /// Create a galerie with its creator as the first member.
    pub fn create_galerie(
        &self,
        name: &str,
        description: Option<&str>,
        creator_id: &str,
        now: DateTime<Utc>,
    ) -> Result<GalerieRow> {
        self.with_tx(|tx| {
            let id = new_id();
            tx.execute(
                "INSERT INTO galeries (id, name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
                (&id, name, description, now),
            )?;
            insert_member(tx, &id, creator_id, GalerieRole::Creator, now)?;

            Ok(GalerieRow {
                id,
                name: name.to_string(),
                description: description.map(str::to_string),
                created_at: now,
            })
        })
    }

    pub fn get_galerie(&self, id: &str) -> Result<Option<GalerieRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, description, created_at FROM galeries WHERE id = ?1",
                [id],
                map_galerie,
            )
            .optional()
        })
    }

    /// Galeries the user belongs to, with their role in each.
    pub fn list_galeries_for(&self, user_id: &str) -> Result<Vec<(GalerieRow, GalerieRole)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.id, g.name, g.description, g.created_at, gu.role
                 FROM galeries g
                 JOIN galerie_users gu ON gu.galerie_id = g.id
                 WHERE gu.user_id = ?1
                 ORDER BY g.created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| Ok((map_galerie(row)?, parse_galerie_role(row, 4)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn galerie_role(&self, galerie_id: &str, user_id: &str) -> Result<Option<GalerieRole>> {
        self.with_conn(|conn| member_role(conn, galerie_id, user_id))
    }

    pub fn add_galerie_member(
        &self,
        galerie_id: &str,
        user_id: &str,
        role: GalerieRole,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| insert_member(conn, galerie_id, user_id, role, now))
    }

    pub fn create_invitation(
        &self,
        galerie_id: &str,
        created_by_id: &str,
        code: &str,
        num_of_invits: Option<i64>,
        time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<InvitationRow> {
        self.with_conn(|conn| {
            let id = new_id();
            conn.execute(
                "INSERT INTO invitations (id, galerie_id, created_by_id, code, num_of_invits, time, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![&id, galerie_id, created_by_id, code, num_of_invits, time, now],
            )?;

            Ok(InvitationRow {
                id,
                galerie_id: galerie_id.to_string(),
                created_by_id: Some(created_by_id.to_string()),
                code: code.to_string(),
                num_of_invits,
                time,
                created_at: now,
            })
        })
    }

    /// Join a galerie through an invitation code.
    ///
    /// Spends one use of the invitation; the last use and expired codes
    /// delete it. The galerie's managers get a USER_SUBSCRIBE notification.
    pub fn subscribe(&self, code: &str, user_id: &str, now: DateTime<Utc>) -> Result<SubscribeOutcome> {
        self.with_tx(|tx| {
            let sql = format!("SELECT {} FROM invitations WHERE code = ?1", INVITATION_COLUMNS);
            let Some(invitation) = tx.query_row(&sql, [code], map_invitation).optional()? else {
                return Ok(SubscribeOutcome::InvalidCode);
            };

            if invitation.time.is_some_and(|t| t <= now) {
                tx.execute("DELETE FROM invitations WHERE id = ?1", [&invitation.id])?;
                return Ok(SubscribeOutcome::Expired);
            }
            if member_role(tx, &invitation.galerie_id, user_id)?.is_some() {
                return Ok(SubscribeOutcome::AlreadyMember);
            }

            match invitation.num_of_invits {
                Some(n) if n <= 1 => {
                    tx.execute("DELETE FROM invitations WHERE id = ?1", [&invitation.id])?;
                }
                Some(_) => {
                    tx.execute(
                        "UPDATE invitations SET num_of_invits = num_of_invits - 1 WHERE id = ?1",
                        [&invitation.id],
                    )?;
                }
                None => {}
            }

            insert_member(tx, &invitation.galerie_id, user_id, GalerieRole::User, now)?;

            let event = NotificationEvent::UserSubscribe {
                galerie_id: invitation.galerie_id.parse::<Uuid>()?,
                user_id: user_id.parse::<Uuid>()?,
            };
            notifications::record_event(tx, &event, now)?;

            let galerie = tx.query_row(
                "SELECT id, name, description, created_at FROM galeries WHERE id = ?1",
                [&invitation.galerie_id],
                map_galerie,
            )?;
            info!("User {} joined galerie {}", user_id, galerie.id);
            Ok(SubscribeOutcome::Joined(galerie))
        })
    }

    /// Change a member's role and notify them. Returns false when the user
    /// is not a member.
    pub fn change_galerie_role(
        &self,
        galerie_id: &str,
        user_id: &str,
        role: GalerieRole,
        changed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE galerie_users SET role = ?3 WHERE galerie_id = ?1 AND user_id = ?2",
                (galerie_id, user_id, role.as_str()),
            )?;
            if changed == 0 {
                return Ok(false);
            }

            let event = NotificationEvent::GalerieRoleChange {
                galerie_id: galerie_id.parse::<Uuid>()?,
                user_id: user_id.parse::<Uuid>()?,
                role,
                changed_by: changed_by.parse::<Uuid>()?,
            };
            notifications::record_event(tx, &event, now)?;
            Ok(true)
        })
    }

    /// Leave a galerie, taking back the user's USER_SUBSCRIBE notification.
    pub fn leave_galerie(&self, galerie_id: &str, user_id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            if member_role(tx, galerie_id, user_id)?.is_none() {
                return Ok(false);
            }

            let event = NotificationEvent::UserSubscribe {
                galerie_id: galerie_id.parse::<Uuid>()?,
                user_id: user_id.parse::<Uuid>()?,
            };
            notifications::retract_event(tx, &event)?;

            tx.execute(
                "DELETE FROM galerie_users WHERE galerie_id = ?1 AND user_id = ?2",
                (galerie_id, user_id),
            )?;
            Ok(true)
        })
    }
}

pub(crate) fn member_role(conn: &Connection, galerie_id: &str, user_id: &str) -> Result<Option<GalerieRole>> {
    conn.query_row(
        "SELECT role FROM galerie_users WHERE galerie_id = ?1 AND user_id = ?2",
        (galerie_id, user_id),
        |row| parse_galerie_role(row, 0),
    )
    .optional()
}

fn insert_member(
    conn: &Connection,
    galerie_id: &str,
    user_id: &str,
    role: GalerieRole,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO galerie_users (galerie_id, user_id, role, created_at) VALUES (?1, ?2, ?3, ?4)",
        (galerie_id, user_id, role.as_str(), now),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{db, t0, user};
    use chrono::Duration;
    use galeries_types::models::NotificationType;

    #[test]
    fn subscribing_notifies_managers() {
        let db = db();
        let creator = user(&db, "creator");
        let admin = user(&db, "admin");
        let alice = user(&db, "alice");
        let galerie = db.create_galerie("g", Some("desc"), &creator.id, t0()).unwrap();
        db.add_galerie_member(&galerie.id, &admin.id, GalerieRole::Admin, t0()).unwrap();
        db.create_invitation(&galerie.id, &creator.id, "CODE", None, None, t0()).unwrap();

        let outcome = db.subscribe("CODE", &alice.id, t0()).unwrap();
        assert!(matches!(outcome, SubscribeOutcome::Joined(_)));
        assert_eq!(db.galerie_role(&galerie.id, &alice.id).unwrap(), Some(GalerieRole::User));

        for manager in [&creator, &admin] {
            let rows = db.list_notifications(&manager.id).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].kind, NotificationType::UserSubscribe);
        }

        let again = db.subscribe("CODE", &alice.id, t0()).unwrap();
        assert!(matches!(again, SubscribeOutcome::AlreadyMember));
    }

    #[test]
    fn invitation_uses_run_out() {
        let db = db();
        let creator = user(&db, "creator");
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let galerie = db.create_galerie("g", None, &creator.id, t0()).unwrap();
        db.create_invitation(&galerie.id, &creator.id, "ONCE", Some(1), None, t0()).unwrap();

        assert!(matches!(db.subscribe("ONCE", &alice.id, t0()).unwrap(), SubscribeOutcome::Joined(_)));
        assert!(matches!(db.subscribe("ONCE", &bob.id, t0()).unwrap(), SubscribeOutcome::InvalidCode));
    }

    #[test]
    fn expired_invitation_is_rejected() {
        let db = db();
        let creator = user(&db, "creator");
        let alice = user(&db, "alice");
        let galerie = db.create_galerie("g", None, &creator.id, t0()).unwrap();
        let expiry = t0() + Duration::hours(1);
        db.create_invitation(&galerie.id, &creator.id, "SOON", None, Some(expiry), t0()).unwrap();

        let outcome = db.subscribe("SOON", &alice.id, t0() + Duration::hours(2)).unwrap();
        assert!(matches!(outcome, SubscribeOutcome::Expired));
        assert!(db.galerie_role(&galerie.id, &alice.id).unwrap().is_none());
    }

    #[test]
    fn leaving_retracts_subscription_notice() {
        let db = db();
        let creator = user(&db, "creator");
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let galerie = db.create_galerie("g", None, &creator.id, t0()).unwrap();
        db.create_invitation(&galerie.id, &creator.id, "CODE", None, None, t0()).unwrap();

        db.subscribe("CODE", &alice.id, t0()).unwrap();
        db.subscribe("CODE", &bob.id, t0()).unwrap();
        assert_eq!(db.list_notifications(&creator.id).unwrap()[0].num, 2);

        assert!(db.leave_galerie(&galerie.id, &alice.id).unwrap());
        assert_eq!(db.list_notifications(&creator.id).unwrap()[0].num, 1);
        assert!(!db.leave_galerie(&galerie.id, &alice.id).unwrap());
    }

    #[test]
    fn galerie_role_change_notifies_member() {
        let db = db();
        let creator = user(&db, "creator");
        let alice = user(&db, "alice");
        let galerie = db.create_galerie("g", None, &creator.id, t0()).unwrap();
        db.add_galerie_member(&galerie.id, &alice.id, GalerieRole::User, t0()).unwrap();

        assert!(db.change_galerie_role(&galerie.id, &alice.id, GalerieRole::Admin, &creator.id, t0()).unwrap());
        assert_eq!(db.galerie_role(&galerie.id, &alice.id).unwrap(), Some(GalerieRole::Admin));

        let rows = db.list_notifications(&alice.id).unwrap();
        assert_eq!(rows[0].kind, NotificationType::GalerieRoleChange);
        assert_eq!(rows[0].role.as_deref(), Some("admin"));

        let outsider = user(&db, "outsider");
        assert!(!db.change_galerie_role(&galerie.id, &outsider.id, GalerieRole::Admin, &creator.id, t0()).unwrap());
    }
}
