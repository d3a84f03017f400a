use anyhow::Result;
use chrono::{DateTime, Utc};
use galeries_types::events::NotificationEvent;
use galeries_types::models::Role;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::models::{ProfilePictureRow, USER_COLUMNS, UserRow, map_profile_picture, map_user};
use crate::{Database, OptionalExt, new_id, notifications};

/// Validated signup fields with the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_name: String,
    pub pseudonym: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug)]
pub enum SignupOutcome {
    Created(UserRow),
    InvalidBetaKey,
    UserNameTaken,
    EmailTaken,
}

impl Database {
    // -- Users --

    pub fn insert_user(&self, new: &NewUser, role: Role, now: DateTime<Utc>) -> Result<UserRow> {
        self.with_tx(|tx| insert_user(tx, new, role, now))
    }

    /// Create an account by consuming an unused beta key. The key's creator
    /// gets a BETA_KEY_USED notification in the same transaction.
    pub fn signup(&self, new: &NewUser, beta_key: &str, now: DateTime<Utc>) -> Result<SignupOutcome> {
        self.with_tx(|tx| {
            let key_id: Option<String> = tx
                .query_row(
                    "SELECT id FROM beta_keys WHERE code = ?1 AND user_id IS NULL",
                    [beta_key],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(key_id) = key_id else {
                return Ok(SignupOutcome::InvalidBetaKey);
            };

            if exists(tx, "SELECT 1 FROM users WHERE user_name = ?1", &new.user_name)? {
                return Ok(SignupOutcome::UserNameTaken);
            }
            if exists(tx, "SELECT 1 FROM users WHERE email = ?1", &new.email)? {
                return Ok(SignupOutcome::EmailTaken);
            }

            let user = insert_user(tx, new, Role::User, now)?;
            tx.execute(
                "UPDATE beta_keys SET user_id = ?1 WHERE id = ?2",
                (&user.id, &key_id),
            )?;

            notifications::record_event(
                tx,
                &NotificationEvent::BetaKeyUsed { beta_key_id: key_id.parse::<Uuid>()? },
                now,
            )?;

            info!("User {} signed up with beta key {}", user.id, key_id);
            Ok(SignupOutcome::Created(user))
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| find_user(conn, id))
    }

    /// Look up a live account by user name or email.
    pub fn get_user_by_login(&self, user_name_or_email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users WHERE (user_name = ?1 OR email = ?1) AND deleted_at IS NULL",
                USER_COLUMNS
            );
            conn.query_row(&sql, [user_name_or_email], map_user).optional()
        })
    }

    pub fn has_super_admin(&self) -> Result<bool> {
        self.with_conn(|conn| {
            exists(conn, "SELECT 1 FROM users WHERE role = ?1 AND deleted_at IS NULL", Role::SuperAdmin.as_str())
        })
    }

    /// Invalidate every refresh token issued so far. Returns the new version.
    pub fn bump_token_version(&self, id: &str, now: DateTime<Utc>) -> Result<i64> {
        self.with_conn(|conn| {
            let version = conn.query_row(
                "UPDATE users SET auth_token_version = auth_token_version + 1, updated_at = ?2
                 WHERE id = ?1 RETURNING auth_token_version",
                (id, now),
                |row| row.get(0),
            )?;
            Ok(version)
        })
    }

    pub fn soft_delete_user(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET deleted_at = ?2, updated_at = ?2,
                    auth_token_version = auth_token_version + 1
                 WHERE id = ?1 AND deleted_at IS NULL",
                (id, now),
            )?;
            Ok(changed > 0)
        })
    }

    /// Change a user's site role and notify them.
    pub fn change_role(
        &self,
        user_id: &str,
        role: Role,
        changed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRow>> {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1 AND deleted_at IS NULL",
                (user_id, role.as_str(), now),
            )?;
            if changed == 0 {
                return Ok(None);
            }

            let event = NotificationEvent::RoleChange {
                user_id: user_id.parse::<Uuid>()?,
                role,
                changed_by: changed_by.parse::<Uuid>()?,
            };
            notifications::record_event(tx, &event, now)?;

            find_user(tx, user_id)
        })
    }

    // -- Profile pictures --

    /// Add a profile picture and make it the current one.
    pub fn create_profile_picture(&self, user_id: &str, now: DateTime<Utc>) -> Result<ProfilePictureRow> {
        self.with_tx(|tx| {
            tx.execute("UPDATE profile_pictures SET current = 0 WHERE user_id = ?1", [user_id])?;

            let id = new_id();
            tx.execute(
                "INSERT INTO profile_pictures (id, user_id, current, created_at) VALUES (?1, ?2, 1, ?3)",
                (&id, user_id, now),
            )?;

            Ok(ProfilePictureRow {
                id,
                user_id: user_id.to_string(),
                current: true,
                created_at: now,
            })
        })
    }

    pub fn get_profile_picture(&self, id: &str) -> Result<Option<ProfilePictureRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, current, created_at FROM profile_pictures WHERE id = ?1",
                [id],
                map_profile_picture,
            )
            .optional()
        })
    }

    pub fn delete_profile_picture(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM profile_pictures WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(deleted > 0)
        })
    }
}

/// Live (not soft-deleted) user by id.
pub(crate) fn find_user(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1 AND deleted_at IS NULL", USER_COLUMNS);
    conn.query_row(&sql, [id], map_user).optional()
}

fn insert_user(conn: &Connection, new: &NewUser, role: Role, now: DateTime<Utc>) -> Result<UserRow> {
    let id = new_id();
    conn.execute(
        "INSERT INTO users (id, user_name, pseudonym, email, password, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        rusqlite::params![
            &id,
            &new.user_name,
            &new.pseudonym,
            &new.email,
            &new.password_hash,
            role.as_str(),
            now
        ],
    )?;

    Ok(UserRow {
        id,
        user_name: new.user_name.clone(),
        pseudonym: new.pseudonym.clone(),
        email: new.email.clone(),
        password: new.password_hash.clone(),
        role,
        is_black_listed: false,
        has_new_notifications: false,
        auth_token_version: 0,
        created_at: now,
        updated_at: now,
    })
}

fn exists(conn: &Connection, sql: &str, value: &str) -> Result<bool> {
    let found: Option<i64> = conn.query_row(sql, [value], |row| row.get(0)).optional()?;
    Ok(found.is_some())
}
