use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{BETA_KEY_COLUMNS, BetaKeyRow, map_beta_key};
use crate::{Database, new_id};

impl Database {
    pub fn create_beta_key(
        &self,
        code: &str,
        email: Option<&str>,
        created_by_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<BetaKeyRow> {
        self.with_conn(|conn| {
            let id = new_id();
            conn.execute(
                "INSERT INTO beta_keys (id, code, email, created_by_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (&id, code, email, created_by_id, now),
            )?;

            Ok(BetaKeyRow {
                id,
                code: code.to_string(),
                email: email.map(str::to_string),
                created_by_id: created_by_id.map(str::to_string),
                user_id: None,
                created_at: now,
            })
        })
    }

    /// Unused keys first, then newest first.
    pub fn list_beta_keys(&self) -> Result<Vec<BetaKeyRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM beta_keys ORDER BY user_id IS NOT NULL, created_at DESC",
                BETA_KEY_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_beta_key)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_beta_key(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM beta_keys WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{db, t0, user};

    #[test]
    fn codes_are_unique() {
        let db = db();
        let admin = user(&db, "admin");

        db.create_beta_key("SAME", None, Some(&admin.id), t0()).unwrap();
        assert!(db.create_beta_key("SAME", Some("x@galeries.test"), Some(&admin.id), t0()).is_err());
    }

    #[test]
    fn delete_removes_key() {
        let db = db();
        let key = db.create_beta_key("KEY", Some("x@galeries.test"), None, t0()).unwrap();

        assert!(db.delete_beta_key(&key.id).unwrap());
        assert!(db.list_beta_keys().unwrap().is_empty());
        assert!(!db.delete_beta_key(&key.id).unwrap());
    }
}
