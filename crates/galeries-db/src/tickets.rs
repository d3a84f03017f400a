use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{TicketRow, map_ticket};
use crate::{Database, new_id};

impl Database {
    pub fn create_ticket(&self, user_id: &str, header: &str, body: &str, now: DateTime<Utc>) -> Result<TicketRow> {
        self.with_conn(|conn| {
            let id = new_id();
            conn.execute(
                "INSERT INTO tickets (id, user_id, header, body, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (&id, user_id, header, body, now),
            )?;

            Ok(TicketRow {
                id,
                user_id: Some(user_id.to_string()),
                header: header.to_string(),
                body: body.to_string(),
                created_at: now,
            })
        })
    }

    pub fn list_tickets(&self) -> Result<Vec<TicketRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, header, body, created_at FROM tickets ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([], map_ticket)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_ticket(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM tickets WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }
}
