use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::models::{REPORT_COLUMNS, ReportRow, map_report};
use crate::{Database, OptionalExt, new_id};

/// What a report points at. Each target has at most one report row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportTarget {
    Frame(String),
    ProfilePicture(String),
}

impl ReportTarget {
    fn column(&self) -> &'static str {
        match self {
            Self::Frame(_) => "frame_id",
            Self::ProfilePicture(_) => "profile_picture_id",
        }
    }

    fn id(&self) -> &str {
        match self {
            Self::Frame(id) | Self::ProfilePicture(id) => id,
        }
    }
}

#[derive(Debug)]
pub enum ReportOutcome {
    Created(ReportRow),
    Incremented(ReportRow),
    AlreadyReported,
    /// The report was resolved by a moderator and takes no more reports.
    Classed,
}

#[derive(Debug)]
pub enum ClassifyOutcome {
    Classed(ReportRow),
    AlreadyClassed,
    NotFound,
}

impl Database {
    /// Add one user's report against a target.
    pub fn report(
        &self,
        target: &ReportTarget,
        user_id: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReportOutcome> {
        self.with_tx(|tx| {
            let sql = format!("SELECT {} FROM reports WHERE {} = ?1", REPORT_COLUMNS, target.column());
            let existing = tx.query_row(&sql, [target.id()], map_report).optional()?;

            let outcome = match existing {
                Some(report) if report.classed => return Ok(ReportOutcome::Classed),
                Some(report) => {
                    if has_reported(tx, &report.id, user_id)? {
                        return Ok(ReportOutcome::AlreadyReported);
                    }
                    tx.execute(
                        "UPDATE reports SET num_of_reports = num_of_reports + 1, updated_at = ?2 WHERE id = ?1",
                        (&report.id, now),
                    )?;
                    add_reporter(tx, &report.id, user_id, reason, now)?;
                    ReportOutcome::Incremented(ReportRow {
                        num_of_reports: report.num_of_reports + 1,
                        updated_at: now,
                        ..report
                    })
                }
                None => {
                    let id = new_id();
                    let (frame_id, profile_picture_id) = match target {
                        ReportTarget::Frame(target_id) => (Some(target_id.as_str()), None),
                        ReportTarget::ProfilePicture(target_id) => (None, Some(target_id.as_str())),
                    };
                    tx.execute(
                        "INSERT INTO reports (id, frame_id, profile_picture_id, num_of_reports, classed, created_at, updated_at)
                         VALUES (?1, ?2, ?3, 1, 0, ?4, ?4)",
                        (&id, frame_id, profile_picture_id, now),
                    )?;
                    add_reporter(tx, &id, user_id, reason, now)?;
                    ReportOutcome::Created(ReportRow {
                        id,
                        frame_id: frame_id.map(str::to_string),
                        profile_picture_id: profile_picture_id.map(str::to_string),
                        num_of_reports: 1,
                        classed: false,
                        created_at: now,
                        updated_at: now,
                    })
                }
            };

            Ok(outcome)
        })
    }

    /// Resolve a report. Classed is terminal.
    pub fn classify_report(&self, id: &str, now: DateTime<Utc>) -> Result<ClassifyOutcome> {
        self.with_tx(|tx| {
            let Some(report) = find_report(tx, id)? else {
                return Ok(ClassifyOutcome::NotFound);
            };
            if report.classed {
                return Ok(ClassifyOutcome::AlreadyClassed);
            }

            tx.execute("UPDATE reports SET classed = 1, updated_at = ?2 WHERE id = ?1", (id, now))?;
            info!("Report {} classed", id);
            Ok(ClassifyOutcome::Classed(ReportRow {
                classed: true,
                updated_at: now,
                ..report
            }))
        })
    }

    pub fn get_report(&self, id: &str) -> Result<Option<ReportRow>> {
        self.with_conn(|conn| find_report(conn, id))
    }

    /// Unclassed reports first, most reported first.
    pub fn list_reports(&self) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM reports ORDER BY classed ASC, num_of_reports DESC, updated_at DESC",
                REPORT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_report)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_report(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM reports WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }
}

fn find_report(conn: &Connection, id: &str) -> Result<Option<ReportRow>> {
    let sql = format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS);
    conn.query_row(&sql, [id], map_report).optional()
}

fn has_reported(conn: &Connection, report_id: &str, user_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM report_users WHERE report_id = ?1 AND user_id = ?2",
            (report_id, user_id),
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn add_reporter(
    conn: &Connection,
    report_id: &str,
    user_id: &str,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO report_users (report_id, user_id, reason, created_at) VALUES (?1, ?2, ?3, ?4)",
        (report_id, user_id, reason, now),
    )?;
    Ok(())
}
