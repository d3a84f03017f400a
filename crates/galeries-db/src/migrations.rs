use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                      TEXT PRIMARY KEY,
                user_name               TEXT NOT NULL UNIQUE,
                pseudonym               TEXT NOT NULL,
                email                   TEXT NOT NULL UNIQUE,
                password                TEXT NOT NULL,
                role                    TEXT NOT NULL DEFAULT 'user',
                is_black_listed         INTEGER NOT NULL DEFAULT 0,
                has_new_notifications   INTEGER NOT NULL DEFAULT 0,
                auth_token_version      INTEGER NOT NULL DEFAULT 0,
                created_at              TEXT NOT NULL,
                updated_at              TEXT NOT NULL,
                deleted_at              TEXT
            );

            CREATE TABLE black_lists (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_by_id   TEXT REFERENCES users(id) ON DELETE SET NULL,
                updated_by_id   TEXT REFERENCES users(id) ON DELETE SET NULL,
                reason          TEXT NOT NULL,
                time            TEXT,
                active          INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_black_lists_user ON black_lists(user_id, created_at);

            CREATE TABLE galeries (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                description TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE galerie_users (
                galerie_id  TEXT NOT NULL REFERENCES galeries(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (galerie_id, user_id)
            );

            CREATE TABLE invitations (
                id              TEXT PRIMARY KEY,
                galerie_id      TEXT NOT NULL REFERENCES galeries(id) ON DELETE CASCADE,
                created_by_id   TEXT REFERENCES users(id) ON DELETE SET NULL,
                code            TEXT NOT NULL UNIQUE,
                num_of_invits   INTEGER,
                time            TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE frames (
                id              TEXT PRIMARY KEY,
                galerie_id      TEXT NOT NULL REFERENCES galeries(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                description     TEXT,
                num_of_likes    INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_frames_galerie ON frames(galerie_id, created_at);

            CREATE TABLE likes (
                frame_id    TEXT NOT NULL REFERENCES frames(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (frame_id, user_id)
            );

            CREATE TABLE profile_pictures (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                current     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE reports (
                id                  TEXT PRIMARY KEY,
                frame_id            TEXT UNIQUE REFERENCES frames(id) ON DELETE CASCADE,
                profile_picture_id  TEXT UNIQUE REFERENCES profile_pictures(id) ON DELETE CASCADE,
                num_of_reports      INTEGER NOT NULL DEFAULT 1,
                classed             INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL,
                CHECK ((frame_id IS NULL) <> (profile_picture_id IS NULL))
            );

            CREATE TABLE report_users (
                report_id   TEXT NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                reason      TEXT,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (report_id, user_id)
            );

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                type        TEXT NOT NULL,
                num         INTEGER NOT NULL DEFAULT 1,
                seen        INTEGER NOT NULL DEFAULT 0,
                frame_id    TEXT REFERENCES frames(id) ON DELETE CASCADE,
                galerie_id  TEXT REFERENCES galeries(id) ON DELETE CASCADE,
                role        TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_lookup
                ON notifications(user_id, type, updated_at);

            -- One row per event folded into a notification; num == count(sources)
            CREATE TABLE notification_sources (
                id              TEXT PRIMARY KEY,
                notification_id TEXT NOT NULL REFERENCES notifications(id) ON DELETE CASCADE,
                user_id         TEXT REFERENCES users(id) ON DELETE CASCADE,
                frame_id        TEXT,
                created_at      TEXT NOT NULL,
                CHECK ((user_id IS NULL) <> (frame_id IS NULL))
            );

            CREATE INDEX idx_notification_sources_notification
                ON notification_sources(notification_id);

            CREATE TABLE beta_keys (
                id              TEXT PRIMARY KEY,
                code            TEXT NOT NULL UNIQUE,
                email           TEXT,
                created_by_id   TEXT REFERENCES users(id) ON DELETE SET NULL,
                user_id         TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE tickets (
                id          TEXT PRIMARY KEY,
                user_id     TEXT REFERENCES users(id) ON DELETE SET NULL,
                header      TEXT NOT NULL,
                body        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
