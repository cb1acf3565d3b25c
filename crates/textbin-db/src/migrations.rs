use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (texts, likes, comments)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE texts (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                slug            TEXT NOT NULL UNIQUE,
                title           TEXT NOT NULL,
                content         TEXT NOT NULL,
                format          TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                expires_at      TEXT NOT NULL,
                is_private      INTEGER NOT NULL DEFAULT 0,
                owner_user_id   INTEGER,
                version         INTEGER NOT NULL DEFAULT 1,
                CHECK (is_private = 0 OR owner_user_id IS NOT NULL)
            );

            CREATE INDEX idx_texts_expires ON texts(expires_at);

            CREATE TABLE likes (
                user_id     INTEGER NOT NULL,
                text_id     INTEGER NOT NULL REFERENCES texts(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (user_id, text_id)
            );

            CREATE INDEX idx_likes_text ON likes(text_id);

            CREATE TABLE comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL,
                text_id     INTEGER NOT NULL REFERENCES texts(id) ON DELETE CASCADE,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_text ON comments(text_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
