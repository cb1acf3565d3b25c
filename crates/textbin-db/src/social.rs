use rusqlite::{OptionalExtension, params};
use textbin_types::models::Comment;

use crate::Database;
use crate::error::{StoreError, StoreResult, constraint_code};
use crate::models::{COMMENT_COLUMNS, SqlTime, comment_from_row};
use crate::validator::validate_comment;

/// The parent text vanished between lookup and write.
fn missing_parent(e: rusqlite::Error) -> StoreError {
    match constraint_code(&e) {
        Some(code) if code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => StoreError::NotFound,
        _ => e.into(),
    }
}

impl Database {
    // -- Likes --

    /// Idempotent: liking twice leaves one like and is not an error.
    pub fn add_like(&self, user_id: i64, text_id: i64) -> StoreResult<()> {
        let now = self.now();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO likes (user_id, text_id, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (user_id, text_id) DO NOTHING",
                params![user_id, text_id, SqlTime(now)],
            )
            .map_err(missing_parent)?;
            Ok(())
        })
    }

    /// Idempotent: removing a like that isn't there is a no-op.
    pub fn remove_like(&self, user_id: i64, text_id: i64) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND text_id = ?2",
                params![user_id, text_id],
            )?;
            Ok(())
        })
    }

    pub fn like_count(&self, text_id: i64) -> StoreResult<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM likes WHERE text_id = ?1",
                [text_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Comments --

    pub fn add_comment(&self, user_id: i64, text_id: i64, content: &str) -> StoreResult<Comment> {
        validate_comment(content).map_err(StoreError::Validation)?;
        let now = self.now();
        self.with_conn_mut(|conn| {
            let comment = conn
                .query_row(
                    &format!(
                        "INSERT INTO comments (user_id, text_id, content, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?4)
                         RETURNING {COMMENT_COLUMNS}"
                    ),
                    params![user_id, text_id, content, SqlTime(now)],
                    comment_from_row,
                )
                .map_err(missing_parent)?;
            Ok(comment)
        })
    }

    /// Only the author may edit. Someone else's comment and a missing one
    /// both come back as `NotFound`.
    pub fn update_comment(
        &self,
        comment_id: i64,
        user_id: i64,
        content: &str,
    ) -> StoreResult<Comment> {
        validate_comment(content).map_err(StoreError::Validation)?;
        let now = self.now();
        self.with_conn_mut(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE comments SET content = ?1, updated_at = ?2
                     WHERE id = ?3 AND user_id = ?4
                     RETURNING {COMMENT_COLUMNS}"
                ),
                params![content, SqlTime(now), comment_id, user_id],
                comment_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound)
        })
    }

    /// Only the author may delete; otherwise `NotFound`, never "forbidden".
    pub fn delete_comment(&self, comment_id: i64, user_id: i64) -> StoreResult<()> {
        let deleted = self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM comments WHERE id = ?1 AND user_id = ?2",
                params![comment_id, user_id],
            )?;
            Ok(n)
        })?;

        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Newest first; ties broken by id so equal timestamps stay stable.
    pub fn comments_for_text(&self, text_id: i64) -> StoreResult<Vec<Comment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {COMMENT_COLUMNS} FROM comments
                 WHERE text_id = ?1
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt
                .query_map([text_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
