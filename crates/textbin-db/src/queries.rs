use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use textbin_types::models::{NewText, TextFields, TextRecord};
use tracing::info;

use crate::Database;
use crate::error::{StoreError, StoreResult, constraint_code};
use crate::models::{SqlTime, TEXT_COLUMNS, text_from_row};
use crate::validator::validate_text;

impl Database {
    // -- Texts --

    /// Inserts a validated text with `version = 1` and `created_at = now`.
    ///
    /// A slug taken since allocation surfaces as `ConstraintViolation`, never
    /// as a validation failure.
    pub fn insert_text(&self, new: NewText) -> StoreResult<TextRecord> {
        let now = self.now();
        let fields = TextFields {
            title: new.title,
            content: new.content,
            format: new.format,
            expires_at: new.expires_at,
            is_private: new.is_private,
        };
        validate_text(&fields, new.owner_user_id, now).map_err(StoreError::Validation)?;

        let record = self.with_conn_mut(|conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO texts (slug, title, content, format, created_at, expires_at, is_private, owner_user_id, version)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)
                     RETURNING {TEXT_COLUMNS}"
                ),
                params![
                    new.slug,
                    fields.title,
                    fields.content,
                    fields.format,
                    SqlTime(now),
                    SqlTime(fields.expires_at),
                    fields.is_private,
                    new.owner_user_id,
                ],
                text_from_row,
            )
            .map_err(|e| match constraint_code(&e) {
                Some(code) if code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    StoreError::ConstraintViolation
                }
                _ => e.into(),
            })
        })?;

        info!(
            "Text '{}' created (owner: {:?}, private: {})",
            record.slug, record.owner_user_id, record.is_private
        );
        Ok(record)
    }

    /// Private, expired and absent texts all come back as `NotFound`.
    pub fn get_text_by_slug(&self, slug: &str, requester: Option<i64>) -> StoreResult<TextRecord> {
        let now = self.now();
        self.with_conn(|conn| query_visible(conn, slug, requester, now))?
            .ok_or(StoreError::NotFound)
    }

    pub fn slug_exists(&self, slug: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM texts WHERE slug = ?1)",
                [slug],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Optimistic update.
    ///
    /// The requester must own the text, or the text must be anonymous (anyone
    /// holding the slug may edit those). `mutate` sees only the editable
    /// fields; the merged result is re-validated before the write. The write
    /// itself is a single conditional `UPDATE` on `version`, so a concurrent
    /// writer that got there first turns this call into `EditConflict`.
    pub fn update_text_by_slug<F>(
        &self,
        slug: &str,
        expected_version: i32,
        requester: Option<i64>,
        mutate: F,
    ) -> StoreResult<TextRecord>
    where
        F: FnOnce(&mut TextFields),
    {
        let now = self.now();
        let current = self
            .with_conn(|conn| query_editable(conn, slug, requester, now))?
            .ok_or(StoreError::NotFound)?;

        if current.version != expected_version {
            return Err(StoreError::EditConflict);
        }

        let mut fields = current.fields();
        mutate(&mut fields);
        validate_text(&fields, current.owner_user_id, now).map_err(StoreError::Validation)?;

        let updated = self.with_conn_mut(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "UPDATE texts
                         SET title = ?1, content = ?2, format = ?3, expires_at = ?4, is_private = ?5,
                             version = version + 1
                         WHERE id = ?6 AND version = ?7
                           AND (owner_user_id IS NULL OR owner_user_id = ?8)
                         RETURNING {TEXT_COLUMNS}"
                    ),
                    params![
                        fields.title,
                        fields.content,
                        fields.format,
                        SqlTime(fields.expires_at),
                        fields.is_private,
                        current.id,
                        expected_version,
                        requester,
                    ],
                    text_from_row,
                )
                .optional()?;
            Ok(row)
        })?;

        updated.ok_or(StoreError::EditConflict)
    }

    /// Same ownership policy as [`Database::update_text_by_slug`]. Likes and
    /// comments go with the text through `ON DELETE CASCADE`.
    pub fn delete_text_by_slug(&self, slug: &str, requester: Option<i64>) -> StoreResult<()> {
        let now = self.now();
        let deleted = self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM texts
                 WHERE slug = ?1 AND expires_at > ?2
                   AND (owner_user_id IS NULL OR owner_user_id = ?3)",
                params![slug, SqlTime(now), requester],
            )?;
            Ok(n)
        })?;

        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        info!("Text '{}' deleted", slug);
        Ok(())
    }

    /// Hard-deletes every text whose expiry has passed. Returns the count.
    pub fn purge_expired(&self) -> StoreResult<usize> {
        let now = self.now();
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM texts WHERE expires_at <= ?1",
                [SqlTime(now)],
            )?;
            Ok(n)
        })
    }
}

fn query_visible(
    conn: &Connection,
    slug: &str,
    requester: Option<i64>,
    now: DateTime<Utc>,
) -> StoreResult<Option<TextRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {TEXT_COLUMNS} FROM texts
         WHERE slug = ?1 AND expires_at > ?2
           AND (is_private = 0 OR owner_user_id = ?3)"
    ))?;
    let row = stmt
        .query_row(params![slug, SqlTime(now), requester], text_from_row)
        .optional()?;
    Ok(row)
}

fn query_editable(
    conn: &Connection,
    slug: &str,
    requester: Option<i64>,
    now: DateTime<Utc>,
) -> StoreResult<Option<TextRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {TEXT_COLUMNS} FROM texts
         WHERE slug = ?1 AND expires_at > ?2
           AND (owner_user_id IS NULL OR owner_user_id = ?3)"
    ))?;
    let row = stmt
        .query_row(params![slug, SqlTime(now), requester], text_from_row)
        .optional()?;
    Ok(row)
}
