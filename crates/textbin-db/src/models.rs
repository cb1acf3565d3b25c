//! Row mapping between SQLite and the `textbin-types` models.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use textbin_types::models::{Comment, TextRecord};

pub(crate) const TEXT_COLUMNS: &str =
    "id, slug, title, content, format, created_at, expires_at, is_private, owner_user_id, version";

pub(crate) const COMMENT_COLUMNS: &str = "id, user_id, text_id, content, created_at, updated_at";

/// Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`), so
/// string comparison in SQL orders them chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SqlTime(pub DateTime<Utc>);

impl SqlTime {
    pub fn encode(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
    }
}

impl ToSql for SqlTime {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.encode()))
    }
}

impl FromSql for SqlTime {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        DateTime::parse_from_rfc3339(s)
            .map(|dt| SqlTime(dt.with_timezone(&Utc)))
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Expects the columns in [`TEXT_COLUMNS`] order.
pub(crate) fn text_from_row(row: &Row<'_>) -> rusqlite::Result<TextRecord> {
    Ok(TextRecord {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        format: row.get(4)?,
        created_at: row.get::<_, SqlTime>(5)?.0,
        expires_at: row.get::<_, SqlTime>(6)?.0,
        is_private: row.get(7)?,
        owner_user_id: row.get(8)?,
        version: row.get(9)?,
    })
}

/// Expects the columns in [`COMMENT_COLUMNS`] order.
pub(crate) fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        text_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get::<_, SqlTime>(4)?.0,
        updated_at: row.get::<_, SqlTime>(5)?.0,
    })
}
