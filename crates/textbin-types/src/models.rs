use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who is making a request. Resolved by the HTTP layer before any store call;
/// the stores never authenticate, they only compare ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    User(i64),
}

impl Identity {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(*id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// A stored text. `id` is the internal surrogate key and is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRecord {
    #[serde(skip)]
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub format: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_private: bool,
    pub owner_user_id: Option<i64>,
    pub version: i32,
}

impl TextRecord {
    /// Snapshot of the fields an update is allowed to touch.
    pub fn fields(&self) -> TextFields {
        TextFields {
            title: self.title.clone(),
            content: self.content.clone(),
            format: self.format.clone(),
            expires_at: self.expires_at,
            is_private: self.is_private,
        }
    }
}

/// The mutable part of a [`TextRecord`]. `slug`, `created_at` and the owner
/// are absent, so a mutator cannot change them.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFields {
    pub title: String,
    pub content: String,
    pub format: String,
    pub expires_at: DateTime<Utc>,
    pub is_private: bool,
}

/// Input for a new text; the slug has already been allocated.
#[derive(Debug, Clone)]
pub struct NewText {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub format: String,
    pub expires_at: DateTime<Utc>,
    pub is_private: bool,
    pub owner_user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub user_id: i64,
    pub text_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A text merged with its likes and comments, assembled once per read.
#[derive(Debug, Clone, Serialize)]
pub struct TextView {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub format: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_private: bool,
    pub owner_user_id: Option<i64>,
    pub version: i32,
    pub like_count: i64,
    /// Newest first.
    pub comments: Vec<Comment>,
}

impl TextView {
    pub fn compose(record: TextRecord, like_count: i64, comments: Vec<Comment>) -> Self {
        Self {
            slug: record.slug,
            title: record.title,
            content: record.content,
            format: record.format,
            created_at: record.created_at,
            expires_at: record.expires_at,
            is_private: record.is_private,
            owner_user_id: record.owner_user_id,
            version: record.version,
            like_count,
            comments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TextRecord {
        let now = Utc::now();
        TextRecord {
            id: 42,
            slug: "hello-world".into(),
            title: "Hello".into(),
            content: "World".into(),
            format: "text".into(),
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
            is_private: false,
            owner_user_id: None,
            version: 1,
        }
    }

    #[test]
    fn identity_accessors() {
        assert_eq!(Identity::Anonymous.user_id(), None);
        assert!(Identity::Anonymous.is_anonymous());
        assert_eq!(Identity::User(7).user_id(), Some(7));
        assert!(!Identity::User(7).is_anonymous());
    }

    #[test]
    fn record_id_is_not_serialized() {
        let json = serde_json::to_value(record()).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["slug"], "hello-world");
        assert_eq!(json["version"], 1);
    }

    #[test]
    fn view_carries_aggregates() {
        let view = TextView::compose(record(), 3, vec![]);
        assert_eq!(view.slug, "hello-world");
        assert_eq!(view.like_count, 3);
        assert!(view.comments.is_empty());
    }
}
