use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use textbin_types::models::TextFields;

pub const MAX_TITLE_BYTES: usize = 100;
pub const MAX_CONTENT_BYTES: usize = 1_000_000;
/// Stored timestamps are four-digit-year RFC 3339.
const MAX_EXPIRY_YEAR: i32 = 9999;

/// Field name -> message. Ordered so responses and logs are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn single(field: &str, message: &str) -> Self {
        let mut v = Validator::new();
        v.add_error(field, message);
        v.errors
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Collects problems across a whole record so the client can fix them in one pass.
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` for `field` unless that field already has one.
    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .0
            .entry(field.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Validates a complete (possibly post-update) text against `now`.
pub fn validate_text(
    fields: &TextFields,
    owner_user_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<(), ValidationErrors> {
    let mut v = Validator::new();

    v.check(!fields.title.is_empty(), "title", "must be provided");
    v.check(
        fields.title.len() <= MAX_TITLE_BYTES,
        "title",
        "must not be more than 100 bytes long",
    );

    v.check(!fields.content.is_empty(), "content", "must be provided");
    v.check(
        fields.content.len() <= MAX_CONTENT_BYTES,
        "content",
        "must not be more than 1000000 bytes long",
    );

    v.check(!fields.format.is_empty(), "format", "must be provided");

    v.check(fields.expires_at > now, "expires_at", "must be in the future");
    v.check(
        fields.expires_at.year() <= MAX_EXPIRY_YEAR,
        "expires_at",
        "must be before the year 10000",
    );

    v.check(
        !fields.is_private || owner_user_id.is_some(),
        "is_private",
        "anonymous texts cannot be private",
    );

    v.finish()
}

/// Comments only need to be present.
pub fn validate_comment(content: &str) -> Result<(), ValidationErrors> {
    let mut v = Validator::new();
    v.check(!content.trim().is_empty(), "content", "must be provided");
    v.finish()
}
