use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Comment;

// -- JWT Claims --

/// Claims carried by the bearer tokens this service accepts. Tokens are
/// issued elsewhere; `sub` is the numeric user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Expiration --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

/// Relative expiration, e.g. `{"value": 2, "unit": "days"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpiresIn {
    pub value: u32,
    pub unit: ExpiryUnit,
}

impl ExpiresIn {
    /// Absolute expiry relative to `now`. `None` if the result is not representable.
    /// Months and years are calendar arithmetic, the rest fixed durations.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let value = i64::from(self.value);
        match self.unit {
            ExpiryUnit::Seconds => now.checked_add_signed(Duration::try_seconds(value)?),
            ExpiryUnit::Minutes => now.checked_add_signed(Duration::try_minutes(value)?),
            ExpiryUnit::Hours => now.checked_add_signed(Duration::try_hours(value)?),
            ExpiryUnit::Days => now.checked_add_signed(Duration::try_days(value)?),
            ExpiryUnit::Weeks => now.checked_add_signed(Duration::try_weeks(value)?),
            ExpiryUnit::Months => now.checked_add_months(Months::new(self.value)),
            ExpiryUnit::Years => {
                now.checked_add_months(Months::new(self.value.checked_mul(12)?))
            }
        }
    }
}

// -- Texts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTextRequest {
    pub title: String,
    pub content: String,
    pub format: String,
    pub expires: ExpiresIn,
    #[serde(default)]
    pub is_private: bool,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTextRequest {
    pub expected_version: i32,
    pub title: Option<String>,
    pub content: Option<String>,
    pub format: Option<String>,
    pub expires: Option<ExpiresIn>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TextResponse<T> {
    pub text: T,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub comment: Comment,
}

// -- Misc --

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub environment: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse<T> {
    pub error: T,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn fixed_units() {
        let now = at(2026, 1, 1);
        let cases = [
            (ExpiryUnit::Seconds, Duration::seconds(5)),
            (ExpiryUnit::Minutes, Duration::minutes(5)),
            (ExpiryUnit::Hours, Duration::hours(5)),
            (ExpiryUnit::Days, Duration::days(5)),
            (ExpiryUnit::Weeks, Duration::weeks(5)),
        ];
        for (unit, expected) in cases {
            let exp = ExpiresIn { value: 5, unit };
            assert_eq!(exp.resolve(now), Some(now + expected), "{unit:?}");
        }
    }

    #[test]
    fn calendar_units() {
        let now = at(2026, 1, 31);
        let month = ExpiresIn { value: 1, unit: ExpiryUnit::Months };
        // Clamped to the end of February.
        assert_eq!(month.resolve(now), Some(at(2026, 2, 28)));

        let year = ExpiresIn { value: 2, unit: ExpiryUnit::Years };
        assert_eq!(year.resolve(now), Some(at(2028, 1, 31)));
    }

    #[test]
    fn unrepresentable_expiry_is_none() {
        let exp = ExpiresIn { value: u32::MAX, unit: ExpiryUnit::Years };
        assert_eq!(exp.resolve(at(2026, 1, 1)), None);
    }

    #[test]
    fn create_request_parses() {
        let req: CreateTextRequest = serde_json::from_str(
            r#"{"title":"A","content":"B","format":"text","expires":{"value":1,"unit":"hours"}}"#,
        )
        .unwrap();
        assert!(!req.is_private);
        assert_eq!(req.expires.unit, ExpiryUnit::Hours);
    }

    #[test]
    fn update_request_rejects_unknown_fields() {
        let res = serde_json::from_str::<UpdateTextRequest>(
            r#"{"expected_version":1,"slug":"nope"}"#,
        );
        assert!(res.is_err());
    }
}
