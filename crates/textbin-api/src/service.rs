//! Async front for the blocking SQLite stores.
//!
//! Every store call runs on the blocking pool under a timeout, against a
//! database handle tied to the awaiting future. When that future goes away
//! (timeout, client gone, request timeout) the handle is cancelled: the
//! running statement is interrupted, an open write is rolled back and no
//! further statements start.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use tracing::{error, warn};

use textbin_db::{
    Cancellation, Database, SlugCandidates, SlugGenerator, StoreError, StoreResult,
    ValidationErrors,
};
use textbin_types::api::{CreateTextRequest, ExpiresIn, UpdateTextRequest};
use textbin_types::models::{Comment, Identity, NewText, TextRecord, TextView};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Inserts retried after losing a slug race before giving up.
const MAX_INSERT_ATTEMPTS: usize = 3;

pub struct TextService {
    db: Database,
    slugs: Arc<Mutex<SlugGenerator<StdRng>>>,
    timeout: Duration,
}

impl TextService {
    pub fn new(db: Database, slugs: SlugGenerator<StdRng>, timeout: Duration) -> Self {
        Self {
            db,
            slugs: Arc::new(Mutex::new(slugs)),
            timeout,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.db.now()
    }

    /// Runs `f` against the database off the async runtime, bounded by the
    /// store timeout. Dropping the returned future cancels the call.
    async fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let cancel = Cancellation::new();
        let _abandon_on_drop = cancel.drop_guard();
        let db = self.db.with_cancellation(cancel);
        let task = tokio::task::spawn_blocking(move || f(&db));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("spawn_blocking join error: {}", e);
                Err(StoreError::Unavailable(e.to_string()))
            }
            Err(_) => {
                warn!("Store call exceeded {:?}, abandoning it", self.timeout);
                Err(StoreError::Timeout)
            }
        }
    }

    /// Draws slug candidates. The generator lock is held only for the draw;
    /// existence checks happen later, on the blocking pool.
    fn draw_slugs(&self, title: &str) -> StoreResult<SlugCandidates> {
        let mut slug_gen = self
            .slugs
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("slug generator poisoned: {}", e)))?;
        Ok(slug_gen.candidates(title))
    }

    // -- Texts --

    /// Allocates a slug and inserts. Losing the slug race to a concurrent
    /// insert is retried with fresh candidates a few times.
    pub async fn create_text(
        &self,
        req: CreateTextRequest,
        identity: Identity,
    ) -> StoreResult<TextRecord> {
        let expires_at = resolve_expiry(req.expires, self.now())?;
        let draft = NewText {
            slug: String::new(),
            title: req.title,
            content: req.content,
            format: req.format,
            expires_at,
            is_private: req.is_private,
            owner_user_id: identity.user_id(),
        };

        self.insert_with_retries(draft, |db: &Database, slugs: SlugCandidates| {
            slugs.first_free(|s| db.slug_exists(s))
        })
        .await
    }

    async fn insert_with_retries<A>(&self, draft: NewText, allocate: A) -> StoreResult<TextRecord>
    where
        A: Fn(&Database, SlugCandidates) -> StoreResult<String> + Clone + Send + 'static,
    {
        for attempt in 1..=MAX_INSERT_ATTEMPTS {
            let slugs = self.draw_slugs(&draft.title)?;
            let allocate = allocate.clone();
            let mut new = draft.clone();

            let result = self
                .call(move |db| {
                    new.slug = allocate(db, slugs)?;
                    db.insert_text(new)
                })
                .await;

            match result {
                Err(StoreError::ConstraintViolation) => {
                    warn!("Slug collided at insert (attempt {}/{})", attempt, MAX_INSERT_ATTEMPTS);
                }
                other => return other,
            }
        }

        Err(StoreError::AllocationExhausted)
    }

    pub async fn get_text(&self, slug: &str, identity: Identity) -> StoreResult<TextRecord> {
        let slug = slug.to_string();
        self.call(move |db| db.get_text_by_slug(&slug, identity.user_id()))
            .await
    }

    /// Builds the read model: the text, its like count and its comments.
    pub async fn compose_view(&self, slug: &str, identity: Identity) -> StoreResult<TextView> {
        let record = self.get_text(slug, identity).await?;
        self.view_of(record).await
    }

    /// The base record has already decided visibility. Likes and comments are
    /// read concurrently and outside any shared transaction, so they may
    /// reflect a slightly different instant than the record. Any failure
    /// fails the view, and the sibling read is abandoned with it.
    async fn view_of(&self, record: TextRecord) -> StoreResult<TextView> {
        let text_id = record.id;
        let (like_count, comments) = tokio::try_join!(
            self.call(move |db| db.like_count(text_id)),
            self.call(move |db| db.comments_for_text(text_id)),
        )?;

        Ok(TextView::compose(record, like_count, comments))
    }

    pub async fn update_text(
        &self,
        slug: &str,
        req: UpdateTextRequest,
        identity: Identity,
    ) -> StoreResult<TextView> {
        let expires_at = req
            .expires
            .map(|e| resolve_expiry(e, self.now()))
            .transpose()?;
        let slug = slug.to_string();

        let record = self
            .call(move |db| {
                db.update_text_by_slug(&slug, req.expected_version, identity.user_id(), |f| {
                    if let Some(title) = req.title {
                        f.title = title;
                    }
                    if let Some(content) = req.content {
                        f.content = content;
                    }
                    if let Some(format) = req.format {
                        f.format = format;
                    }
                    if let Some(expires_at) = expires_at {
                        f.expires_at = expires_at;
                    }
                    if let Some(is_private) = req.is_private {
                        f.is_private = is_private;
                    }
                })
            })
            .await?;

        self.view_of(record).await
    }

    pub async fn delete_text(&self, slug: &str, identity: Identity) -> StoreResult<()> {
        let slug = slug.to_string();
        self.call(move |db| db.delete_text_by_slug(&slug, identity.user_id()))
            .await
    }

    pub async fn purge_expired(&self) -> StoreResult<usize> {
        self.call(|db| db.purge_expired()).await
    }

    // -- Likes --

    pub async fn like(&self, slug: &str, user_id: i64) -> StoreResult<()> {
        let slug = slug.to_string();
        self.call(move |db| {
            let text = db.get_text_by_slug(&slug, Some(user_id))?;
            db.add_like(user_id, text.id)
        })
        .await
    }

    pub async fn unlike(&self, slug: &str, user_id: i64) -> StoreResult<()> {
        let slug = slug.to_string();
        self.call(move |db| {
            let text = db.get_text_by_slug(&slug, Some(user_id))?;
            db.remove_like(user_id, text.id)
        })
        .await
    }

    // -- Comments --

    pub async fn add_comment(&self, slug: &str, user_id: i64, content: String) -> StoreResult<Comment> {
        let slug = slug.to_string();
        self.call(move |db| {
            let text = db.get_text_by_slug(&slug, Some(user_id))?;
            db.add_comment(user_id, text.id, &content)
        })
        .await
    }

    pub async fn update_comment(
        &self,
        slug: &str,
        comment_id: i64,
        user_id: i64,
        content: String,
    ) -> StoreResult<Comment> {
        let slug = slug.to_string();
        self.call(move |db| {
            db.get_text_by_slug(&slug, Some(user_id))?;
            db.update_comment(comment_id, user_id, &content)
        })
        .await
    }

    pub async fn delete_comment(&self, slug: &str, comment_id: i64, user_id: i64) -> StoreResult<()> {
        let slug = slug.to_string();
        self.call(move |db| {
            db.get_text_by_slug(&slug, Some(user_id))?;
            db.delete_comment(comment_id, user_id)
        })
        .await
    }
}

fn resolve_expiry(expires: ExpiresIn, now: DateTime<Utc>) -> StoreResult<DateTime<Utc>> {
    expires.resolve(now).ok_or_else(|| {
        StoreError::Validation(ValidationErrors::single("expires", "is too far in the future"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use textbin_db::ManualClock;
    use textbin_types::api::ExpiryUnit;

    fn service() -> (TextService, Database) {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let db = Database::open_in_memory(Arc::new(ManualClock::new(start))).unwrap();
        let slugs = SlugGenerator::new(StdRng::seed_from_u64(1));
        (TextService::new(db.clone(), slugs, DEFAULT_STORE_TIMEOUT), db)
    }

    fn draft(svc: &TextService, title: &str) -> NewText {
        NewText {
            slug: String::new(),
            title: title.into(),
            content: "B".into(),
            format: "text".into(),
            expires_at: svc.now() + chrono::Duration::hours(1),
            is_private: false,
            owner_user_id: None,
        }
    }

    fn create_req(title: &str) -> CreateTextRequest {
        CreateTextRequest {
            title: title.into(),
            content: "B".into(),
            format: "text".into(),
            expires: ExpiresIn { value: 1, unit: ExpiryUnit::Hours },
            is_private: false,
        }
    }

    #[tokio::test]
    async fn end_to_end_versioning() {
        let (svc, _) = service();
        let created = svc.create_text(create_req("A"), Identity::Anonymous).await.unwrap();
        assert_eq!(created.slug, "a");
        assert_eq!(created.version, 1);

        let update = || UpdateTextRequest {
            expected_version: 1,
            content: Some("C".into()),
            ..Default::default()
        };
        let updated = svc.update_text("a", update(), Identity::Anonymous).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.content, "C");

        let err = svc.update_text("a", update(), Identity::Anonymous).await.unwrap_err();
        assert!(matches!(err, StoreError::EditConflict));
    }

    #[tokio::test]
    async fn repeated_titles_get_distinct_slugs() {
        let (svc, _) = service();
        let a = svc.create_text(create_req("Hello World!!"), Identity::Anonymous).await.unwrap();
        let b = svc.create_text(create_req("Hello World!!"), Identity::User(1)).await.unwrap();
        assert_eq!(a.slug, "hello-world");
        assert!(b.slug.starts_with("hello-world-"));
        assert_eq!(b.owner_user_id, Some(1));
    }

    #[tokio::test]
    async fn anonymous_private_text_is_rejected() {
        let (svc, db) = service();
        let mut req = create_req("secret");
        req.is_private = true;
        match svc.create_text(req, Identity::Anonymous).await {
            Err(StoreError::Validation(errs)) => assert!(errs.get("is_private").is_some()),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(!db.slug_exists("secret").unwrap());
    }

    #[tokio::test]
    async fn view_composes_likes_and_comments() {
        let (svc, db) = service();
        svc.create_text(create_req("Post"), Identity::User(1)).await.unwrap();

        svc.like("post", 2).await.unwrap();
        svc.like("post", 2).await.unwrap();
        svc.like("post", 3).await.unwrap();
        let older = svc.add_comment("post", 2, "first".into()).await.unwrap();
        let newer = svc.add_comment("post", 3, "second".into()).await.unwrap();

        let view = svc.compose_view("post", Identity::Anonymous).await.unwrap();
        assert_eq!(view.like_count, 2);
        let ids: Vec<i64> = view.comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert_eq!(view.version, 1);

        svc.unlike("post", 2).await.unwrap();
        svc.unlike("post", 2).await.unwrap();
        assert_eq!(db.like_count(older.text_id).unwrap(), 1);
    }

    #[tokio::test]
    async fn private_view_hidden_from_others() {
        let (svc, _) = service();
        let mut req = create_req("Diary");
        req.is_private = true;
        svc.create_text(req, Identity::User(1)).await.unwrap();

        assert!(svc.compose_view("diary", Identity::User(1)).await.is_ok());
        for who in [Identity::User(2), Identity::Anonymous] {
            assert!(matches!(svc.compose_view("diary", who).await, Err(StoreError::NotFound)));
        }
        // Social actions can't reach it either.
        assert!(matches!(svc.like("diary", 2).await, Err(StoreError::NotFound)));
        assert!(matches!(
            svc.add_comment("diary", 2, "peek".into()).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn unreachable_expiry_is_a_validation_error() {
        let (svc, _) = service();
        let mut req = create_req("far");
        req.expires = ExpiresIn { value: u32::MAX, unit: ExpiryUnit::Years };
        match svc.create_text(req, Identity::Anonymous).await {
            Err(StoreError::Validation(errs)) => {
                assert_eq!(errs.get("expires"), Some("is too far in the future"))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_store_call_times_out() {
        let (svc, _) = service();
        let svc = TextService { timeout: Duration::from_millis(20), ..svc };
        let res = svc
            .call(|_| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(StoreError::Timeout)));
    }

    #[tokio::test]
    async fn timed_out_write_never_commits() {
        let (svc, db) = service();
        let svc = TextService { timeout: Duration::from_millis(20), ..svc };
        let mut late = draft(&svc, "late");
        late.slug = "late".into();

        let res = svc
            .call(move |db| {
                std::thread::sleep(Duration::from_millis(100));
                db.insert_text(late)
            })
            .await;
        assert!(matches!(res, Err(StoreError::Timeout)));

        // Give the abandoned closure time to run to completion.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!db.slug_exists("late").unwrap());
    }

    #[tokio::test]
    async fn dropped_caller_abandons_the_call() {
        let (svc, db) = service();
        let mut orphan = draft(&svc, "orphan");
        orphan.slug = "orphan".into();

        let pending = svc.call(move |db| {
            std::thread::sleep(Duration::from_millis(100));
            db.insert_text(orphan)
        });
        // Poll once so the blocking task starts, then drop the future.
        let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!db.slug_exists("orphan").unwrap());
    }

    #[tokio::test]
    async fn slug_lost_at_insert_is_retried() {
        let (svc, db) = service();
        svc.create_text(create_req("Taken"), Identity::Anonymous).await.unwrap();

        let attempts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = attempts.clone();
        let created = svc
            .insert_with_retries(draft(&svc, "Taken"), move |db: &Database, slugs: SlugCandidates| {
                // The first allocation loses the race to the existing row.
                if seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                    Ok("taken".to_string())
                } else {
                    slugs.first_free(|s| db.slug_exists(s))
                }
            })
            .await
            .unwrap();

        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert!(created.slug.starts_with("taken-"));
        assert!(db.slug_exists(&created.slug).unwrap());
    }

    #[tokio::test]
    async fn persistent_slug_collisions_exhaust_allocation() {
        let (svc, _) = service();
        svc.create_text(create_req("Taken"), Identity::Anonymous).await.unwrap();

        let attempts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = attempts.clone();
        let res = svc
            .insert_with_retries(draft(&svc, "Taken"), move |_: &Database, _: SlugCandidates| {
                seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok("taken".to_string())
            })
            .await;

        assert!(matches!(res, Err(StoreError::AllocationExhausted)));
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), MAX_INSERT_ATTEMPTS);
    }

    #[tokio::test]
    async fn comment_edit_and_delete_are_author_only() {
        let (svc, _) = service();
        svc.create_text(create_req("Thread"), Identity::Anonymous).await.unwrap();
        let c = svc.add_comment("thread", 5, "mine".into()).await.unwrap();

        assert!(matches!(
            svc.update_comment("thread", c.id, 6, "theirs".into()).await,
            Err(StoreError::NotFound)
        ));
        let edited = svc.update_comment("thread", c.id, 5, "still mine".into()).await.unwrap();
        assert_eq!(edited.content, "still mine");

        assert!(matches!(svc.delete_comment("thread", c.id, 6).await, Err(StoreError::NotFound)));
        svc.delete_comment("thread", c.id, 5).await.unwrap();
    }
}
