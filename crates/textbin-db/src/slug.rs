//! Human-readable slug allocation.
//!
//! The existence check is a point-in-time query and nothing is reserved, so a
//! concurrent insert can still take the slug first. The `UNIQUE` constraint on
//! `texts.slug` is what actually guarantees uniqueness; callers see that race
//! as [`StoreError::ConstraintViolation`](crate::StoreError::ConstraintViolation).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::StoreResult;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SEPARATOR: char = '-';

const MAX_BASE_WORDS: usize = 3;
const MAX_BASE_LEN: usize = 20;
const MAX_ATTEMPTS: usize = 10;
const SUFFIX_LEN: usize = 3;
const FALLBACK_LEN: usize = 8;

/// Derives the readable part of a slug from a title.
///
/// Lower-cases, keeps the first three whitespace-delimited words, turns runs of
/// anything outside `[a-z0-9]` into a single separator, joins the words with
/// the separator and truncates to 20 characters. May return an empty string.
pub fn base_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let words: Vec<String> = lowered
        .split_whitespace()
        .take(MAX_BASE_WORDS)
        .map(clean_word)
        .filter(|w| !w.is_empty())
        .collect();

    let mut base = words.join(&SEPARATOR.to_string());
    // Only ASCII survives `clean_word`, so byte truncation is char-safe.
    base.truncate(MAX_BASE_LEN);
    base.trim_end_matches(SEPARATOR).to_string()
}

fn clean_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for c in word.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with(SEPARATOR) {
            out.push(SEPARATOR);
        }
    }
    out.trim_end_matches(SEPARATOR).to_string()
}

/// Allocates slugs using an owned random source.
pub struct SlugGenerator<R> {
    rng: R,
}

impl SlugGenerator<StdRng> {
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> SlugGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draws every candidate for `title` up front, so the generator is not
    /// needed while they are checked against the store.
    ///
    /// Attempt 0 is the bare base, attempts 1-9 add a 3-char random suffix.
    /// An empty base is never a usable slug and is left out.
    pub fn candidates(&mut self, title: &str) -> SlugCandidates {
        let base = base_slug(title);
        let mut candidates = Vec::with_capacity(MAX_ATTEMPTS);

        for attempt in 0..MAX_ATTEMPTS {
            let candidate = if attempt == 0 {
                base.clone()
            } else if base.is_empty() {
                self.random_string(SUFFIX_LEN)
            } else {
                format!("{}{}{}", base, SEPARATOR, self.random_string(SUFFIX_LEN))
            };

            if !candidate.is_empty() {
                candidates.push(candidate);
            }
        }

        SlugCandidates {
            fallback: self.random_string(FALLBACK_LEN),
            base,
            candidates,
        }
    }

    /// Returns the first candidate `exists` reports as free. After 10
    /// collisions an 8-char random slug is returned unchecked.
    pub fn generate_unique_slug<F>(&mut self, title: &str, exists: F) -> StoreResult<String>
    where
        F: FnMut(&str) -> StoreResult<bool>,
    {
        self.candidates(title).first_free(exists)
    }

    fn random_string(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| ALPHABET[self.rng.random_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

/// Slug candidates for one title, in the order they should be tried.
#[derive(Debug, Clone)]
pub struct SlugCandidates {
    base: String,
    candidates: Vec<String>,
    fallback: String,
}

impl SlugCandidates {
    pub fn first_free<F>(self, mut exists: F) -> StoreResult<String>
    where
        F: FnMut(&str) -> StoreResult<bool>,
    {
        for (attempt, candidate) in self.candidates.into_iter().enumerate() {
            if !exists(&candidate)? {
                debug!("Allocated slug '{}' on attempt {}", candidate, attempt);
                return Ok(candidate);
            }
        }

        warn!(
            "Slug attempts exhausted for base '{}', using unchecked fallback '{}'",
            self.base, self.fallback
        );
        Ok(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::collections::HashSet;

    fn seeded() -> SlugGenerator<StdRng> {
        SlugGenerator::new(StdRng::seed_from_u64(7))
    }

    fn is_slug_char(c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit()
    }

    #[test]
    fn base_from_title() {
        assert_eq!(base_slug("Hello World!!"), "hello-world");
        assert_eq!(base_slug("  Rust   is   great fun "), "rust-is-great");
        assert_eq!(base_slug("it's a test"), "it-s-a-test");
        assert_eq!(base_slug("C++ & Go"), "c-go");
    }

    #[test]
    fn base_truncates_and_trims() {
        // "abcdefghij-klmnopqrs-tuv" truncated to 20 = "abcdefghij-klmnopqrs"
        assert_eq!(base_slug("abcdefghij klmnopqrs tuv"), "abcdefghij-klmnopqrs");
        // Truncation lands right after a separator.
        assert_eq!(base_slug("abcdefghijklmnopqrs tuv"), "abcdefghijklmnopqrs");
        assert_eq!(base_slug("abcdefghijklmnopqrstuvwxyz"), "abcdefghijklmnopqrst");
    }

    #[test]
    fn base_may_be_empty() {
        assert_eq!(base_slug(""), "");
        assert_eq!(base_slug("!!! ???"), "");
        assert_eq!(base_slug("日本語"), "");
    }

    #[test]
    fn free_base_is_used_verbatim() {
        let mut slug_gen = seeded();
        let slug = slug_gen
            .generate_unique_slug("Hello World!!", |_| Ok(false))
            .unwrap();
        assert_eq!(slug, "hello-world");
    }

    #[test]
    fn taken_base_gets_suffix() {
        let taken: HashSet<&str> = ["hello-world"].into_iter().collect();
        let mut checked = Vec::new();
        let slug = seeded()
            .generate_unique_slug("Hello World!!", |s| {
                checked.push(s.to_string());
                Ok(taken.contains(s))
            })
            .unwrap();

        assert_eq!(checked.len(), 2);
        assert_eq!(checked[0], "hello-world");
        let suffix = slug.strip_prefix("hello-world-").unwrap();
        assert_eq!(suffix.len(), 3);
        assert!(suffix.chars().all(is_slug_char));
    }

    #[test]
    fn exhausted_attempts_fall_back_unchecked() {
        let mut calls = 0;
        let slug = seeded()
            .generate_unique_slug("Hello World!!", |_| {
                calls += 1;
                Ok(true)
            })
            .unwrap();

        assert_eq!(calls, 10);
        assert_eq!(slug.len(), 8);
        assert!(slug.chars().all(is_slug_char));
    }

    #[test]
    fn empty_base_skips_bare_attempt() {
        let mut checked = Vec::new();
        let slug = seeded()
            .generate_unique_slug("!!!", |s| {
                checked.push(s.to_string());
                Ok(false)
            })
            .unwrap();

        assert_eq!(checked.len(), 1);
        assert_eq!(slug.len(), 3);
        assert!(slug.chars().all(is_slug_char));
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = seeded().generate_unique_slug("x", |_| Ok(true)).unwrap();
        let b = seeded().generate_unique_slug("x", |_| Ok(true)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn candidates_are_drawn_up_front() {
        let slugs = seeded().candidates("Hello World!!");
        assert_eq!(slugs.candidates.len(), 10);
        assert_eq!(slugs.candidates[0], "hello-world");
        assert!(slugs.candidates[1..].iter().all(|c| c.starts_with("hello-world-")));

        let empty = seeded().candidates("!!!");
        assert_eq!(empty.candidates.len(), 9);
    }

    #[test]
    fn lookup_errors_propagate() {
        let res = seeded().generate_unique_slug("title", |_| Err(StoreError::Timeout));
        assert!(matches!(res, Err(StoreError::Timeout)));
    }
}
