use derive_more::{Deref, Display};
use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;

/// Fallback used when a name reduces to nothing.
pub static DEFAULT_SLUG: &str = "backup";

/// Filesystem-safe fragment of an archive file name.
///
/// Always non-empty, only contains `[a-z0-9._-]`, never has two `-` in a row
/// and never starts or ends with `-`.
#[derive(Clone, Debug, Display, Deref, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(Arc<str>);

impl Slug {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_slug_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '.' | '_' | '-')
}

pub fn slugify<S: AsRef<str>>(name: S) -> Slug {
    let slug: String = name
        .as_ref()
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if is_slug_char(c) { c } else { '-' })
        .dedup_by(|a, b| *a == '-' && *b == '-')
        .collect();

    match slug.trim_matches('-') {
        "" => Slug(DEFAULT_SLUG.into()),
        s => Slug(s.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_slug_shape(slug: &Slug) {
        assert!(!slug.is_empty());
        assert!(slug.chars().all(is_slug_char), "{slug:?}");
        assert!(!slug.contains("--"), "{slug:?}");
        assert!(!slug.starts_with('-') && !slug.ends_with('-'), "{slug:?}");
    }

    #[test]
    fn test_slugify_basename() {
        assert_eq!(slugify("static_server").as_str(), "static_server");
        assert_eq!(slugify("Static Server").as_str(), "static-server");
        assert_eq!(slugify("Home Assistant").as_str(), "home-assistant");
        assert_eq!(slugify("  My  App!! v2.0 ").as_str(), "my-app-v2.0");
    }

    #[test]
    fn test_slugify_collapses_existing_dashes() {
        assert_eq!(slugify("a - - b").as_str(), "a-b");
        assert_eq!(slugify("--a---b--").as_str(), "a-b");
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        assert_eq!(slugify("").as_str(), DEFAULT_SLUG);
        assert_eq!(slugify("   ").as_str(), DEFAULT_SLUG);
        assert_eq!(slugify("***").as_str(), DEFAULT_SLUG);
        assert_eq!(slugify("-").as_str(), DEFAULT_SLUG);
    }

    #[test]
    fn test_slugify_non_ascii() {
        assert_eq!(slugify("Café Données").as_str(), "caf-donn-es");
        assert_eq!(slugify("日本").as_str(), DEFAULT_SLUG);
    }

    #[test]
    fn test_slugify_shape_and_idempotence() {
        let inputs = [
            "",
            "static_server",
            "  Mixed CASE / path\\name ",
            "a..b__c--d",
            "-_-",
            "tabs\tand\nnewlines",
            "ÀÉÎõü",
            "x/../y",
            "123",
        ];
        for input in inputs {
            let once = slugify(input);
            assert_slug_shape(&once);
            assert_eq!(slugify(once.as_str()), once, "input {input:?}");
        }
    }
}
