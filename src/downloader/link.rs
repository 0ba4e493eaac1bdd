//! Link handling before the resolver is called.
//!
//! The normalized form is what the resolver receives and what the cache and
//! the single-flight table are keyed by.

// lazy_regex! validates the pattern at compile time
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use std::collections::HashSet;
use url::Url;

/// First http(s) URL inside free text
static RE_LINK: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"https?://[^\s<>]+");

/// Sentence punctuation that sticks to a link pasted into prose
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '"', '\''];

/// Query parameters that only carry sharing/tracking context
const TRACKING_PARAMS: &[&str] = &[
    "is_from_webapp",
    "sender_device",
    "sender_web_id",
    "igsh",
    "igshid",
    "si",
    "fbclid",
    "gclid",
    "_r",
    "_t",
    "feature",
];

fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name)
}

/// Returns the first link found in a message, or the trimmed text itself.
///
/// Text without a link is passed through untouched so the downloader API
/// decides what it can handle.
#[must_use]
pub fn extract_link(text: &str) -> &str {
    RE_LINK
        .find(text)
        .map_or_else(|| text.trim(), |m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
}

/// Normalizes a link for use as a cache key.
///
/// Drops the fragment and tracking parameters and keeps every other
/// parameter in its original order. Strings that do not parse as URLs are
/// only trimmed.
///
/// # Examples
///
/// ```
/// use media_relay_bot::downloader::normalize_link;
///
/// assert_eq!(
///     normalize_link(" https://www.tiktok.com/@a/video/1?is_from_webapp=1&sender_device=pc "),
///     "https://www.tiktok.com/@a/video/1"
/// );
/// assert_eq!(
///     normalize_link("https://www.youtube.com/watch?v=abc&si=xyz"),
///     "https://www.youtube.com/watch?v=abc"
/// );
/// ```
#[must_use]
pub fn normalize_link(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    url.to_string()
}

/// Optional restriction of accepted link domains
#[derive(Debug, Clone, Default)]
pub struct LinkPolicy {
    allowed: HashSet<String>,
}

impl LinkPolicy {
    /// Create a policy from a set of lowercased domains; empty accepts everything
    #[must_use]
    pub const fn new(allowed: HashSet<String>) -> Self {
        Self { allowed }
    }

    /// Whether any restriction is configured
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        !self.allowed.is_empty()
    }

    /// Returns `true` if the link's host is an allowed domain or a subdomain of one.
    #[must_use]
    pub fn permits(&self, link: &str) -> bool {
        if self.allowed.is_empty() {
            return true;
        }

        let Some(host) = Url::parse(link)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return false;
        };

        self.allowed.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_extract_link_from_text() {
        assert_eq!(
            extract_link("look at this https://vm.tiktok.com/ZM123/ lol"),
            "https://vm.tiktok.com/ZM123/"
        );
        assert_eq!(extract_link("  not a link  "), "not a link");
    }

    #[test]
    fn test_extract_link_drops_trailing_punctuation() {
        assert_eq!(extract_link("see https://youtu.be/abc)."), "https://youtu.be/abc");
        assert_eq!(
            extract_link("\"https://www.instagram.com/reel/C1/\", right?"),
            "https://www.instagram.com/reel/C1/"
        );
        assert_eq!(
            extract_link("https://youtube.com/watch?v=abc!"),
            "https://youtube.com/watch?v=abc"
        );
    }

    #[test]
    fn test_normalize_keeps_plain_url() {
        assert_eq!(
            normalize_link("https://example.com/video/123"),
            "https://example.com/video/123"
        );
    }

    #[test]
    fn test_normalize_strips_fragment_and_utm() {
        assert_eq!(
            normalize_link("https://instagram.com/reel/X/?utm_source=ig_web&igsh=abc#top"),
            "https://instagram.com/reel/X/"
        );
    }

    #[test]
    fn test_normalize_non_url_is_trimmed() {
        assert_eq!(normalize_link("  hello world "), "hello world");
    }

    #[test]
    fn test_policy_subdomains() {
        let policy = LinkPolicy::new(["tiktok.com".to_string()].into_iter().collect());

        assert!(policy.is_restricted());
        assert!(policy.permits("https://tiktok.com/@a/video/1"));
        assert!(policy.permits("https://vm.tiktok.com/ZM1/"));
        assert!(!policy.permits("https://nottiktok.com/x"));
        assert!(!policy.permits("https://youtube.com/watch?v=1"));
        assert!(!policy.permits("plain text"));
    }

    #[test]
    fn test_empty_policy_accepts_anything() {
        let policy = LinkPolicy::default();
        assert!(!policy.is_restricted());
        assert!(policy.permits("plain text"));
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(path in "[a-z0-9/]{0,20}", v in "[a-zA-Z0-9]{1,8}") {
            let raw = format!("https://example.com/{path}?v={v}&utm_source=x#frag");
            let once = normalize_link(&raw);
            prop_assert_eq!(normalize_link(&once), once.clone());
            prop_assert!(!once.contains("utm_source"));
        }
    }
}
