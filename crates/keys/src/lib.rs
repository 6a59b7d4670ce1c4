//! Canonical content-key derivation.
//!
//! Every cached entity — a group (one article page) and each item it is
//! composed of (the page document, images, stylesheets, media lists) — is
//! identified by a [`ContentKey`] derived from its resource locator. The
//! derivation is deterministic and order-independent: whichever group
//! discovers a shared resource first, the resource maps to the same key, and
//! that is what makes cross-group deduplication work.
//!
//! A group's own document shares the group's locator, so its item key equals
//! the group key.

pub mod error;

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use url::Url;

/// Stable identifier for a cached group or item.
///
/// Obtained from [`derive_key`], or rehydrated from the metadata store via
/// [`ContentKey::from_raw`]. Compares and hashes as the underlying string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub struct ContentKey(String);

impl ContentKey {
    /// Rehydrate a key that was previously persisted by the metadata store.
    ///
    /// Keys only ever enter the store through [`derive_key`], so no
    /// re-validation happens here.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl AsRef<str> for ContentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the canonical [`ContentKey`] for a resource locator.
///
/// The key is the lowercased host (plus explicit non-default port), followed
/// by the path with any trailing slash removed. Query string and fragment are
/// dropped entirely so that tracking parameters and in-page anchors cannot
/// split one resource into several identities.
///
/// Pure and total for valid locators: the same input yields the same output
/// across process restarts. Fails only on structurally invalid locators
/// (opaque URLs such as `mailto:`, or URLs without a host).
pub fn derive_key(locator: &Url) -> Result<ContentKey> {
    if locator.cannot_be_a_base() {
        exn::bail!(ErrorKind::InvalidLocator(locator.to_string()));
    }
    let Some(host) = locator.host_str() else {
        exn::bail!(ErrorKind::InvalidLocator(locator.to_string()));
    };
    // `Url` lowercases hosts and strips default ports during parsing, so the
    // textual form here is already canonical.
    let mut key = host.to_string();
    if let Some(port) = locator.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    let path = locator.path().trim_end_matches('/');
    key.push_str(path);
    Ok(ContentKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[rstest]
    #[case("https://en.wikipedia.org/wiki/Cat", "en.wikipedia.org/wiki/Cat")]
    #[case("https://EN.WIKIPEDIA.ORG/wiki/Cat", "en.wikipedia.org/wiki/Cat")]
    #[case("https://en.wikipedia.org:443/wiki/Cat", "en.wikipedia.org/wiki/Cat")]
    #[case("https://en.wikipedia.org/wiki/Cat?action=edit", "en.wikipedia.org/wiki/Cat")]
    #[case("https://en.wikipedia.org/wiki/Cat#History", "en.wikipedia.org/wiki/Cat")]
    #[case("https://en.wikipedia.org/wiki/Cat/", "en.wikipedia.org/wiki/Cat")]
    #[case("https://upload.example.org:8080/flag.svg", "upload.example.org:8080/flag.svg")]
    #[case("https://en.wikipedia.org", "en.wikipedia.org")]
    fn test_canonical_form(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(derive_key(&url(input)).unwrap().as_str(), expected);
    }

    #[test]
    fn test_deterministic_across_spellings() {
        // The same resource reached via different query strings or fragments
        // must collapse to one identity (this is what enables dedup).
        let a = derive_key(&url("https://host.example/r/pic.jpg?from=cat")).unwrap();
        let b = derive_key(&url("https://host.example/r/pic.jpg?from=dog#top")).unwrap();
        assert_eq!(a, b);
    }

    #[rstest]
    #[case("mailto:someone@example.org")]
    #[case("data:text/plain,hello")]
    #[case("file:///etc/passwd")]
    fn test_invalid_locators(#[case] input: &str) {
        assert!(derive_key(&url(input)).is_err());
    }

    #[test]
    fn test_roundtrip_through_raw() {
        let key = derive_key(&url("https://en.wikipedia.org/wiki/Dog")).unwrap();
        assert_eq!(ContentKey::from_raw(key.as_str()), key);
    }
}
