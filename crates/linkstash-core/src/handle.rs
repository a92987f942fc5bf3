use crate::error::ShortenerError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The short identifier a stored URL is looked up by.
///
/// Handles produced by [`compute_handle`](crate::hash::compute_handle) are
/// eight lowercase hex characters. Everything else (batch correlation ids, a
/// redirect path, a deletion request) goes through [`Handle::new`], which only
/// checks that the value is a plausible path segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

const MAX_LENGTH: usize = 64;

impl Handle {
    /// Accepts 1 to 64 bytes of `[A-Za-z0-9_-]`, which covers both computed
    /// digests and client correlation ids.
    pub fn new(handle: impl Into<String>) -> std::result::Result<Self, ShortenerError> {
        let handle = handle.into();
        Self::validate(&handle)?;
        Ok(Self(handle))
    }

    /// Wraps a handle that came from the hashing function or from storage.
    pub fn new_unchecked(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Joins the handle onto `base_url`, ignoring a trailing slash there.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(handle: &str) -> std::result::Result<(), ShortenerError> {
        let len = handle.len();
        if !(1..=MAX_LENGTH).contains(&len) {
            return Err(ShortenerError::InvalidHandle(format!(
                "{len} bytes long, a handle takes 1 to {MAX_LENGTH}"
            )));
        }

        match handle.bytes().find(|b| !is_handle_byte(*b)) {
            Some(bad) => Err(ShortenerError::InvalidHandle(format!(
                "{handle:?} contains {:?}; handles are hex digests or url-safe tokens",
                bad as char
            ))),
            None => Ok(()),
        }
    }
}

/// Bytes that can appear in a short URL path segment without escaping.
fn is_handle_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

impl Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_handles() {
        assert!(Handle::new("e62e2446").is_ok());
        assert!(Handle::new("Abc-123_xyz").is_ok());
        assert!(Handle::new("a".repeat(64)).is_ok());
    }

    #[test]
    fn empty_or_too_long() {
        assert!(Handle::new("").is_err());
        assert!(Handle::new("a".repeat(65)).is_err());
    }

    #[test]
    fn rejection_names_the_offending_character() {
        let err = Handle::new("abc def").unwrap_err();
        assert!(err.to_string().contains("' '"), "{err}");
    }

    #[test]
    fn invalid_characters() {
        assert!(Handle::new("abc def").is_err());
        assert!(Handle::new("abc/def").is_err());
        assert!(Handle::new("abc?x=1").is_err());
    }

    #[test]
    fn to_url_trims_trailing_slash() {
        let handle = Handle::new("e62e2446").unwrap();
        assert_eq!(
            handle.to_url("http://localhost:8080"),
            "http://localhost:8080/e62e2446"
        );
        assert_eq!(
            handle.to_url("http://localhost:8080/"),
            "http://localhost:8080/e62e2446"
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let handle = Handle::new_unchecked("e62e2446");
        assert_eq!(serde_json::to_string(&handle).unwrap(), "\"e62e2446\"");
    }
}
