use crate::handle::Handle;
use md5::{Digest, Md5};

/// Number of digest bytes kept in a handle; hex encoding doubles it.
const HANDLE_BYTES: usize = 4;

/// Derives the handle for a URL.
///
/// The handle is the hex encoding of the first four bytes of the MD5 digest
/// of the raw URL bytes. The same URL always maps to the same handle.
/// Collisions are possible and are left to the storage backend.
pub fn compute_handle(url: &str) -> Handle {
    let digest = Md5::digest(url.as_bytes());
    Handle::new_unchecked(hex::encode(&digest[..HANDLE_BYTES]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest_prefix() {
        assert_eq!(compute_handle("https://youtube.com").as_str(), "e62e2446");
        assert_eq!(compute_handle("https://example.com").as_str(), "c984d06a");
    }

    #[test]
    fn deterministic() {
        let url = "https://practicum.yandex.ru/learn/go-advanced/";
        assert_eq!(compute_handle(url), compute_handle(url));
    }

    #[test]
    fn eight_lowercase_hex_chars() {
        let handle = compute_handle("https://example.com/some/long/path?q=1");
        assert_eq!(handle.as_str().len(), 8);
        assert!(handle
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn different_urls_differ() {
        assert_ne!(
            compute_handle("https://youtube.com"),
            compute_handle("https://youttube.com")
        );
    }
}
