use sha2::{Digest, Sha256};

/// Cache key for `url`: the lowercase hex SHA-256 of the URL string as given.
///
/// No normalization happens, so `https://a.com` and `https://a.com/` are
/// different keys.
pub fn cache_key(url: &str) -> String {
	format!("{:x}", Sha256::digest(url.as_bytes()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key_is_stable_hex_digest() {
		let key = cache_key("https://example.com");
		assert_eq!(key.len(), 64);
		assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
		assert_eq!(key, cache_key("https://example.com"));
		assert_ne!(key, cache_key("https://example.com/"));
	}
}
