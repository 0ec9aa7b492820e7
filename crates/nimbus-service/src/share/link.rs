//! Share link token generation and URL building.

/// Mints link tokens and turns them into shareable URLs.
#[derive(Debug, Clone)]
pub struct LinkService {
    /// Public base URL without a trailing slash.
    base_url: String,
}

impl LinkService {
    /// Creates a new link service rooted at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    /// Generates an unguessable token: 32 random bytes, hex encoded.
    pub fn generate_token(&self) -> String {
        hex::encode(rand::random::<[u8; 32]>())
    }

    /// The public URL for a token.
    pub fn share_url(&self, token: &str) -> String {
        format!("{}/shared/{token}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_64_hex_chars_and_distinct() {
        let links = LinkService::new("http://localhost:3000");
        let a = links.generate_token();
        let b = links.generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_share_url_trims_trailing_slash() {
        let links = LinkService::new("https://drive.example.com/");
        assert_eq!(links.share_url("abc"), "https://drive.example.com/shared/abc");
    }
}
