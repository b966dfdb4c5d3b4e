use std::fmt;

pub const API_KEY_ENV: &str = "ROOMKEY_API_KEY";

/// Shared key that token requests must present when configured
#[derive(Clone)]
pub struct ApiKey {
    key: String,
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// `None` when unset or empty
    pub fn from_env() -> Option<Self> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .map(Self::new)
    }

    /// Constant-time for candidates of the key's length
    pub fn matches(&self, candidate: &str) -> bool {
        if candidate.len() != self.key.len() {
            return false;
        }
        candidate
            .bytes()
            .zip(self.key.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// A missing candidate never matches
    pub fn check(&self, candidate: Option<&str>) -> bool {
        candidate.is_some_and(|c| self.matches(c))
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let key = ApiKey::new("letmein");
        assert!(key.matches("letmein"));
        assert!(!key.matches("letmeout"));
        assert!(!key.matches("letmei"));
        assert!(!key.matches(""));
    }

    #[test]
    fn test_check_missing() {
        let key = ApiKey::new("letmein");
        assert!(key.check(Some("letmein")));
        assert!(!key.check(None));
    }

    #[test]
    fn test_debug_redacted() {
        assert!(!format!("{:?}", ApiKey::new("letmein")).contains("letmein"));
    }
}
