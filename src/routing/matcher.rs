//! Path prefix matching.
//!
//! Matching is segment-aware: `/api` matches `/api` and `/api/contact` but
//! not `/apiary`. A prefix ending in `/` matches anything beneath it.

/// Matches the request path against a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some("") => true,
            Some(rest) => self.prefix.ends_with('/') || rest.starts_with('/'),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");

        assert!(matcher.matches("/api"));
        assert!(matcher.matches("/api/v1"));
        assert!(!matcher.matches("/apiary"));
        assert!(!matcher.matches("/images"));
    }

    #[test]
    fn test_trailing_slash_prefix() {
        let matcher = PathPrefixMatcher::new("/_next/");
        assert!(matcher.matches("/_next/static/chunk.js"));
        assert!(!matcher.matches("/_next"));
    }

    #[test]
    fn test_file_prefix() {
        let matcher = PathPrefixMatcher::new("/favicon.ico");
        assert!(matcher.matches("/favicon.ico"));
        assert!(!matcher.matches("/favicon.icon"));
    }
}
