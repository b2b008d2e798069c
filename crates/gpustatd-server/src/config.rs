//! Server configuration, read once at startup and immutable after.

/// Listener and routing configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// URL path prefix for both endpoints. Empty, or starts with `/` and has
    /// no trailing `/`.
    pub prefix: String,
    /// Required `Authorization` header value. Empty disables auth.
    pub token: String,
}

impl ServerConfig {
    pub fn new(host: &str, port: u16, prefix: &str, token: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            prefix: normalize_prefix(prefix),
            token: token.to_string(),
        }
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_gains_leading_slash() {
        assert_eq!(ServerConfig::new("0.0.0.0", 8000, "gpu", "").prefix, "/gpu");
    }

    #[test]
    fn test_prefix_already_normalized_kept() {
        assert_eq!(
            ServerConfig::new("0.0.0.0", 8000, "/api/gpu", "").prefix,
            "/api/gpu"
        );
    }

    #[test]
    fn test_empty_and_slash_prefixes_collapse() {
        assert_eq!(ServerConfig::new("0.0.0.0", 8000, "", "").prefix, "");
        assert_eq!(ServerConfig::new("0.0.0.0", 8000, "/", "").prefix, "");
    }

    #[test]
    fn test_trailing_slash_stripped() {
        assert_eq!(
            ServerConfig::new("0.0.0.0", 8000, "gpu/", "").prefix,
            "/gpu"
        );
    }
}
