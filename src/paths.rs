/// Default locations for on-disk state
///
/// The only persistent state this resource owns is the git mirror. Each
/// repository URI gets its own directory so that independent resource
/// instances running on the same worker never share a mirror.
use sha2::{Digest, Sha256};
use std::path::PathBuf;

const FOLDER_NAME: &str = "sqs-git-resource";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the cache directory for the current platform
    ///
    /// Falls back to the system temp directory when the platform has no
    /// notion of a per-user cache (e.g. a bare container without `$HOME`).
    pub fn cache_dir() -> PathBuf {
        dirs::cache_dir().unwrap_or_else(std::env::temp_dir)
    }

    /// Get the resource-specific cache directory
    ///
    /// Returns: {cache_dir}/sqs-git-resource
    pub fn project_cache_dir() -> PathBuf {
        Self::cache_dir().join(FOLDER_NAME)
    }

    /// Get the default mirror path for a repository URI
    ///
    /// Returns: {cache_dir}/sqs-git-resource/mirrors/{first 16 hex chars of sha256(uri)}
    pub fn default_mirror_path(uri: &str) -> PathBuf {
        Self::project_cache_dir()
            .join("mirrors")
            .join(mirror_key(uri))
    }
}

/// Stable, filesystem-safe key for a repository URI
pub fn mirror_key(uri: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uri.trim().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    hash[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_key_is_stable() {
        let a = mirror_key("https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/app");
        let b = mirror_key("https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/app");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_mirror_key_differs_per_uri() {
        assert_ne!(
            mirror_key("ssh://example.com/one.git"),
            mirror_key("ssh://example.com/two.git")
        );
    }

    #[test]
    fn test_mirror_key_ignores_surrounding_whitespace() {
        assert_eq!(mirror_key(" ssh://x/y.git\n"), mirror_key("ssh://x/y.git"));
    }

    #[test]
    fn test_default_mirror_path_layout() {
        let path = PlatformPaths::default_mirror_path("ssh://example.com/repo.git");
        assert!(path.starts_with(PlatformPaths::project_cache_dir()));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(mirror_key("ssh://example.com/repo.git").as_str())
        );
        assert_eq!(
            path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()),
            Some("mirrors")
        );
    }
}
