//! Fetching remote files referenced by `@path` tokens.

use std::fs::File;
use std::io;
use std::path::PathBuf;

use monitor_types::error::{MonitorError, Result};

/// Downloads a URI to a local file.
pub trait FileFetcher: Send + Sync {
    /// Fetch `uri` and return the path of the local copy.
    fn fetch(&self, uri: &str) -> Result<PathBuf>;
}

/// Whether `text` looks like a non-file URI (`scheme://...`).
pub fn is_uri(text: &str) -> bool {
    let Some((scheme, rest)) = text.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid_scheme && !scheme.eq_ignore_ascii_case("file") && !rest.is_empty()
}

/// Local file name for a downloaded URI: its last path segment, or a
/// sanitized form of the whole URI.
pub fn cache_file_name(uri: &str) -> String {
    let without_query = uri.split(['?', '#']).next().unwrap_or(uri);
    let last = without_query
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("download");
    last.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// HTTP fetcher
// ---------------------------------------------------------------------------

/// Fetches over HTTP(S) into a cache directory under the system temp dir.
pub struct HttpFileFetcher {
    agent: ureq::Agent,
    cache_dir: PathBuf,
}

impl Default for HttpFileFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFileFetcher {
    pub fn new() -> Self {
        Self::with_cache_dir(std::env::temp_dir().join("monitor-cache"))
    }

    pub fn with_cache_dir(cache_dir: PathBuf) -> Self {
        Self {
            agent: ureq::Agent::new(),
            cache_dir,
        }
    }
}

impl FileFetcher for HttpFileFetcher {
    fn fetch(&self, uri: &str) -> Result<PathBuf> {
        log::info!("downloading {uri}");
        let response = self
            .agent
            .get(uri)
            .call()
            .map_err(|e| MonitorError::Fetch(format!("{uri}: {e}")))?;
        std::fs::create_dir_all(&self.cache_dir)?;
        let target = self.cache_dir.join(cache_file_name(uri));
        let mut file = File::create(&target)?;
        io::copy(&mut response.into_reader(), &mut file)?;
        log::debug!("{uri} saved to {}", target.display());
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_uris() {
        assert!(is_uri("https://example.com/a.resc"));
        assert!(is_uri("http://host/x"));
        assert!(is_uri("s3+http://bucket/x"));
        assert!(!is_uri("file:///tmp/a.resc"));
        assert!(!is_uri("/tmp/a.resc"));
        assert!(!is_uri("scripts/a.resc"));
        assert!(!is_uri("https://"));
        assert!(!is_uri("1http://x"));
    }

    #[test]
    fn cache_names() {
        assert_eq!(cache_file_name("https://example.com/dir/a.resc"), "a.resc");
        assert_eq!(cache_file_name("https://example.com/dir/a.resc?x=1"), "a.resc");
        assert_eq!(cache_file_name("https://example.com/dir/"), "dir");
        assert_eq!(cache_file_name("https://example.com/we ird"), "we_ird");
    }

    #[test]
    fn unreachable_host_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpFileFetcher::with_cache_dir(dir.path().to_path_buf());
        let err = fetcher.fetch("http://127.0.0.1:1/nothing").unwrap_err();
        assert!(matches!(err, MonitorError::Fetch(_)));
        assert!(!err.is_recoverable());
    }
}
