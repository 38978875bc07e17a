//! Search path used to locate included scripts.

use std::path::{Path, PathBuf};

/// Separator of entries in `path set` / `path add` arguments.
pub const PATH_SEPARATOR: char = ';';

/// An ordered list of directories searched for relative script paths.
#[derive(Debug, Clone)]
pub struct MonitorPath {
    defaults: Vec<PathBuf>,
    entries: Vec<PathBuf>,
}

impl Default for MonitorPath {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(vec![cwd])
    }
}

impl MonitorPath {
    pub fn new(defaults: Vec<PathBuf>) -> Self {
        Self {
            entries: defaults.clone(),
            defaults,
        }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Replace all entries with the `;`-separated list.
    pub fn set(&mut self, value: &str) {
        self.entries = split(value);
    }

    /// Prepend the `;`-separated list, skipping entries already present.
    pub fn add(&mut self, value: &str) {
        let mut added: Vec<PathBuf> = split(value)
            .into_iter()
            .filter(|p| !self.entries.contains(p))
            .collect();
        added.append(&mut self.entries);
        self.entries = added;
    }

    pub fn reset(&mut self) {
        self.entries = self.defaults.clone();
    }

    /// Locate `file`: as given when it exists or is absolute, otherwise in
    /// the first entry containing it.
    pub fn resolve(&self, file: &str) -> Option<PathBuf> {
        let path = Path::new(file);
        if path.exists() {
            return Some(path.to_path_buf());
        }
        if path.is_absolute() {
            return None;
        }
        self.entries
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.exists())
    }
}

fn split(value: &str) -> Vec<PathBuf> {
    value
        .split(PATH_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_add_reset() {
        let mut path = MonitorPath::new(vec![PathBuf::from("/base")]);
        path.set("/a; /b");
        assert_eq!(path.entries(), &[PathBuf::from("/a"), PathBuf::from("/b")]);
        path.add("/c;/a");
        assert_eq!(
            path.entries(),
            &[PathBuf::from("/c"), PathBuf::from("/a"), PathBuf::from("/b")]
        );
        path.reset();
        assert_eq!(path.entries(), &[PathBuf::from("/base")]);
    }

    #[test]
    fn resolve_searches_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("board.resc"), "mach create").unwrap();
        let path = MonitorPath::new(vec![dir.path().to_path_buf()]);
        assert_eq!(path.resolve("board.resc"), Some(dir.path().join("board.resc")));
        assert!(path.resolve("missing.resc").is_none());
        assert!(path.resolve("/no/such/abs.resc").is_none());
    }
}
