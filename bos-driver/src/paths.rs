//! Mapping between registry paths and flat object keys.

use std::collections::HashSet;

use camino::Utf8Path;

/// Derives object keys from registry paths.
///
/// Keys are the path without its leading `/`, below an optional root
/// directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMapper {
    root: String,
}

impl KeyMapper {
    /// Create a mapper which stores everything below `root`.
    pub fn new(root: Option<&str>) -> Self {
        Self {
            root: root.unwrap_or_default().trim_matches('/').to_owned(),
        }
    }

    /// The root directory, without surrounding `/`. Empty when unset.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// The object key for `path`.
    pub fn key(&self, path: &Utf8Path) -> String {
        let relative = path.as_str().trim_start_matches('/');
        match (self.root.is_empty(), relative.is_empty()) {
            (true, _) => relative.to_owned(),
            (false, true) => self.root.clone(),
            (false, false) => format!("{}/{}", self.root, relative),
        }
    }

    /// The prefix shared by every key stored below the directory `path`.
    pub fn directory_prefix(&self, path: &Utf8Path) -> String {
        let mut key = self.key(path);
        if !key.is_empty() {
            key.push('/');
        }
        key
    }
}

/// Whether `candidate` is the object at `key`, or is stored below it.
pub fn within(key: &str, candidate: &str) -> bool {
    if key.is_empty() {
        return true;
    }

    match candidate.strip_prefix(key) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Reconstruct one level of hierarchy from the keys of a prefix listing.
///
/// Each key has `prefix` and any leading `/` removed. A single remaining
/// segment is a file at this level, otherwise the first segment is a
/// directory. Files come first, then directories, each listed once in the
/// order they were first seen.
pub fn children<'k, I>(prefix: &str, keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'k str>,
{
    let mut files = Vec::new();
    let mut directories = Vec::new();
    let mut seen_files = HashSet::new();
    let mut seen_directories = HashSet::new();

    for key in keys {
        let rest = key.strip_prefix(prefix).unwrap_or(key);
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        if rest.is_empty() {
            continue;
        }

        match rest.split_once('/') {
            Some((directory, _)) => {
                if seen_directories.insert(directory) {
                    directories.push(directory.to_owned());
                }
            }
            None => {
                if seen_files.insert(rest) {
                    files.push(rest.to_owned());
                }
            }
        }
    }

    files.extend(directories);
    files
}
