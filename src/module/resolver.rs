//! Pluggable source resolution.
//!
//! The loader only knows the resolver interface; hosts inject their own
//! lookup (filesystem, archive, database). Two implementations ship with
//! the crate: a filesystem resolver and an in-memory one for embedding and
//! tests.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// A resolved source unit: the absolute key plus its content.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub key: String,
    pub content: String,
}

/// Maps an import key, relative to the importing module's directory, to an
/// absolute key and its content.
pub trait SourceResolver {
    fn resolve(&self, key: &str, current_dir: &str) -> Result<ResolvedSource, String>;
}

/// The directory part of a module key, used as the next `current_dir`.
pub fn key_dir(key: &str) -> String {
    match key.rfind('/') {
        Some(index) => key[..index].to_string(),
        None => String::new(),
    }
}

/// Filesystem resolver rooted at a base directory. Relative keys resolve
/// against the importing module's directory; the script file extension is
/// completed when missing.
pub struct FileSystemResolver {
    root: PathBuf,
    extension: &'static str,
}

impl FileSystemResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "ql",
        }
    }

    fn candidates(&self, key: &str, current_dir: &str) -> Vec<PathBuf> {
        let relative = if current_dir.is_empty() {
            PathBuf::from(key)
        } else {
            Path::new(current_dir).join(key)
        };
        let joined = self.root.join(&relative);
        let mut candidates = vec![joined.clone()];
        if joined.extension().is_none() {
            candidates.push(joined.with_extension(self.extension));
        }
        candidates
    }
}

/// Normalize `a/./b/../c` to `a/c` without touching the filesystem, so
/// cache keys stay stable for files that may not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(parts.last(), None | Some(Component::RootDir)) {
                    parts.pop();
                } else {
                    parts.push(component);
                }
            }
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

impl SourceResolver for FileSystemResolver {
    fn resolve(&self, key: &str, current_dir: &str) -> Result<ResolvedSource, String> {
        for candidate in self.candidates(key, current_dir) {
            if candidate.is_file() {
                let normalized = normalize(&candidate);
                let content = fs::read_to_string(&candidate)
                    .map_err(|e| format!("failed to read '{}': {}", candidate.display(), e))?;
                return Ok(ResolvedSource {
                    key: normalized.to_string_lossy().replace('\\', "/"),
                    content,
                });
            }
        }
        Err(format!("module not found: '{}'", key))
    }
}

/// In-memory resolver keyed by exact module name, with relative lookups
/// against the importing module's directory.
#[derive(Default)]
pub struct MemorySourceResolver {
    sources: HashMap<String, String>,
}

impl MemorySourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, content: impl Into<String>) -> &mut Self {
        self.sources.insert(key.into(), content.into());
        self
    }
}

impl SourceResolver for MemorySourceResolver {
    fn resolve(&self, key: &str, current_dir: &str) -> Result<ResolvedSource, String> {
        let qualified = if current_dir.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", current_dir, key)
        };
        for candidate in [qualified.as_str(), key] {
            let normalized = normalize(Path::new(candidate))
                .to_string_lossy()
                .replace('\\', "/");
            if let Some(content) = self.sources.get(normalized.as_str()) {
                return Ok(ResolvedSource {
                    key: normalized,
                    content: content.clone(),
                });
            }
        }
        Err(format!("module not found: '{}'", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_dir() {
        assert_eq!(key_dir("a/b/c.ql"), "a/b");
        assert_eq!(key_dir("main.ql"), "");
    }

    #[test]
    fn test_memory_resolver_relative() {
        let mut resolver = MemorySourceResolver::new();
        resolver.add("lib/util.ql", "var x = 1");
        let resolved = resolver.resolve("util.ql", "lib").expect("resolved");
        assert_eq!(resolved.key, "lib/util.ql");
        let resolved = resolver.resolve("lib/util.ql", "").expect("resolved");
        assert_eq!(resolved.key, "lib/util.ql");
        assert!(resolver.resolve("missing.ql", "").is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("a/./b/../c.ql")),
            PathBuf::from("a/c.ql")
        );
    }
}
