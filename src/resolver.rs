//! Module resolver - locates referenced modules on disk by name.

use crate::codec;
use std::collections::HashSet;
use std::path::PathBuf;

/// Resolves a module name to a file across an ordered set of directories.
#[derive(Debug, Clone, Default)]
pub struct ModuleResolver {
    directories: Vec<PathBuf>,
}

impl ModuleResolver {
    /// Build a resolver from search directories, absolutized and
    /// deduplicated in insertion order.
    pub fn new(directories: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut seen = HashSet::new();
        let mut deduped = Vec::new();
        for dir in directories {
            let dir = std::path::absolute(&dir).unwrap_or(dir);
            if seen.insert(dir.clone()) {
                deduped.push(dir);
            }
        }
        Self {
            directories: deduped,
        }
    }

    /// Find `<name>.rmod` in the first directory that has it.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.directories
            .iter()
            .map(|dir| dir.join(format!("{name}.{}", codec::MODULE_EXTENSION)))
            .find(|candidate| candidate.exists())
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolves_in_directory_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        std::fs::write(first.path().join("Acme.rmod"), b"first").unwrap();
        std::fs::write(second.path().join("Acme.rmod"), b"second").unwrap();

        let resolver = ModuleResolver::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        let resolved = resolver.resolve("Acme").unwrap();
        assert_eq!(resolved, first.path().join("Acme.rmod"));
    }

    #[test]
    fn test_missing_module_resolves_to_none() {
        let dir = TempDir::new().unwrap();
        let resolver = ModuleResolver::new(vec![dir.path().to_path_buf()]);
        assert!(resolver.resolve("Ghost").is_none());
    }

    #[test]
    fn test_duplicate_directories_are_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Acme.rmod"), b"x").unwrap();
        let resolver = ModuleResolver::new(vec![
            dir.path().to_path_buf(),
            dir.path().to_path_buf(),
        ]);
        assert!(resolver.resolve("Acme").is_some());
    }

    #[test]
    fn test_dotted_names_keep_their_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Vendor.Acme.rmod"), b"x").unwrap();
        let resolver = ModuleResolver::new(vec![dir.path().to_path_buf()]);
        let resolved = resolver.resolve("Vendor.Acme").unwrap();
        assert!(resolved.ends_with("Vendor.Acme.rmod"));
    }
}
