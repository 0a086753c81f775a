//! File discovery for finding Rust sources that declare crudgen entities.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Discovered entity file with basic metadata
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Path relative to project root
    pub relative_path: String,
}

/// Discover Rust files that might contain `CrudEntity` derives.
///
/// Walks the configured source directories and keeps .rs files that
/// mention the marker at all; full parsing happens later.
pub fn discover_entities(project_root: &Path, search_dirs: &[String]) -> Result<Vec<DiscoveredFile>> {
    let mut discovered = Vec::new();

    for dir in search_dirs {
        let search_path = project_root.join(dir);
        if !search_path.exists() {
            continue;
        }

        for entry in WalkDir::new(&search_path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if path.extension().is_none_or(|ext| ext != "rs") {
                continue;
            }

            // Skip hidden files and directories
            if path
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            {
                continue;
            }

            if mentions_marker(path)? {
                let relative_path = path
                    .strip_prefix(project_root)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .to_string();

                discovered.push(DiscoveredFile {
                    path: path.to_path_buf(),
                    relative_path,
                });
            }
        }
    }

    // Sort by relative path for consistent ordering
    discovered.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(discovered)
}

/// Cheap text pre-filter before full parsing.
fn mentions_marker(path: &Path) -> Result<bool> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(content.contains("CrudEntity"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_marked_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("models")).unwrap();
        std::fs::write(
            src.join("models").join("user.rs"),
            "#[derive(CrudEntity)]\npub struct User { pub id: String }\n",
        )
        .unwrap();
        std::fs::write(
            src.join("b_post.rs"),
            "#[derive(CrudEntity)]\npub struct Post { pub id: String }\n",
        )
        .unwrap();
        std::fs::write(src.join("helpers.rs"), "pub fn noop() {}\n").unwrap();

        let found = discover_entities(dir.path(), &["src".to_string()]).unwrap();
        let paths: Vec<&str> = found.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["src/b_post.rs", "src/models/user.rs"]);
    }

    #[test]
    fn missing_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let found = discover_entities(dir.path(), &["src".to_string(), "demos".to_string()]).unwrap();
        assert!(found.is_empty());
    }
}
