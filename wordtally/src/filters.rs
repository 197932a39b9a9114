//! Input discovery: expands the configured inputs into the list of sources
//! to count.
//!
//! Explicitly named files are always kept, even when their extension is not
//! in the configured list; a missing one surfaces later as
//! [`TallyError::SourceNotFound`]. Directories are walked and their files are
//! filtered by extension, ignore globs and a binary-extension blacklist.
use glob::Pattern;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::errors::{TallyError, TallyResult};

/// Checks if a file should be included based on its extension
pub fn has_valid_extension(path: &Path, extensions: &Option<Vec<String>>) -> bool {
    match extensions {
        None => true,
        Some(exts) => {
            if let Some(ext) = path.extension() {
                if let Some(ext_str) = ext.to_str() {
                    return exts
                        .iter()
                        .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext_str));
                }
            }
            false
        }
    }
}

/// Checks if a file should be ignored based on ignore patterns
pub fn should_ignore(path: &Path, ignore_patterns: &[String]) -> bool {
    let path_str = path.to_string_lossy();

    // Always ignore VCS metadata
    if path_str.contains("/.git/") {
        return true;
    }

    // Match with forward slashes regardless of platform
    let normalized_path = path_str.replace('\\', "/");
    ignore_patterns.iter().any(|pattern| {
        Pattern::new(pattern)
            .map(|p| p.matches(&normalized_path))
            .unwrap_or(false)
    })
}

/// Checks if a file is likely to be binary
pub fn is_likely_binary(path: &Path) -> bool {
    const BINARY_EXTENSIONS: &[&str] = &[
        "exe", "dll", "so", "dylib", "bin", "obj", "o", "class", "jar", "war", "ear", "png", "jpg",
        "jpeg", "gif", "bmp", "ico", "pdf", "doc", "docx", "xls", "xlsx", "zip", "tar", "gz", "7z",
        "rar",
    ];

    if let Some(ext) = path.extension() {
        if let Some(ext_str) = ext.to_str() {
            return BINARY_EXTENSIONS
                .iter()
                .any(|&bin_ext| bin_ext.eq_ignore_ascii_case(ext_str));
        }
    }
    false
}

/// Determines if a file found while walking a directory should be counted
pub fn should_include_file(
    path: &Path,
    extensions: &Option<Vec<String>>,
    ignore_patterns: &[String],
) -> bool {
    !is_likely_binary(path)
        && has_valid_extension(path, extensions)
        && !should_ignore(path, ignore_patterns)
}

/// Expands `inputs` into a sorted, de-duplicated list of source files.
pub fn discover_sources(
    inputs: &[PathBuf],
    extensions: &Option<Vec<String>>,
    ignore_patterns: &[String],
) -> TallyResult<Vec<PathBuf>> {
    if inputs.is_empty() {
        return Err(TallyError::NoInputProvided);
    }

    let mut sources = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let before = sources.len();
            sources.extend(walk_directory(input, extensions, ignore_patterns));
            debug!(
                "Found {} files under {}",
                sources.len() - before,
                input.display()
            );
        } else {
            trace!("Adding explicit source: {}", input.display());
            sources.push(input.clone());
        }
    }

    sources.sort();
    sources.dedup();
    debug!("Discovered {} sources", sources.len());
    Ok(sources)
}

fn walk_directory(
    root: &Path,
    extensions: &Option<Vec<String>>,
    ignore_patterns: &[String],
) -> Vec<PathBuf> {
    let mut walker = WalkBuilder::new(root);
    walker.hidden(true).standard_filters(true).require_git(false);

    walker
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter(|entry| should_include_file(entry.path(), extensions, ignore_patterns))
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_has_valid_extension() {
        let extensions = Some(vec!["txt".to_string()]);
        assert!(has_valid_extension(Path::new("notes.txt"), &extensions));
        assert!(!has_valid_extension(Path::new("notes.md"), &extensions));
        assert!(has_valid_extension(Path::new("NOTES.TXT"), &extensions)); // Test case insensitivity
        assert!(!has_valid_extension(Path::new("notes"), &extensions)); // No extension
        assert!(has_valid_extension(
            Path::new("notes.txt"),
            &Some(vec![".txt".to_string()])
        ));
        assert!(has_valid_extension(Path::new("notes.md"), &None));
    }

    #[test]
    fn test_should_ignore() {
        let ignore_patterns = vec!["**/drafts/**".to_string(), "**/*.tmp".to_string()];

        // Should ignore
        assert!(should_ignore(
            Path::new("corpus/drafts/a.txt"),
            &ignore_patterns
        ));
        assert!(should_ignore(Path::new("corpus/b.tmp"), &ignore_patterns));
        assert!(should_ignore(Path::new("repo/.git/HEAD"), &ignore_patterns));

        // Should not ignore
        assert!(!should_ignore(Path::new("corpus/a.txt"), &ignore_patterns));
        assert!(!should_ignore(Path::new(".gitignore"), &ignore_patterns));
    }

    #[test]
    fn test_is_likely_binary() {
        assert!(is_likely_binary(Path::new("scan.pdf")));
        assert!(is_likely_binary(Path::new("image.PNG"))); // Test case insensitivity
        assert!(!is_likely_binary(Path::new("notes.txt")));
        assert!(!is_likely_binary(Path::new("README")));
    }

    #[test]
    fn test_should_include_file() {
        let extensions = Some(vec!["txt".to_string(), "pdf".to_string()]);
        let ignore_patterns = vec!["**/skip/**".to_string()];

        assert!(should_include_file(
            Path::new("corpus/a.txt"),
            &extensions,
            &ignore_patterns
        ));
        assert!(!should_include_file(
            Path::new("corpus/a.md"),
            &extensions,
            &ignore_patterns
        ));
        assert!(!should_include_file(
            Path::new("corpus/skip/a.txt"),
            &extensions,
            &ignore_patterns
        ));
        // Binary wins over an explicit extension
        assert!(!should_include_file(
            Path::new("corpus/a.pdf"),
            &extensions,
            &ignore_patterns
        ));
    }

    #[test]
    fn test_discover_sources_walks_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("c.md"), "c").unwrap();
        std::fs::write(dir.path().join(".hidden.txt"), "h").unwrap();
        std::fs::write(nested.join("d.txt"), "d").unwrap();

        let extensions = Some(vec!["txt".to_string()]);
        let sources = discover_sources(&[dir.path().to_path_buf()], &extensions, &[]).unwrap();
        assert_eq!(
            sources,
            vec![
                dir.path().join("a.txt"),
                dir.path().join("b.txt"),
                nested.join("d.txt"),
            ]
        );
    }

    #[test]
    fn test_discover_sources_keeps_explicit_files() {
        let dir = tempdir().unwrap();
        let readme = dir.path().join("README.md");
        std::fs::write(&readme, "hello").unwrap();
        let missing = dir.path().join("missing.txt");

        let extensions = Some(vec!["txt".to_string()]);
        let sources = discover_sources(
            &[readme.clone(), missing.clone(), readme.clone()],
            &extensions,
            &[],
        )
        .unwrap();
        assert_eq!(sources, vec![readme, missing]);
    }

    #[test]
    fn test_discover_sources_without_inputs() {
        let result = discover_sources(&[], &None, &[]);
        assert!(matches!(result, Err(TallyError::NoInputProvided)));
    }
}
