use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use codegraph_core::FileDependency;
use regex::Regex;

/// Directories probed under each ancestor when resolving a quoted include
/// that isn't found as a plain sibling/parent.
const ANCESTOR_PROBE_DIRS: &[&str] = &["include", "inc", "headers"];
const MAX_ANCESTOR_HOPS: usize = 3;

fn include_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*#\s*include\s*(<([^>]+)>|"([^"]+)")"#).expect("valid include regex")
    })
}

/// Extracts `#include` directives from `content`, classifying each as
/// system (`<...>`) or project (`"..."`), and resolving quoted includes
/// relative to `source_file`'s own directory.
///
/// A system include whose target happens to resolve on disk relative to
/// the source file is reclassified as project-local — a known,
/// occasionally-wrong heuristic kept as-is rather than fixed (see
/// DESIGN.md).
pub fn extract_file_dependencies(source_file: &str, content: &str) -> Vec<FileDependency> {
    let base_dir = Path::new(source_file).parent().unwrap_or_else(|| Path::new("."));
    let mut deps = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let Some(caps) = include_regex().captures(line) else {
            continue;
        };
        let line_number = (idx + 1) as u32;

        if let Some(system_path) = caps.get(2) {
            let raw = system_path.as_str().to_string();
            let is_system = resolve_quoted_include(base_dir, &raw).is_none();
            deps.push(FileDependency {
                source_file: source_file.to_string(),
                target_path: raw,
                is_system,
                line_number,
            });
        } else if let Some(quoted_path) = caps.get(3) {
            let raw = quoted_path.as_str().to_string();
            deps.push(FileDependency {
                source_file: source_file.to_string(),
                target_path: raw,
                is_system: false,
                line_number,
            });
        }
    }

    deps
}

/// Walks sibling -> parent -> up to three ancestor directories (each
/// probing `include/`, `inc/`, `headers/`) looking for `relative`.
/// Returns the first path that exists on disk.
pub fn resolve_quoted_include(base_dir: &Path, relative: &str) -> Option<PathBuf> {
    let sibling = base_dir.join(relative);
    if sibling.exists() {
        return Some(sibling);
    }

    let parent = base_dir.parent()?;
    let parent_candidate = parent.join(relative);
    if parent_candidate.exists() {
        return Some(parent_candidate);
    }

    let mut ancestor = parent;
    for hop in 0..MAX_ANCESTOR_HOPS {
        if hop > 0 {
            ancestor = match ancestor.parent() {
                Some(a) => a,
                None => break,
            };
        }
        for probe in ANCESTOR_PROBE_DIRS {
            let candidate = ancestor.join(probe).join(relative);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn extracts_system_and_project_includes() {
        let content = "#include <stdio.h>\n#include \"local.h\"\nint x;\n";
        let deps = extract_file_dependencies("src/main.c", content);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].target_path, "stdio.h");
        assert!(deps[0].is_system);
        assert_eq!(deps[1].target_path, "local.h");
        assert!(!deps[1].is_system);
        assert_eq!(deps[1].line_number, 2);
    }

    #[test]
    fn empty_file_yields_no_dependencies() {
        assert!(extract_file_dependencies("a.c", "").is_empty());
    }

    #[test]
    fn system_include_resolving_on_disk_is_reclassified_project_local() {
        let dir = tempdir().unwrap();
        let src_dir = dir.path().join("src");
        fs::create_dir_all(&src_dir).unwrap();
        fs::write(src_dir.join("shadow.h"), "").unwrap();
        let source_file = src_dir.join("main.c");
        fs::write(&source_file, "").unwrap();

        let content = "#include <shadow.h>\n";
        let deps = extract_file_dependencies(source_file.to_str().unwrap(), content);
        assert_eq!(deps.len(), 1);
        assert!(!deps[0].is_system);
    }

    #[test]
    fn quoted_include_resolves_via_ancestor_include_dir() {
        let dir = tempdir().unwrap();
        let src_dir = dir.path().join("project").join("src");
        fs::create_dir_all(&src_dir).unwrap();
        let include_dir = dir.path().join("project").join("include");
        fs::create_dir_all(&include_dir).unwrap();
        fs::write(include_dir.join("api.h"), "").unwrap();

        let resolved = resolve_quoted_include(&src_dir, "api.h");
        assert!(resolved.is_some());
    }
}
