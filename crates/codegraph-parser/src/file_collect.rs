use std::path::{Path, PathBuf};

use codegraph_core::{CodeGraphError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::parser::CParser;
use codegraph_core::ParsedCode;

const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/build/**",
    "**/cmake-build-*/**",
    "**/.codegraph/**",
];

/// Enumerates C source files under `root` matching `include_globs` and
/// not matching `exclude_globs` (plus a handful of always-excluded
/// build/VCS directories). Empty `include_globs` defaults to `**/*.c`
/// and `**/*.h`.
pub fn collect_c_files(
    root: &Path,
    include_globs: &[String],
    exclude_globs: &[String],
) -> Result<Vec<PathBuf>> {
    let include_patterns: Vec<String> = if include_globs.is_empty() {
        vec!["**/*.c".to_string(), "**/*.h".to_string()]
    } else {
        include_globs.to_vec()
    };

    let include_set = build_globset(&include_patterns)
        .ok_or_else(|| CodeGraphError::Configuration("no valid include globs".into()))?;

    let mut exclude_patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    exclude_patterns.extend(exclude_globs.iter().cloned());
    let exclude_set = build_globset(&exclude_patterns);

    let walker = WalkBuilder::new(root).hidden(false).git_ignore(true).build();
    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("walk error: {e}");
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(ref set) = exclude_set {
            if set.is_match(path) {
                continue;
            }
        }
        if !include_set.is_match(path) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    debug!("collected {} C files under {:?}", files.len(), root);
    Ok(files)
}

fn build_globset<S: AsRef<str>>(patterns: &[S]) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut added = false;
    for pattern in patterns {
        match Glob::new(pattern.as_ref()) {
            Ok(glob) => {
                builder.add(glob);
                added = true;
            }
            Err(e) => warn!("invalid glob '{}': {e}", pattern.as_ref()),
        }
    }
    if added {
        builder.build().ok()
    } else {
        None
    }
}

/// Parses every file in `files` using a fresh `CParser` per rayon
/// worker thread. Per-file parse errors are collected alongside
/// successes rather than aborting the batch — mirrors the orchestrator's
/// "record and continue" policy for callers (tests, benches) that want
/// the whole-directory result without standing up the full C7 pipeline.
pub fn parse_files_parallel(files: &[PathBuf]) -> Vec<(PathBuf, Result<ParsedCode>)> {
    files
        .par_iter()
        .map_init(CParser::new, |parser, path| {
            let result = parser.parse_file_sync(&path.to_string_lossy());
            (path.clone(), result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn collects_only_c_and_h_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.c"), "").unwrap();
        fs::write(dir.path().join("b.h"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = collect_c_files(dir.path(), &[], &[]).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn exclude_globs_filter_out_matches() {
        let dir = tempdir().unwrap();
        let vendor = dir.path().join("vendor");
        fs::create_dir_all(&vendor).unwrap();
        fs::write(dir.path().join("a.c"), "").unwrap();
        fs::write(vendor.join("b.c"), "").unwrap();

        let files = collect_c_files(dir.path(), &[], &["**/vendor/**".to_string()]).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.c"));
    }
}
