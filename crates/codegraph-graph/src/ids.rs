use sha2::{Digest, Sha256};

/// Deterministic SurrealDB record-key suffixes. Using a content-derived
/// key instead of a random id means `store_parsed_code` upserts by
/// identity rather than racing the unique index on re-analysis.
fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())[..24].to_string()
}

pub fn file_key(project_id: &str, path: &str) -> String {
    digest(&["file", project_id, path])
}

pub fn function_key(project_id: &str, name: &str, file_path: &str) -> String {
    digest(&["function", project_id, name, file_path])
}

pub fn module_key(project_id: &str, name: &str) -> String {
    digest(&["module", project_id, name])
}

/// Deterministic key for a relation-table record, so re-running
/// `store_parsed_code` upserts the same edge instead of growing a new
/// one each time.
pub fn digest_edge(kind: &str, from: &str, to: &str) -> String {
    digest(&[kind, from, to])
}

/// First path segment of `relative_path`, or the root sentinel when the
/// file sits directly under the project root. Shared with the
/// dependency analyzer so module naming stays in lock-step with what
/// the graph store records as each file's owning module.
pub const ROOT_MODULE: &str = "_root";

pub fn module_name_for_path(relative_path: &str) -> String {
    let normalized = relative_path.trim_start_matches("./");
    match normalized.split('/').next() {
        Some(segment) if !segment.is_empty() && segment != normalized => segment.to_string(),
        _ => ROOT_MODULE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_deterministic() {
        assert_eq!(
            file_key("p1", "a.c"),
            file_key("p1", "a.c")
        );
        assert_ne!(file_key("p1", "a.c"), file_key("p2", "a.c"));
    }

    #[test]
    fn root_files_map_to_root_module() {
        assert_eq!(module_name_for_path("main.c"), ROOT_MODULE);
    }

    #[test]
    fn nested_files_use_first_segment() {
        assert_eq!(module_name_for_path("lib/util/string.c"), "lib");
    }
}
