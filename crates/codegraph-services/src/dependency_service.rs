//! File/module dependency graph rendering and export:
//! Mermaid, JSON, ASCII and Graphviz DOT, optionally narrowed to a
//! single focus node.

use std::path::{Path, PathBuf};

use codegraph_core::{CodeGraphError, FileDependency, GraphStore, ModuleDependency, ProjectId, Result};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyFormat {
    Mermaid,
    Json,
    Ascii,
    Dot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyScope {
    File,
    Module,
}

pub struct DependencyService<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> DependencyService<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    pub async fn generate_dependency_graph(
        &self,
        project_id: &ProjectId,
        format: DependencyFormat,
        scope: DependencyScope,
        focus: Option<&str>,
    ) -> Result<String> {
        match scope {
            DependencyScope::File => {
                let deps = self.store.file_dependencies(project_id).await?;
                let deps = filter_file_deps(deps, focus);
                Ok(render_file_deps(&deps, format))
            }
            DependencyScope::Module => {
                let deps = self.store.module_dependencies(project_id).await?;
                let deps = filter_module_deps(deps, focus);
                Ok(render_module_deps(&deps, format))
            }
        }
    }

    pub async fn export_dependency_graph(
        &self,
        project_id: &ProjectId,
        format: DependencyFormat,
        scope: DependencyScope,
        focus: Option<&str>,
        path: &Path,
    ) -> Result<PathBuf> {
        let rendered = self
            .generate_dependency_graph(project_id, format, scope, focus)
            .await?;
        let out_path = ensure_extension(path, format);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(CodeGraphError::Io)?;
        }
        std::fs::write(&out_path, rendered).map_err(CodeGraphError::Io)?;
        Ok(out_path)
    }
}

fn filter_file_deps(deps: Vec<FileDependency>, focus: Option<&str>) -> Vec<FileDependency> {
    match focus {
        Some(f) => deps
            .into_iter()
            .filter(|d| d.source_file == f || d.target_path == f)
            .collect(),
        None => deps,
    }
}

fn filter_module_deps(deps: Vec<ModuleDependency>, focus: Option<&str>) -> Vec<ModuleDependency> {
    match focus {
        Some(f) => deps
            .into_iter()
            .filter(|d| d.source_module == f || d.target_module == f)
            .collect(),
        None => deps,
    }
}

fn ensure_extension(path: &Path, format: DependencyFormat) -> PathBuf {
    let wanted = match format {
        DependencyFormat::Json => "json",
        DependencyFormat::Dot => "dot",
        DependencyFormat::Mermaid | DependencyFormat::Ascii => "md",
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(wanted) => path.to_path_buf(),
        _ => {
            let mut owned = path.to_path_buf();
            owned.set_extension(wanted);
            owned
        }
    }
}

/// Deterministic short id (`f0001`, `m0042`) used for graph node
/// identifiers, derived from a SHA256 digest of the full path/name so
/// renders are stable across runs.
fn short_id(prefix: char, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    let n = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    format!("{prefix}{:04}", n % 10000)
}

fn render_file_deps(deps: &[FileDependency], format: DependencyFormat) -> String {
    match format {
        DependencyFormat::Mermaid => {
            let mut lines = vec!["graph LR".to_string()];
            for dep in deps {
                let source_id = short_id('f', &dep.source_file);
                let target_id = short_id('f', &dep.target_path);
                lines.push(format!("    {source_id}[\"{}\"]", dep.source_file));
                lines.push(format!("    {target_id}[\"{}\"]", dep.target_path));
                let style = if dep.is_system { "-.->|" } else { "-->|" };
                lines.push(format!("    {source_id} {style}line {}|{target_id}", dep.line_number));
            }
            lines.join("\n")
        }
        DependencyFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "scope": "file",
            "dependencies": deps,
        }))
        .unwrap_or_default(),
        DependencyFormat::Ascii => {
            let mut out = String::new();
            for dep in deps {
                let marker = if dep.is_system { "(system)" } else { "" };
                out.push_str(&format!(
                    "{} -> {} {}\n",
                    dep.source_file, dep.target_path, marker
                ));
            }
            out
        }
        DependencyFormat::Dot => {
            let mut lines = vec!["digraph file_dependencies {".to_string()];
            for dep in deps {
                let source_id = short_id('f', &dep.source_file);
                let target_id = short_id('f', &dep.target_path);
                lines.push(format!("  \"{source_id}\" [label=\"{}\"];", dep.source_file));
                lines.push(format!("  \"{target_id}\" [label=\"{}\"];", dep.target_path));
                let style = if dep.is_system { " [style=dashed]" } else { "" };
                lines.push(format!("  \"{source_id}\" -> \"{target_id}\"{style};"));
            }
            lines.push("}".to_string());
            lines.join("\n")
        }
    }
}

fn render_module_deps(deps: &[ModuleDependency], format: DependencyFormat) -> String {
    match format {
        DependencyFormat::Mermaid => {
            let mut lines = vec!["graph LR".to_string()];
            for dep in deps {
                let source_id = short_id('m', &dep.source_module);
                let target_id = short_id('m', &dep.target_module);
                lines.push(format!("    {source_id}[\"{}\"]", dep.source_module));
                lines.push(format!("    {target_id}[\"{}\"]", dep.target_module));
                let arrow = if dep.is_circular { "==>|circular|" } else { "-->|" };
                let label = if dep.is_circular {
                    String::new()
                } else {
                    format!("{:.2}|", dep.strength)
                };
                lines.push(format!("    {source_id} {arrow}{label}{target_id}"));
            }
            lines.join("\n")
        }
        DependencyFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "scope": "module",
            "dependencies": deps,
        }))
        .unwrap_or_default(),
        DependencyFormat::Ascii => {
            let mut out = String::new();
            for dep in deps {
                let marker = if dep.is_circular { "(circular)" } else { "" };
                out.push_str(&format!(
                    "{} -> {} [strength={:.2}] {}\n",
                    dep.source_module, dep.target_module, dep.strength, marker
                ));
            }
            out
        }
        DependencyFormat::Dot => {
            let mut lines = vec!["digraph module_dependencies {".to_string()];
            for dep in deps {
                let source_id = short_id('m', &dep.source_module);
                let target_id = short_id('m', &dep.target_module);
                lines.push(format!("  \"{source_id}\" [label=\"{}\"];", dep.source_module));
                lines.push(format!("  \"{target_id}\" [label=\"{}\"];", dep.target_module));
                let style = if dep.is_circular {
                    " [color=red, penwidth=2]"
                } else {
                    ""
                };
                lines.push(format!(
                    "  \"{source_id}\" -> \"{target_id}\" [label=\"{:.2}\"]{style};",
                    dep.strength
                ));
            }
            lines.push("}".to_string());
            lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_is_deterministic() {
        assert_eq!(short_id('f', "main.c"), short_id('f', "main.c"));
    }

    #[test]
    fn dot_marks_circular_module_edges() {
        let deps = vec![ModuleDependency {
            source_module: "net".to_string(),
            target_module: "lib".to_string(),
            file_count: 2,
            strength: 0.5,
            is_circular: true,
        }];
        let dot = render_module_deps(&deps, DependencyFormat::Dot);
        assert!(dot.contains("color=red"));
    }

    #[test]
    fn focus_filters_to_matching_file() {
        let deps = vec![
            FileDependency { source_file: "a.c".to_string(), target_path: "b.h".to_string(), is_system: false, line_number: 1 },
            FileDependency { source_file: "c.c".to_string(), target_path: "d.h".to_string(), is_system: false, line_number: 1 },
        ];
        let filtered = filter_file_deps(deps, Some("a.c"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].source_file, "a.c");
    }

    #[test]
    fn export_extension_is_forced_to_json() {
        let path = PathBuf::from("/tmp/out.txt");
        let forced = ensure_extension(&path, DependencyFormat::Json);
        assert_eq!(forced.extension().unwrap(), "json");
    }
}
