//! Call graph rendering: Mermaid, JSON, ASCII tree and
//! standalone HTML, built on top of `GraphStore::build_call_graph`.

use codegraph_core::{CallGraphData, CallGraphEdge, CallType, CodeGraphError, GraphStore, ProjectId, Result};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallGraphFormat {
    Mermaid,
    Json,
    Ascii,
    Html,
}

pub struct CallGraphService<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> CallGraphService<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    pub async fn build_graph(
        &self,
        project_id: &ProjectId,
        root: &str,
        max_depth: u32,
    ) -> Result<CallGraphData> {
        self.store.build_call_graph(project_id, root, max_depth).await
    }

    pub async fn render(
        &self,
        project_id: &ProjectId,
        root: &str,
        max_depth: u32,
        format: CallGraphFormat,
    ) -> Result<String> {
        let graph = self.build_graph(project_id, root, max_depth).await?;
        match format {
            CallGraphFormat::Mermaid => Ok(to_mermaid(&graph)),
            CallGraphFormat::Json => to_json(&graph),
            CallGraphFormat::Ascii => Ok(to_ascii(&graph)),
            CallGraphFormat::Html => Ok(to_html(&graph)),
        }
    }
}

fn sanitize_node_id(name: &str) -> String {
    let mut id: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if id.chars().next().map(|c| !c.is_alphabetic()).unwrap_or(true) {
        id = format!("fn_{id}");
    }
    id
}

fn escape_label(label: &str) -> String {
    label.replace('"', "&quot;")
}

fn arrow_for(call_type: CallType) -> &'static str {
    match call_type {
        CallType::Direct => "-->",
        CallType::Member => "-->|member|",
        CallType::Pointer => "==>|pointer|",
        CallType::Recursive => "-.->|recursive|",
    }
}

fn to_mermaid(graph: &CallGraphData) -> String {
    let mut lines = vec!["graph TD".to_string()];
    lines.push("    classDef rootNode fill:#f96,stroke:#333,stroke-width:2px;".to_string());

    for node in &graph.nodes {
        let id = sanitize_node_id(&node.name);
        lines.push(format!("    {id}[\"{}\"]", escape_label(&node.name)));
    }

    if !graph.nodes.is_empty() {
        lines.push(format!("    class {} rootNode;", sanitize_node_id(&graph.root)));
    }

    for edge in &graph.edges {
        let source_id = sanitize_node_id(&edge.source);
        let target_id = sanitize_node_id(&edge.target);
        lines.push(format!("    {source_id} {} {target_id}", arrow_for(edge.call_type)));
    }

    lines.join("\n")
}

fn to_json(graph: &CallGraphData) -> Result<String> {
    let value = serde_json::json!({
        "root": graph.root,
        "max_depth": graph.max_depth,
        "nodes": graph.nodes,
        "edges": graph.edges,
        "stats": graph.stats(),
        "metadata": { "format": "call_graph_json", "version": "1.0" },
    });
    serde_json::to_string_pretty(&value).map_err(CodeGraphError::Serialization)
}

fn to_ascii(graph: &CallGraphData) -> String {
    if graph.nodes.is_empty() {
        return format!("{} (not found)\n", graph.root);
    }

    let mut adjacency: HashMap<&str, Vec<&CallGraphEdge>> = HashMap::new();
    for edge in &graph.edges {
        adjacency.entry(edge.source.as_str()).or_default().push(edge);
    }

    let mut out = String::new();
    let mut visited: HashSet<String> = HashSet::new();
    walk_ascii(&graph.root, &adjacency, &mut visited, 0, &mut out);
    out
}

fn walk_ascii(
    name: &str,
    adjacency: &HashMap<&str, Vec<&CallGraphEdge>>,
    visited: &mut HashSet<String>,
    depth: usize,
    out: &mut String,
) {
    let indent = "  ".repeat(depth);
    if visited.contains(name) {
        out.push_str(&format!("{indent}{name} (recursive)\n"));
        return;
    }

    out.push_str(&format!("{indent}{name}\n"));
    visited.insert(name.to_string());

    if let Some(edges) = adjacency.get(name) {
        for edge in edges {
            walk_ascii(&edge.target, adjacency, visited, depth + 1, out);
        }
    }
}

fn to_html(graph: &CallGraphData) -> String {
    let mermaid = to_mermaid(graph);
    let stats = graph.stats();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Call graph: {root}</title>
<script src="https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js"></script>
</head>
<body>
<section class="stats">
  <p>Nodes: {node_count}</p>
  <p>Edges: {edge_count}</p>
  <p>Max depth: {max_depth}</p>
</section>
<pre class="mermaid">
{mermaid}
</pre>
<script>
mermaid.initialize({{ startOnLoad: true, theme: 'default', flowchart: {{ useMaxWidth: true, htmlLabels: true }} }});
</script>
</body>
</html>
"#,
        root = escape_label(&graph.root),
        node_count = stats.node_count,
        edge_count = stats.edge_count,
        max_depth = stats.max_depth,
        mermaid = mermaid,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::CallGraphNode;

    fn sample_graph() -> CallGraphData {
        CallGraphData {
            root: "main".to_string(),
            max_depth: 2,
            nodes: vec![
                CallGraphNode { name: "main".to_string(), file_path: Some("main.c".to_string()) },
                CallGraphNode { name: "helper".to_string(), file_path: Some("util.c".to_string()) },
            ],
            edges: vec![CallGraphEdge {
                source: "main".to_string(),
                target: "helper".to_string(),
                call_type: CallType::Direct,
                line_number: 10,
            }],
        }
    }

    #[test]
    fn mermaid_marks_root_and_renders_edge() {
        let graph = sample_graph();
        let output = to_mermaid(&graph);
        assert!(output.contains("graph TD"));
        assert!(output.contains("class main rootNode;"));
        assert!(output.contains("main --> helper"));
    }

    #[test]
    fn empty_graph_renders_not_found_in_ascii() {
        let empty = CallGraphData::empty("missing", 2);
        let output = to_ascii(&empty);
        assert!(output.contains("missing (not found)"));
    }

    #[test]
    fn recursive_edge_does_not_re_expand() {
        let graph = CallGraphData {
            root: "a".to_string(),
            max_depth: 3,
            nodes: vec![
                CallGraphNode { name: "a".to_string(), file_path: None },
                CallGraphNode { name: "b".to_string(), file_path: None },
            ],
            edges: vec![
                CallGraphEdge { source: "a".to_string(), target: "b".to_string(), call_type: CallType::Direct, line_number: 1 },
                CallGraphEdge { source: "b".to_string(), target: "a".to_string(), call_type: CallType::Recursive, line_number: 2 },
            ],
        };
        let output = to_ascii(&graph);
        assert!(output.contains("a (recursive)"));
    }

    #[test]
    fn json_round_trips_node_and_edge_counts() {
        let graph = sample_graph();
        let json = to_json(&graph).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stats"]["node_count"], 2);
        assert_eq!(value["stats"]["edge_count"], 1);
    }
}
