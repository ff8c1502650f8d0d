use serde::{Deserialize, Serialize};

use crate::CallType;

/// One node in a rendered call graph: a function name plus the file it
/// lives in (when known — a callee may be merged before its defining
/// file is parsed, per the orchestrator's ordering guarantees).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CallGraphNode {
    pub name: String,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphEdge {
    pub source: String,
    pub target: String,
    pub call_type: CallType,
    pub line_number: u32,
}

/// `build_graph(root, depth)`'s result. When the root function doesn't
/// exist, `nodes` and `edges` are both empty; when it exists but has no
/// outgoing calls within `max_depth`, `nodes` is just the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphData {
    pub root: String,
    pub max_depth: u32,
    pub nodes: Vec<CallGraphNode>,
    pub edges: Vec<CallGraphEdge>,
}

impl CallGraphData {
    pub fn empty(root: impl Into<String>, max_depth: u32) -> Self {
        Self {
            root: root.into(),
            max_depth,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn stats(&self) -> CallGraphStats {
        CallGraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            max_depth: self.max_depth,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub max_depth: u32,
}

/// Node/relationship counts reported by `codegraph status`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphCounts {
    pub files: u64,
    pub functions: u64,
    pub modules: u64,
    pub calls: u64,
    pub file_dependencies: u64,
    pub module_dependencies: u64,
}

/// Aggregate result of `analyze_project`: module-level dependencies plus
/// the cycles and modularity score derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDependencies {
    pub file_dependencies: Vec<crate::FileDependency>,
    pub module_dependencies: Vec<crate::ModuleDependency>,
    pub circular_dependencies: Vec<Vec<String>>,
    pub modularity_score: f32,
}

/// The LLM endpoint's parsed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// `analyze`'s return value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub session: crate::AnalysisSession,
    pub graph_counts: GraphCounts,
    pub circular_dependencies: Vec<Vec<String>>,
    pub modularity_score: f32,
    pub partial_embeddings: bool,
    pub report_json_path: Option<String>,
    pub report_markdown_path: Option<String>,
}
