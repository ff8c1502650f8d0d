use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Project isolation key. Derived deterministically from the absolute
/// project path (see `project_id_for_path`), or assigned by an external
/// registry; either way it is just an opaque string everywhere in this
/// crate.
pub type ProjectId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallType {
    Direct,
    Member,
    Pointer,
    Recursive,
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallType::Direct => "direct",
            CallType::Member => "member",
            CallType::Pointer => "pointer",
            CallType::Recursive => "recursive",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CallType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(CallType::Direct),
            "member" => Ok(CallType::Member),
            "pointer" => Ok(CallType::Pointer),
            "recursive" => Ok(CallType::Recursive),
            other => Err(format!("unknown call type: {other}")),
        }
    }
}

/// A parsed function. `(project_id, name, file_path)` is the unique key;
/// `code` is filled in by the parser and may be backfilled later by the
/// graph store from `start_line..end_line` if it was ever cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub docstring: Option<String>,
    pub parameters: Vec<String>,
    pub return_type: String,
    pub code: String,
}

impl Function {
    /// Mirrors the reference implementation's post-init validation:
    /// malformed spans and empty names are rejected at construction time
    /// rather than silently accepted and discovered later in storage.
    pub fn new(
        name: impl Into<String>,
        file_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
        code: impl Into<String>,
    ) -> crate::Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(crate::CodeGraphError::Parse(
                "function name cannot be empty".into(),
            ));
        }
        if end_line < start_line {
            return Err(crate::CodeGraphError::Parse(format!(
                "end_line {end_line} must be >= start_line {start_line}"
            )));
        }
        Ok(Self {
            name,
            file_path: file_path.into(),
            start_line,
            end_line,
            docstring: None,
            parameters: Vec::new(),
            return_type: "void".to_string(),
            code: code.into(),
        })
    }
}

/// A single call site found inside a function body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub caller: String,
    pub caller_file: String,
    pub callee: String,
    pub call_type: CallType,
    pub line_number: u32,
    pub context: Option<String>,
}

/// A `#include` edge discovered in a source or header file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDependency {
    pub source_file: String,
    pub target_path: String,
    pub is_system: bool,
    pub line_number: u32,
}

/// Aggregated first-path-segment module dependency, produced by the
/// dependency analyzer from a project's `FileDependency` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDependency {
    pub source_module: String,
    pub target_module: String,
    pub file_count: u32,
    pub strength: f32,
    pub is_circular: bool,
}

/// File metadata tracked alongside its functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub last_modified: chrono::DateTime<chrono::Utc>,
    pub includes: Vec<String>,
}

/// The result of parsing a single C file: its `FileInfo`, the functions
/// it defines, and the call sites found inside them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedCode {
    pub file_info: FileInfo,
    pub functions: Vec<Function>,
    pub calls: Vec<FunctionCall>,
}

impl ParsedCode {
    pub fn get_function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// A chunk of source text bound for the vector store, with enough
/// metadata for the QA service to cite where it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub file_name: String,
    pub module: String,
    pub start_line: u32,
    pub end_line: u32,
    pub chunk_type: String,
    pub function_name: Option<String>,
    pub chunk_tokens: u32,
}

/// One hit from a vector-similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
    pub similarity: f32,
}

/// A cited source surfaced alongside a `QueryResult`: one entry per
/// context section that actually contributed to the answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceRef {
    Function { name: String, file_path: String },
    File { path: String },
    VectorHit { file_path: String, start_line: u32, end_line: u32, similarity: f32 },
}

/// Structured QA result: the prose answer plus the sources and raw
/// context sections that were assembled to produce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    pub confidence: f32,
    pub sources: Vec<SourceRef>,
    pub context: Vec<String>,
}

impl QueryResult {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        confidence: f32,
        sources: Vec<SourceRef>,
        context: Vec<String>,
    ) -> crate::Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(crate::CodeGraphError::Validation(format!(
                "confidence must be in [0,1], got {confidence}"
            )));
        }
        Ok(Self {
            question: question.into(),
            answer: answer.into(),
            confidence,
            sources,
            context,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

/// Run-local bookkeeping for one `analyze` invocation, serialized into
/// the orchestrator's JSON/Markdown report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub id: String,
    pub project_path: String,
    pub status: SessionStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub files_processed: u64,
    pub functions_found: u64,
    pub errors: Vec<String>,
}

impl AnalysisSession {
    pub fn start(project_path: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_path: project_path.into(),
            status: SessionStatus::Running,
            started_at: chrono::Utc::now(),
            completed_at: None,
            files_processed: 0,
            functions_found: 0,
            errors: Vec::new(),
        }
    }

    pub fn mark_completed(&mut self) {
        self.status = SessionStatus::Completed;
        self.completed_at = Some(chrono::Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = SessionStatus::Failed;
        self.completed_at = Some(chrono::Utc::now());
        self.errors.push(error.into());
    }

    pub fn add_progress(&mut self, files: u64, functions: u64) {
        self.files_processed += files;
        self.functions_found += functions;
    }
}

/// Derives a stable project_id from an absolute project path, the way
/// the reference implementation falls back to `"auto_" + md5(path)[:8]`
/// when no registry entry exists yet.
pub fn project_id_for_path(path: &str) -> ProjectId {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let digest = hasher.finalize();
    format!("auto_{:x}", digest)[..13].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_rejects_empty_name() {
        let err = Function::new("", "a.c", 1, 1, "").unwrap_err();
        assert!(matches!(err, crate::CodeGraphError::Parse(_)));
    }

    #[test]
    fn function_rejects_end_before_start() {
        let err = Function::new("f", "a.c", 5, 2, "").unwrap_err();
        assert!(matches!(err, crate::CodeGraphError::Parse(_)));
    }

    #[test]
    fn query_result_rejects_out_of_range_confidence() {
        let err = QueryResult::new("q", "a", 1.5, vec![], vec![]).unwrap_err();
        assert!(matches!(err, crate::CodeGraphError::Validation(_)));
    }

    #[test]
    fn project_id_is_deterministic() {
        let a = project_id_for_path("/home/user/project");
        let b = project_id_for_path("/home/user/project");
        assert_eq!(a, b);
        assert!(a.starts_with("auto_"));
    }

    #[test]
    fn project_id_differs_for_different_paths() {
        let a = project_id_for_path("/home/user/project-a");
        let b = project_id_for_path("/home/user/project-b");
        assert_ne!(a, b);
    }

    #[test]
    fn analysis_session_tracks_progress_and_completion() {
        let mut session = AnalysisSession::start("/tmp/project");
        session.add_progress(3, 10);
        session.mark_completed();
        assert_eq!(session.files_processed, 3);
        assert_eq!(session.functions_found, 10);
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completed_at.is_some());
    }
}
