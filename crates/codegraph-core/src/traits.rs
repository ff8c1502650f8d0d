use async_trait::async_trait;

use crate::{
    CodeChunk, FileDependency, ModuleDependency, ParsedCode, ProjectId, Result, SimilarityResult,
};

/// Parses a single C source file. Tolerant of malformed input: a
/// syntactically invalid file yields a best-effort `ParsedCode` rather
/// than an error; only I/O failures (file missing, unreadable) fail.
#[async_trait]
pub trait CodeParser: Send + Sync {
    async fn parse_file(&self, path: &str) -> Result<ParsedCode>;
    async fn extract_file_dependencies(&self, path: &str) -> Result<Vec<FileDependency>>;
}

/// Splits a file into chunks bound for the vector store. Implementations
/// are expected to prefer semantic boundaries and fall back to
/// token-bounded splitting when no semantic unit is found.
pub trait Chunker: Send + Sync {
    fn chunk_file(&self, path: &str, content: &str) -> Result<Vec<CodeChunk>>;
}

/// The property graph. Every method is scoped by `project_id`; callers
/// never see another project's nodes or edges.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn init_schema(&self) -> Result<()>;

    async fn store_parsed_code(&self, project_id: &ProjectId, code: &ParsedCode) -> Result<()>;

    async fn function_code(
        &self,
        project_id: &ProjectId,
        name: &str,
    ) -> Result<Option<String>>;

    async fn function_callers(&self, project_id: &ProjectId, name: &str) -> Result<Vec<String>>;

    async fn function_callees(&self, project_id: &ProjectId, name: &str) -> Result<Vec<String>>;

    async fn build_call_graph(
        &self,
        project_id: &ProjectId,
        root: &str,
        max_depth: u32,
    ) -> Result<crate::CallGraphData>;

    async fn store_file_dependencies(
        &self,
        project_id: &ProjectId,
        deps: &[FileDependency],
    ) -> Result<()>;

    async fn store_module_dependencies(
        &self,
        project_id: &ProjectId,
        deps: &[ModuleDependency],
    ) -> Result<()>;

    async fn file_dependencies(&self, project_id: &ProjectId) -> Result<Vec<FileDependency>>;

    async fn module_dependencies(&self, project_id: &ProjectId) -> Result<Vec<ModuleDependency>>;

    async fn node_counts(&self, project_id: &ProjectId) -> Result<crate::GraphCounts>;

    async fn clear_project(&self, project_id: &ProjectId) -> Result<()>;
}

/// The vector store. Collections are named `<project_id>_<base>`;
/// metric is fixed to cosine at creation time.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, collection: &str) -> Result<()>;

    async fn add_embeddings(
        &self,
        collection: &str,
        chunks: &[CodeChunk],
        vectors: &[Vec<f32>],
    ) -> Result<()>;

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SimilarityResult>>;

    async fn list_collections(&self, project_id: &ProjectId) -> Result<Vec<String>>;

    async fn cleanup_project(&self, project_id: &ProjectId) -> Result<()>;

    async fn delete_project(&self, project_id: &ProjectId) -> Result<()>;
}

/// A batch text encoder, treated as a black box: the only contract is
/// "N texts in, N vectors out, same order".
#[async_trait]
pub trait EmbeddingEngine: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimension(&self) -> usize;
}

/// The LLM chat endpoint, likewise treated as a black box.
#[async_trait]
pub trait ChatBot: Send + Sync {
    async fn ask(&self, system_prompt: &str, context: &str, question: &str) -> Result<crate::ChatResponse>;
}
