//! Whole-project analysis orchestration: enumerates C
//! sources, fans parsing out across a rayon worker pool that bridges
//! into the async graph store through `tokio::runtime::Handle::block_on`,
//! runs the dependency analyzer, optionally chunks and embeds, and
//! writes a JSON + Markdown report.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use codegraph_core::{
    AnalysisSession, Chunker as _, CodeGraphError, GraphCounts, GraphStore, ParsedCode, ProjectDependencies,
    ProjectId, Result, Stats, VectorStore,
};
use codegraph_parser::{collect_c_files, CParser};
use codegraph_vector::{CChunker, Embedder};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dependency_analyzer::DependencyAnalyzer;

const PROCESSED_FILES_CACHE: &str = "processed_files.json";
const REPORT_JSON_NAME: &str = "analysis_report.json";
const REPORT_MARKDOWN_NAME: &str = "analysis_report.md";

#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub project_root: PathBuf,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub thread_count: usize,
    pub incremental: bool,
    pub generate_embeddings: bool,
    pub output_dir: PathBuf,
    pub base_collection: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProcessedFilesCache(HashMap<String, u64>);

/// Drives one `analyze` invocation end to end. `embedder` is `None`
/// when the caller never wants embeddings generated, independent of
/// the per-request `generate_embeddings` flag.
pub struct AnalysisOrchestrator {
    graph: Arc<dyn GraphStore>,
    embedder: Option<Arc<Embedder>>,
}

impl AnalysisOrchestrator {
    pub fn new(graph: Arc<dyn GraphStore>, _vector: Arc<dyn VectorStore>, embedder: Option<Arc<Embedder>>) -> Self {
        Self { graph, embedder }
    }

    pub async fn analyze(&self, project_id: &ProjectId, request: &AnalyzeRequest) -> Result<Stats> {
        let mut session = AnalysisSession::start(request.project_root.to_string_lossy().to_string());

        let all_files = collect_c_files(&request.project_root, &request.include_globs, &request.exclude_globs)?;

        let cache_path = request.output_dir.join(PROCESSED_FILES_CACHE);
        let mut cache = if request.incremental {
            load_cache(&cache_path)
        } else {
            ProcessedFilesCache::default()
        };

        let files: Vec<PathBuf> = all_files
            .into_iter()
            .filter(|path| {
                if !request.incremental {
                    return true;
                }
                let key = path.to_string_lossy().to_string();
                match (cache.0.get(&key), file_mtime_secs(path)) {
                    (Some(&prev), Some(cur)) if cur <= prev => false,
                    _ => true,
                }
            })
            .collect();

        info!(file_count = files.len(), "starting analysis");

        let (successfully_parsed, errors) = self.parse_and_store(project_id, &files, request.thread_count)?;

        session.add_progress(
            successfully_parsed.len() as u64,
            successfully_parsed.iter().map(|p| p.functions.len() as u64).sum(),
        );
        for err in &errors {
            session.errors.push(err.clone());
        }

        if request.incremental {
            for parsed in &successfully_parsed {
                let mtime = file_mtime_secs(Path::new(&parsed.file_info.path)).unwrap_or(0);
                cache.0.insert(parsed.file_info.path.clone(), mtime);
            }
            save_cache(&cache_path, &cache)?;
        }

        let project_dependencies = DependencyAnalyzer::analyze_project(self.graph.as_ref(), project_id).await?;

        let partial_embeddings = if request.generate_embeddings {
            self.embed_parsed_files(&successfully_parsed, project_id, &request.base_collection)
                .await
        } else {
            false
        };

        let graph_counts = self.graph.node_counts(project_id).await?;

        if !files.is_empty() && successfully_parsed.is_empty() {
            session.mark_failed("all files failed to parse");
        } else {
            session.mark_completed();
        }

        let (report_json_path, report_markdown_path) =
            write_reports(&request.output_dir, &session, &graph_counts, &project_dependencies)?;

        Ok(Stats {
            session,
            graph_counts,
            circular_dependencies: project_dependencies.circular_dependencies,
            modularity_score: project_dependencies.modularity_score,
            partial_embeddings,
            report_json_path: Some(report_json_path.to_string_lossy().to_string()),
            report_markdown_path: Some(report_markdown_path.to_string_lossy().to_string()),
        })
    }

    /// Parses every file on a rayon worker pool sized `thread_count`
    /// and stores each successfully-parsed file as soon as it's ready,
    /// bridging each worker's store write back into the async runtime
    /// via `Handle::block_on`.
    fn parse_and_store(
        &self,
        project_id: &ProjectId,
        files: &[PathBuf],
        thread_count: usize,
    ) -> Result<(Vec<ParsedCode>, Vec<String>)> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count.max(1))
            .build()
            .map_err(|e| CodeGraphError::Configuration(format!("building analysis worker pool: {e}")))?;

        let handle = tokio::runtime::Handle::current();
        let parsed = Mutex::new(Vec::new());
        let errors = Mutex::new(Vec::new());
        let parsed_count = AtomicU64::new(0);

        pool.install(|| {
            files.par_iter().for_each(|path| {
                let parser = CParser::new();
                let path_str = path.to_string_lossy().to_string();

                match parser.parse_file_sync(&path_str) {
                    Ok(code) => {
                        let store = self.graph.clone();
                        let pid = project_id.clone();
                        let to_store = code.clone();
                        let store_result =
                            handle.block_on(async move { store.store_parsed_code(&pid, &to_store).await });

                        match store_result {
                            Ok(()) => {
                                info!(file = %path_str, functions = code.functions.len(), "parsed and stored file");
                                parsed_count.fetch_add(1, Ordering::Relaxed);
                                parsed.lock().unwrap().push(code);
                            }
                            Err(e) => {
                                warn!(file = %path_str, error = %e, "failed to store parsed file");
                                errors.lock().unwrap().push(format!("{path_str}: {e}"));
                            }
                        }
                    }
                    Err(e) => {
                        warn!(file = %path_str, error = %e, "failed to parse file");
                        errors.lock().unwrap().push(format!("{path_str}: {e}"));
                    }
                }
            });
        });

        Ok((parsed.into_inner().unwrap(), errors.into_inner().unwrap()))
    }

    /// Chunks every parsed file (semantic-first, token-fallback) and
    /// embeds the result. Returns `true` when embedding was skipped or
    /// only partially completed (the `partial_embeddings` flag from
    /// `Stats`), per the decision that a failed pass never blocks the
    /// rest of `analyze` and is never auto-resumed.
    async fn embed_parsed_files(
        &self,
        parsed_files: &[ParsedCode],
        project_id: &ProjectId,
        base_collection: &str,
    ) -> bool {
        let Some(embedder) = &self.embedder else {
            return true;
        };

        let chunker = CChunker::new();
        let mut chunks = Vec::new();
        for parsed in parsed_files {
            match std::fs::read_to_string(&parsed.file_info.path) {
                Ok(content) => match chunker.chunk_file(&parsed.file_info.path, &content) {
                    Ok(file_chunks) => chunks.extend(file_chunks),
                    Err(e) => warn!(file = %parsed.file_info.path, error = %e, "chunking failed"),
                },
                Err(e) => warn!(file = %parsed.file_info.path, error = %e, "re-reading file for chunking failed"),
            }
        }

        let collection = format!("{project_id}_{base_collection}");
        match embedder.embed_chunks(&chunks, &collection).await {
            Ok(completed) => !completed,
            Err(e) => {
                warn!(error = %e, "embedding pass failed");
                true
            }
        }
    }
}

fn file_mtime_secs(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()?
        .modified()
        .ok()?
        .duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

fn load_cache(path: &Path) -> ProcessedFilesCache {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn save_cache(path: &Path, cache: &ProcessedFilesCache) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(CodeGraphError::Io)?;
    }
    let json = serde_json::to_string_pretty(&cache.0)?;
    std::fs::write(path, json).map_err(CodeGraphError::Io)?;
    Ok(())
}

fn write_reports(
    output_dir: &Path,
    session: &AnalysisSession,
    counts: &GraphCounts,
    deps: &ProjectDependencies,
) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(output_dir).map_err(CodeGraphError::Io)?;

    let json_path = output_dir.join(REPORT_JSON_NAME);
    let report = serde_json::json!({
        "session": session,
        "graph_counts": counts,
        "circular_dependencies": deps.circular_dependencies,
        "modularity_score": deps.modularity_score,
    });
    std::fs::write(&json_path, serde_json::to_string_pretty(&report)?).map_err(CodeGraphError::Io)?;

    let md_path = output_dir.join(REPORT_MARKDOWN_NAME);
    let mut md = String::new();
    md.push_str(&format!("# Analysis report: {}\n\n", session.project_path));
    md.push_str(&format!("- Status: {:?}\n", session.status));
    md.push_str(&format!("- Files processed: {}\n", session.files_processed));
    md.push_str(&format!("- Functions found: {}\n", session.functions_found));
    md.push_str(&format!("- Files: {}\n", counts.files));
    md.push_str(&format!("- Functions: {}\n", counts.functions));
    md.push_str(&format!("- Modules: {}\n", counts.modules));
    md.push_str(&format!("- Calls: {}\n", counts.calls));
    md.push_str(&format!("- Modularity score: {:.3}\n", deps.modularity_score));
    md.push_str(&format!("- Circular dependencies: {}\n", deps.circular_dependencies.len()));

    if !deps.circular_dependencies.is_empty() {
        md.push_str("\n## Circular dependencies (first 5)\n\n");
        for cycle in deps.circular_dependencies.iter().take(5) {
            md.push_str(&format!("- {}\n", cycle.join(" -> ")));
        }
    }

    if !session.errors.is_empty() {
        md.push_str("\n## Errors\n\n");
        for err in &session.errors {
            md.push_str(&format!("- {err}\n"));
        }
    }

    std::fs::write(&md_path, md).map_err(CodeGraphError::Io)?;
    Ok((json_path, md_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codegraph_core::{CallGraphData, CodeChunk, FileDependency, ModuleDependency, SimilarityResult};
    use tempfile::tempdir;

    struct NullVectorStore;

    #[async_trait]
    impl VectorStore for NullVectorStore {
        async fn create_collection(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn add_embeddings(&self, _: &str, _: &[CodeChunk], _: &[Vec<f32>]) -> Result<()> {
            Ok(())
        }
        async fn query(&self, _: &str, _: &[f32], _: usize) -> Result<Vec<SimilarityResult>> {
            Ok(Vec::new())
        }
        async fn list_collections(&self, _: &ProjectId) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn cleanup_project(&self, _: &ProjectId) -> Result<()> {
            Ok(())
        }
        async fn delete_project(&self, _: &ProjectId) -> Result<()> {
            Ok(())
        }
    }

    struct InMemoryGraph {
        files: Mutex<u64>,
        functions: Mutex<u64>,
    }

    impl InMemoryGraph {
        fn new() -> Self {
            Self { files: Mutex::new(0), functions: Mutex::new(0) }
        }
    }

    #[async_trait]
    impl GraphStore for InMemoryGraph {
        async fn init_schema(&self) -> Result<()> {
            Ok(())
        }
        async fn store_parsed_code(&self, _: &ProjectId, code: &ParsedCode) -> Result<()> {
            *self.files.lock().unwrap() += 1;
            *self.functions.lock().unwrap() += code.functions.len() as u64;
            Ok(())
        }
        async fn function_code(&self, _: &ProjectId, _: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn function_callers(&self, _: &ProjectId, _: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn function_callees(&self, _: &ProjectId, _: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn build_call_graph(&self, _: &ProjectId, root: &str, depth: u32) -> Result<CallGraphData> {
            Ok(CallGraphData::empty(root, depth))
        }
        async fn store_file_dependencies(&self, _: &ProjectId, _: &[FileDependency]) -> Result<()> {
            Ok(())
        }
        async fn store_module_dependencies(&self, _: &ProjectId, _: &[ModuleDependency]) -> Result<()> {
            Ok(())
        }
        async fn file_dependencies(&self, _: &ProjectId) -> Result<Vec<FileDependency>> {
            Ok(Vec::new())
        }
        async fn module_dependencies(&self, _: &ProjectId) -> Result<Vec<ModuleDependency>> {
            Ok(Vec::new())
        }
        async fn node_counts(&self, _: &ProjectId) -> Result<GraphCounts> {
            Ok(GraphCounts {
                files: *self.files.lock().unwrap(),
                functions: *self.functions.lock().unwrap(),
                modules: 0,
                calls: 0,
                file_dependencies: 0,
                module_dependencies: 0,
            })
        }
        async fn clear_project(&self, _: &ProjectId) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn analyze_parses_files_and_writes_reports() {
        let project_dir = tempdir().unwrap();
        let output_dir = tempdir().unwrap();

        std::fs::write(
            project_dir.path().join("main.c"),
            "int helper(void);\n\nint main(void) {\n    return helper();\n}\n",
        )
        .unwrap();
        std::fs::write(
            project_dir.path().join("helper.c"),
            "int helper(void) {\n    return 42;\n}\n",
        )
        .unwrap();

        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraph::new());
        let vector_stub: Arc<dyn VectorStore> = Arc::new(NullVectorStore);
        let orchestrator = AnalysisOrchestrator::new(graph, vector_stub, None);

        let request = AnalyzeRequest {
            project_root: project_dir.path().to_path_buf(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            thread_count: 2,
            incremental: false,
            generate_embeddings: false,
            output_dir: output_dir.path().to_path_buf(),
            base_collection: "code".to_string(),
        };

        let stats = orchestrator.analyze(&"p1".to_string(), &request).await.unwrap();

        assert_eq!(stats.session.files_processed, 2);
        assert!(stats.session.functions_found >= 2);
        assert!(output_dir.path().join(REPORT_JSON_NAME).exists());
        assert!(output_dir.path().join(REPORT_MARKDOWN_NAME).exists());
    }
}
