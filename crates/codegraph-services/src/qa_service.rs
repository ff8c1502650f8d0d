//! Retrieval-augmented question answering: assembles
//! context from a focus function, a focus file, and the top vector
//! matches for the question, then hands it to the chat model.

use codegraph_core::{ChatBot, EmbeddingEngine, GraphStore, ProjectId, QueryResult, Result, SourceRef, VectorStore};

const NO_CONTEXT_SENTINEL: &str = "no context found; please provide more information";
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an assistant answering questions about a C codebase using only the provided context.";
const VECTOR_TOP_K: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub project_path: Option<String>,
    pub focus_function: Option<String>,
    pub focus_file: Option<String>,
}

pub struct QaService<'a> {
    graph: &'a dyn GraphStore,
    vector: &'a dyn VectorStore,
    embedder: &'a dyn EmbeddingEngine,
    chatbot: &'a dyn ChatBot,
    system_prompt: String,
}

impl<'a> QaService<'a> {
    pub fn new(
        graph: &'a dyn GraphStore,
        vector: &'a dyn VectorStore,
        embedder: &'a dyn EmbeddingEngine,
        chatbot: &'a dyn ChatBot,
    ) -> Self {
        Self {
            graph,
            vector,
            embedder,
            chatbot,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Convenience wrapper returning only the prose answer.
    pub async fn ask(
        &self,
        project_id: &ProjectId,
        collection: &str,
        question: &str,
        options: &AskOptions,
    ) -> Result<String> {
        Ok(self
            .ask_structured(project_id, collection, question, options)
            .await?
            .answer)
    }

    pub async fn ask_structured(
        &self,
        project_id: &ProjectId,
        collection: &str,
        question: &str,
        options: &AskOptions,
    ) -> Result<QueryResult> {
        let mut sections = Vec::new();
        let mut sources = Vec::new();
        let mut contributed = false;

        if let Some(func) = &options.focus_function {
            if let Some(code) = self.graph.function_code(project_id, func).await? {
                let callers = self.graph.function_callers(project_id, func).await?;
                let callees = self.graph.function_callees(project_id, func).await?;
                sections.push(format!(
                    "Function `{func}`:\n{code}\n\nCallers: {}\nCallees: {}",
                    join_or_none(&callers),
                    join_or_none(&callees)
                ));
                sources.push(SourceRef::Function {
                    name: func.clone(),
                    file_path: String::new(),
                });
                contributed = true;
            }
        }

        if let Some(file) = &options.focus_file {
            if let Ok(content) = std::fs::read_to_string(file) {
                sections.push(format!("File `{file}`:\n{content}"));
                sources.push(SourceRef::File { path: file.clone() });
                contributed = true;
            }
        }

        let question_vectors = self.embedder.embed_batch(&[question.to_string()]).await?;
        if let Some(vector) = question_vectors.into_iter().next() {
            let hits = self.vector.query(collection, &vector, VECTOR_TOP_K).await?;
            if !hits.is_empty() {
                contributed = true;
                let mut section = String::from("Related code:\n");
                for hit in &hits {
                    let label = match &hit.metadata.function_name {
                        Some(name) => format!(
                            "{}:{}-{} ({name})",
                            hit.metadata.file_path, hit.metadata.start_line, hit.metadata.end_line
                        ),
                        None => format!(
                            "{}:{}-{}",
                            hit.metadata.file_path, hit.metadata.start_line, hit.metadata.end_line
                        ),
                    };
                    section.push_str(&format!(
                        "\n[{label}, similarity={:.3}]\n{}\n",
                        hit.similarity, hit.document
                    ));
                    sources.push(SourceRef::VectorHit {
                        file_path: hit.metadata.file_path.clone(),
                        start_line: hit.metadata.start_line,
                        end_line: hit.metadata.end_line,
                        similarity: hit.similarity,
                    });
                }
                sections.push(section);
            }
        }

        if let Some(path) = &options.project_path {
            sections.push(format!("Project: {path}"));
        }

        if !contributed {
            sections.push(NO_CONTEXT_SENTINEL.to_string());
        }

        let context = sections.join("\n\n");
        let response = self
            .chatbot
            .ask(&self.system_prompt, &context, question)
            .await?;

        let confidence = if contributed { 1.0 } else { 0.3 };
        QueryResult::new(question.to_string(), response.content, confidence, sources, sections)
    }
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codegraph_core::{
        CallGraphData, ChatResponse, CodeChunk, FileDependency, GraphCounts, ModuleDependency,
        ParsedCode, SimilarityResult,
    };

    struct FakeGraph {
        function_code: Option<String>,
    }

    #[async_trait]
    impl GraphStore for FakeGraph {
        async fn init_schema(&self) -> Result<()> {
            Ok(())
        }
        async fn store_parsed_code(&self, _: &ProjectId, _: &ParsedCode) -> Result<()> {
            Ok(())
        }
        async fn function_code(&self, _: &ProjectId, _: &str) -> Result<Option<String>> {
            Ok(self.function_code.clone())
        }
        async fn function_callers(&self, _: &ProjectId, _: &str) -> Result<Vec<String>> {
            Ok(vec!["main".to_string()])
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
            Ok(GraphCounts::default())
        }
        async fn clear_project(&self, _: &ProjectId) -> Result<()> {
            Ok(())
        }
    }

    struct FakeVector {
        hits: Vec<SimilarityResult>,
    }

    #[async_trait]
    impl VectorStore for FakeVector {
        async fn create_collection(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn add_embeddings(&self, _: &str, _: &[CodeChunk], _: &[Vec<f32>]) -> Result<()> {
            Ok(())
        }
        async fn query(&self, _: &str, _: &[f32], _: usize) -> Result<Vec<SimilarityResult>> {
            Ok(self.hits.clone())
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

    struct FakeEmbedder;

    #[async_trait]
    impl EmbeddingEngine for FakeEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2]).collect())
        }
        fn dimension(&self) -> usize {
            2
        }
    }

    struct FakeChat;

    #[async_trait]
    impl ChatBot for FakeChat {
        async fn ask(&self, _: &str, _: &str, question: &str) -> Result<ChatResponse> {
            Ok(ChatResponse {
                content: format!("answer to: {question}"),
                model: "fake".to_string(),
                prompt_tokens: 1,
                completion_tokens: 1,
            })
        }
    }

    #[tokio::test]
    async fn focus_function_contributes_full_confidence() {
        let graph = FakeGraph { function_code: Some("int main() {}".to_string()) };
        let vector = FakeVector { hits: Vec::new() };
        let embedder = FakeEmbedder;
        let chat = FakeChat;
        let service = QaService::new(&graph, &vector, &embedder, &chat);

        let options = AskOptions {
            focus_function: Some("main".to_string()),
            ..Default::default()
        };
        let result = service
            .ask_structured(&"p1".to_string(), "p1_code", "what does main do?", &options)
            .await
            .unwrap();

        assert_eq!(result.confidence, 1.0);
        assert!(result.context.iter().any(|s| s.contains("Function `main`")));
    }

    #[tokio::test]
    async fn no_context_falls_back_to_sentinel_with_low_confidence() {
        let graph = FakeGraph { function_code: None };
        let vector = FakeVector { hits: Vec::new() };
        let embedder = FakeEmbedder;
        let chat = FakeChat;
        let service = QaService::new(&graph, &vector, &embedder, &chat);

        let result = service
            .ask_structured(&"p1".to_string(), "p1_code", "what is this?", &AskOptions::default())
            .await
            .unwrap();

        assert_eq!(result.confidence, 0.3);
        assert!(result.context.iter().any(|s| s == NO_CONTEXT_SENTINEL));
    }
}
