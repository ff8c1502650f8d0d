//! Orchestration layer built on top of `codegraph-core`'s storage and
//! model traits: whole-project analysis, dependency aggregation,
//! call/dependency graph rendering, and retrieval-augmented QA.

pub mod call_graph_service;
pub mod dependency_analyzer;
pub mod dependency_service;
pub mod orchestrator;
pub mod qa_service;

pub use call_graph_service::{CallGraphFormat, CallGraphService};
pub use dependency_analyzer::DependencyAnalyzer;
pub use dependency_service::{DependencyFormat, DependencyScope, DependencyService};
pub use orchestrator::{AnalysisOrchestrator, AnalyzeRequest};
pub use qa_service::{AskOptions, QaService};
