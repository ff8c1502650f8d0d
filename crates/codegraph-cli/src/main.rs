mod registry;

use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use codegraph_core::{
    CodeGraphError, EmbeddingEngine, GraphStore, ProjectId, Settings, VectorStore,
};
use codegraph_graph::SurrealGraphStore;
use codegraph_services::{
    AnalysisOrchestrator, AnalyzeRequest, AskOptions, CallGraphFormat, CallGraphService,
    DependencyFormat, DependencyScope, DependencyService, QaService,
};
use codegraph_vector::{Embedder, OllamaEmbeddingEngine, QdrantVectorStore};
use colored::Colorize;

use registry::{registry_dir, ProjectEntry, ProjectRegistry};

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(about = "Analyze a C codebase into a graph + vector knowledge base and query it", long_about = None)]
#[command(version)]
struct Cli {
    /// Print stack-trace-level detail on failure.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a project's C sources into the graph/vector store.
    Analyze {
        /// Root directory of the C project to analyze.
        path: PathBuf,

        /// Name to register the project under (defaults to the directory name).
        #[arg(long)]
        name: Option<String>,

        /// Extra glob patterns to include (beyond `*.c`/`*.h`).
        #[arg(long = "include", value_delimiter = ',')]
        include_globs: Vec<String>,

        /// Glob patterns to exclude.
        #[arg(long = "exclude", value_delimiter = ',')]
        exclude_globs: Vec<String>,

        /// Worker thread count for the parsing pool.
        #[arg(long)]
        threads: Option<usize>,

        /// Only re-parse files whose mtime changed since the last run.
        #[arg(long)]
        incremental: bool,

        /// Directory to write processed-file cache and analysis reports into.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Skip the embedding pass even if a vector store is configured.
        #[arg(long)]
        no_embeddings: bool,
    },

    /// Ask a question against an analyzed project, one-shot or interactive.
    Query {
        /// Registered project name or id.
        #[arg(long)]
        project: String,

        /// Focus the context on this function.
        #[arg(long)]
        function: Option<String>,

        /// Focus the context on this file.
        #[arg(long)]
        file: Option<String>,

        /// One-shot question; omit to start an interactive REPL.
        #[arg(long)]
        query: Option<String>,

        /// Append each question/answer pair to this JSONL file.
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Report graph/vector/service readiness.
    Status {
        /// Restrict the report to a single registered project.
        #[arg(long)]
        project: Option<String>,
    },

    /// Render a project's call graph or dependency graph to disk.
    Export {
        /// Registered project name or id.
        #[arg(long)]
        project: String,

        /// What to export.
        #[arg(long = "type", value_enum)]
        export_type: ExportType,

        /// Output encoding.
        #[arg(long, value_enum)]
        format: ExportFormat,

        /// Destination file path.
        #[arg(long)]
        output: PathBuf,

        /// Root function name for `--type calls`.
        #[arg(long)]
        root: Option<String>,

        /// Call-graph traversal depth for `--type calls`.
        #[arg(long, default_value_t = 3)]
        depth: u32,

        /// Narrow a dependency export to one file/module.
        #[arg(long)]
        focus: Option<String>,

        /// Dependency scope for `--type deps`.
        #[arg(long, value_enum, default_value = "file")]
        scope: ExportScope,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportType {
    Calls,
    Deps,
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Md,
    Html,
    Dot,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportScope {
    File,
    Module,
}

struct Services {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingEngine>,
    settings: Settings,
}

impl Services {
    async fn connect() -> Result<Self> {
        let settings = Settings::load(&Settings::default_config_dir())
            .context("loading configuration")?;

        let graph = SurrealGraphStore::connect(&settings.graph)
            .await
            .context("connecting to graph store")?;
        graph.init_schema().await.context("initializing graph schema")?;

        let vector = QdrantVectorStore::connect(&settings.vector).context("connecting to vector store")?;
        let embedder = OllamaEmbeddingEngine::new(settings.embedding.clone())
            .context("initializing embedding engine")?;

        Ok(Self {
            graph: Arc::new(graph),
            vector: Arc::new(vector),
            embedder: Arc::new(embedder),
            settings,
        })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    tokio::select! {
        result = run(cli.command, cli.verbose) => {
            match result {
                Ok(()) => std::process::exit(0),
                Err(e) => {
                    report_error(&e, cli.verbose);
                    std::process::exit(1);
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{}", "interrupted".yellow());
            std::process::exit(130);
        }
    }
}

fn report_error(e: &anyhow::Error, verbose: bool) {
    let category = e
        .downcast_ref::<CodeGraphError>()
        .map(category_label)
        .unwrap_or("error");
    eprintln!("{} {}", format!("[{category}]").red().bold(), e);
    if verbose {
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
        }
    }
}

fn category_label(e: &CodeGraphError) -> &'static str {
    match e {
        CodeGraphError::Io(_) => "io",
        CodeGraphError::Serialization(_) => "serialization",
        CodeGraphError::Parse(_) => "parse",
        CodeGraphError::StorageConnection(_) => "storage-connection",
        CodeGraphError::StorageOperation(_) => "storage-operation",
        CodeGraphError::ConstraintViolation(_) => "constraint-violation",
        CodeGraphError::ModelLoad(_) => "model-load",
        CodeGraphError::Embedding(_) => "embedding",
        CodeGraphError::ApiConnection(_) => "api-connection",
        CodeGraphError::ApiModel(_) => "api-model",
        CodeGraphError::Query(_) => "query",
        CodeGraphError::Validation(_) => "validation",
        CodeGraphError::Configuration(_) => "configuration",
        CodeGraphError::Service(_) => "service",
        CodeGraphError::NotFound(_) => "not-found",
    }
}

async fn run(command: Commands, verbose: bool) -> Result<()> {
    match command {
        Commands::Analyze {
            path,
            name,
            include_globs,
            exclude_globs,
            threads,
            incremental,
            output,
            no_embeddings,
        } => run_analyze(path, name, include_globs, exclude_globs, threads, incremental, output, no_embeddings).await,
        Commands::Query { project, function, file, query, history } => {
            run_query(project, function, file, query, history).await
        }
        Commands::Status { project } => run_status(project, verbose).await,
        Commands::Export { project, export_type, format, output, root, depth, focus, scope } => {
            run_export(project, export_type, format, output, root, depth, focus, scope).await
        }
    }
}

async fn run_analyze(
    path: PathBuf,
    name: Option<String>,
    include_globs: Vec<String>,
    exclude_globs: Vec<String>,
    threads: Option<usize>,
    incremental: bool,
    output: Option<PathBuf>,
    no_embeddings: bool,
) -> Result<()> {
    let project_root = path
        .canonicalize()
        .with_context(|| format!("resolving project path {}", path.display()))?;
    let project_name = name.unwrap_or_else(|| {
        project_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    });

    let mut registry = ProjectRegistry::load(&registry_dir())?;
    let entry = registry.register(&project_name, &project_root)?;
    registry.save(&registry_dir())?;

    let services = Services::connect().await?;

    let output_dir = output.unwrap_or_else(|| PathBuf::from(format!("data/{}_analysis", project_name)));
    let thread_count = threads.unwrap_or(services.settings.analysis.thread_count);

    let request = AnalyzeRequest {
        project_root,
        include_globs,
        exclude_globs,
        thread_count,
        incremental,
        generate_embeddings: !no_embeddings,
        output_dir,
        base_collection: services.settings.vector.base_collection.clone(),
    };

    let embedder = if no_embeddings {
        None
    } else {
        Some(Arc::new(Embedder::new(
            services.embedder.clone(),
            services.vector.clone(),
            services.settings.analysis.max_memory_percent,
            services.settings.analysis.embedding_batch_size,
        )))
    };

    let orchestrator = AnalysisOrchestrator::new(services.graph.clone(), services.vector.clone(), embedder);
    let stats = orchestrator.analyze(&entry.id, &request).await?;

    println!("{} {}", "analyzed".green().bold(), entry.name);
    println!("  files processed:   {}", stats.session.files_processed);
    println!("  functions found:   {}", stats.session.functions_found);
    println!("  modularity score:  {:.3}", stats.modularity_score);
    println!("  circular deps:     {}", stats.circular_dependencies.len());
    if stats.partial_embeddings {
        println!("  {}", "embedding pass did not complete fully".yellow());
    }
    if let Some(p) = &stats.report_json_path {
        println!("  report (json):     {p}");
    }
    if let Some(p) = &stats.report_markdown_path {
        println!("  report (markdown): {p}");
    }
    if !stats.session.errors.is_empty() {
        println!("  {} {} file(s) failed to parse", "warning:".yellow(), stats.session.errors.len());
    }

    Ok(())
}

fn resolve_project(registry: &ProjectRegistry, name_or_id: &str) -> Result<ProjectEntry> {
    registry
        .find(name_or_id)
        .cloned()
        .ok_or_else(|| anyhow!(CodeGraphError::NotFound(format!("no registered project named or keyed '{name_or_id}'"))))
}

async fn run_query(
    project: String,
    function: Option<String>,
    file: Option<String>,
    query: Option<String>,
    history: Option<PathBuf>,
) -> Result<()> {
    let registry = ProjectRegistry::load(&registry_dir())?;
    let entry = resolve_project(&registry, &project)?;

    let services = Services::connect().await?;
    let collection = QdrantVectorStore::collection_name(&entry.id, &services.settings.vector.base_collection);
    let chatbot = codegraph_ai::HttpChatBot::new(services.settings.llm.clone())?;

    let qa = QaService::new(
        services.graph.as_ref(),
        services.vector.as_ref(),
        services.embedder.as_ref(),
        &chatbot,
    );

    let options = AskOptions {
        project_path: Some(entry.path.clone()),
        focus_function: function,
        focus_file: file,
    };

    if let Some(question) = query {
        ask_one(&qa, &entry.id, &collection, &question, &options, history.as_deref()).await
    } else {
        run_interactive(&qa, &entry.id, &collection, &options, history.as_deref()).await
    }
}

async fn ask_one(
    qa: &QaService<'_>,
    project_id: &ProjectId,
    collection: &str,
    question: &str,
    options: &AskOptions,
    history: Option<&std::path::Path>,
) -> Result<()> {
    let result = qa.ask_structured(project_id, collection, question, options).await?;
    println!("{}", result.answer);
    println!("{} {:.2}", "confidence:".dimmed(), result.confidence);
    if let Some(path) = history {
        append_history(path, &result)?;
    }
    Ok(())
}

async fn run_interactive(
    qa: &QaService<'_>,
    project_id: &ProjectId,
    collection: &str,
    options: &AskOptions,
    history: Option<&std::path::Path>,
) -> Result<()> {
    println!("{}", "interactive query mode, type 'exit' or Ctrl-D to quit".dimmed());
    let stdin = io::stdin();
    loop {
        print!("{} ", ">".cyan().bold());
        io::stdout().flush().ok();

        let mut line = String::new();
        let bytes_read = stdin.lock().read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        match qa.ask_structured(project_id, collection, question, options).await {
            Ok(result) => {
                println!("{}", result.answer);
                println!("{} {:.2}", "confidence:".dimmed(), result.confidence);
                if let Some(path) = history {
                    if let Err(e) = append_history(path, &result) {
                        eprintln!("{} {}", "warning:".yellow(), e);
                    }
                }
            }
            Err(e) => eprintln!("{} {}", "error:".red(), e),
        }
    }
    Ok(())
}

fn append_history(path: &std::path::Path, result: &codegraph_core::QueryResult) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", serde_json::to_string(result)?)?;
    Ok(())
}

async fn run_status(project: Option<String>, verbose: bool) -> Result<()> {
    let registry = ProjectRegistry::load(&registry_dir())?;
    let services = Services::connect().await?;

    let llm_configured = services.settings.llm.api_key.is_some();
    println!("{}", "codegraph status".bold());
    println!("  graph:     {}", services.settings.graph.connection);
    println!("  vector:    {}", services.settings.vector.url);
    println!("  embedding: {} ({})", services.settings.embedding.model, services.settings.embedding.base_url);
    println!(
        "  llm:       {}",
        if llm_configured { "configured".green().to_string() } else { "not configured".red().to_string() }
    );

    let entries: Vec<ProjectEntry> = match project {
        Some(name_or_id) => vec![resolve_project(&registry, &name_or_id)?],
        None => registry.projects.clone(),
    };

    if entries.is_empty() {
        println!("  {}", "no projects registered yet".dimmed());
        return Ok(());
    }

    for entry in &entries {
        let counts = services.graph.node_counts(&entry.id).await?;
        let collections = services.vector.list_collections(&entry.id).await.unwrap_or_default();
        println!("\n{} ({})", entry.name.cyan().bold(), entry.id);
        println!("  files:     {}", counts.files);
        println!("  functions: {}", counts.functions);
        println!("  modules:   {}", counts.modules);
        println!("  calls:     {}", counts.calls);
        println!("  vector collections: {}", collections.len());
        if verbose {
            println!("  path:       {}", entry.path);
            println!("  updated at: {}", entry.updated_at);
            println!("  file deps:   {}", counts.file_dependencies);
            println!("  module deps: {}", counts.module_dependencies);
            for c in &collections {
                println!("    - {c}");
            }
        }
    }

    Ok(())
}

async fn run_export(
    project: String,
    export_type: ExportType,
    format: ExportFormat,
    output: PathBuf,
    root: Option<String>,
    depth: u32,
    focus: Option<String>,
    scope: ExportScope,
) -> Result<()> {
    let registry = ProjectRegistry::load(&registry_dir())?;
    let entry = resolve_project(&registry, &project)?;
    let services = Services::connect().await?;

    let dependency_scope = match scope {
        ExportScope::File => DependencyScope::File,
        ExportScope::Module => DependencyScope::Module,
    };

    let mut wrote = Vec::new();

    let wants_calls = matches!(export_type, ExportType::Calls | ExportType::All);
    let wants_deps = matches!(export_type, ExportType::Deps | ExportType::All);

    if wants_calls {
        let root = root
            .clone()
            .ok_or_else(|| anyhow!(CodeGraphError::Validation("--root is required for --type calls".into())))?;
        let call_format = call_graph_format(format)?;
        let service = CallGraphService::new(services.graph.as_ref());
        let rendered = service.render(&entry.id, &root, depth, call_format).await?;
        let path = export_path(&output, &export_type, "calls", extension_for(format));
        write_export(&path, &rendered)?;
        wrote.push(path);
    }

    if wants_deps {
        let dep_format = dependency_format(format)?;
        let service = DependencyService::new(services.graph.as_ref());
        let rendered = service
            .generate_dependency_graph(&entry.id, dep_format, dependency_scope, focus.as_deref())
            .await?;
        let path = export_path(&output, &export_type, "deps", extension_for(format));
        write_export(&path, &rendered)?;
        wrote.push(path);
    }

    for path in &wrote {
        println!("{} {}", "wrote".green().bold(), path.display());
    }

    Ok(())
}

fn export_path(base: &std::path::Path, export_type: &ExportType, suffix: &str, extension: &str) -> PathBuf {
    if matches!(export_type, ExportType::All) {
        let stem = base.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "export".to_string());
        let parent = base.parent().unwrap_or_else(|| std::path::Path::new("."));
        parent.join(format!("{stem}_{suffix}.{extension}"))
    } else {
        base.to_path_buf()
    }
}

fn write_export(path: &std::path::Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn extension_for(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::Json => "json",
        ExportFormat::Md => "md",
        ExportFormat::Html => "html",
        ExportFormat::Dot => "dot",
    }
}

/// `--format md` renders as an embedded Mermaid diagram, matching how
/// the analysis report already presents graphs inline.
fn call_graph_format(format: ExportFormat) -> Result<CallGraphFormat> {
    match format {
        ExportFormat::Json => Ok(CallGraphFormat::Json),
        ExportFormat::Html => Ok(CallGraphFormat::Html),
        ExportFormat::Md => Ok(CallGraphFormat::Mermaid),
        ExportFormat::Dot => Err(anyhow!(CodeGraphError::Validation(
            "dot format is not supported for call-graph export".into()
        ))),
    }
}

fn dependency_format(format: ExportFormat) -> Result<DependencyFormat> {
    match format {
        ExportFormat::Json => Ok(DependencyFormat::Json),
        ExportFormat::Dot => Ok(DependencyFormat::Dot),
        ExportFormat::Md => Ok(DependencyFormat::Mermaid),
        ExportFormat::Html => Err(anyhow!(CodeGraphError::Validation(
            "html format is not supported for dependency export".into()
        ))),
    }
}
