use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use localrag_answer::{evaluate, AnswerRequest, EvalCase, Orchestrator, Reranker};
use localrag_core::chunker::{chunker_for, load_directory};
use localrag_core::config::{ChunkerKind, Config, Settings};
use localrag_core::error::Error;
use localrag_core::progress::PipelineEvent;
use localrag_core::traits::DocumentStore;
use localrag_core::types::Effort;
use localrag_hybrid::{GraphExpander, Ingestor};
use localrag_memory::MemoryGraph;
use localrag_remote::{CohereJudge, OpenAiGenerator};
use localrag_text::TantivyLexicalIndex;
use localrag_vector::LanceStore;

use crate::output::{render_answer, render_candidates, render_document, render_documents, sse_frame};
use crate::stack::{build_embedder, DataPaths, Stack};

#[derive(Debug, Parser)]
#[command(name = "localrag", version, about = "Hybrid retrieval and grounded answers over a local corpus")]
pub struct Cli {
    /// Configuration file; `config.<env>.toml` next to it is merged on top.
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// Repeat for more log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chunk, embed and index a directory of .txt/.md files.
    Ingest(IngestArgs),
    /// Hybrid retrieval without generation.
    Search(SearchArgs),
    /// Hybrid retrieval extended by one hop through the passage graph.
    Expand(ExpandArgs),
    /// Answer a question from retrieved passages.
    Ask(AskArgs),
    /// Answer every question of a JSON dataset and report accuracy.
    Eval(EvalArgs),
    /// List, show or delete ingested documents.
    #[command(subcommand)]
    Documents(DocumentsCommand),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Corpus directory; defaults to `data.corpus_dir`.
    pub dir: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub chunker: Option<ChunkerArg>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ChunkerArg {
    Sentence,
    Markdown,
    Paragraph,
}

impl From<ChunkerArg> for ChunkerKind {
    fn from(arg: ChunkerArg) -> Self {
        match arg {
            ChunkerArg::Sentence => Self::Sentence,
            ChunkerArg::Markdown => Self::Markdown,
            ChunkerArg::Paragraph => Self::Paragraph,
        }
    }
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    pub query: String,
    #[arg(long)]
    pub top_k: Option<usize>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ExpandArgs {
    pub query: String,
    #[arg(long)]
    pub node_limit: Option<usize>,
    #[arg(long)]
    pub hop_chunk_limit: Option<usize>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct AskArgs {
    pub question: String,
    #[arg(long)]
    pub top_k: Option<usize>,
    /// Rerank the final candidates (needs the reranker API key).
    #[arg(long)]
    pub rerank: bool,
    #[arg(long)]
    pub model: Option<String>,
    /// minimal | medium | high (also: brief, thorough)
    #[arg(long)]
    pub effort: Option<String>,
    #[arg(long)]
    pub min_sources: Option<usize>,
    #[arg(long)]
    pub min_avg_score: Option<f32>,
    #[arg(long)]
    pub max_iterations: Option<usize>,
    /// Stream progress as server-sent-event frames on stdout.
    #[arg(long)]
    pub events: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct EvalArgs {
    /// JSON array of `{"question": ..., "expected": ...}` rows.
    pub dataset: PathBuf,
    #[arg(long)]
    pub top_k: Option<usize>,
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum DocumentsCommand {
    /// Every document with its passage count.
    List {
        #[arg(long)]
        json: bool,
    },
    /// One document and its passages in order.
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Remove a document from both indexes and the graph.
    Delete { id: String },
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = Config::load_from(&cli.config)?.settings()?;
    let base = config_base(&cli.config);
    match cli.command {
        Command::Ingest(args) => ingest(settings, &base, args).await,
        Command::Search(args) => search(settings, &base, args).await,
        Command::Expand(args) => expand(settings, &base, args).await,
        Command::Ask(args) => ask(settings, &base, args).await,
        Command::Eval(args) => eval(settings, &base, args).await,
        Command::Documents(action) => documents(settings, &base, action).await,
    }
}

fn config_base(config: &Path) -> PathBuf {
    match config.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn ingest(mut settings: Settings, base: &Path, args: IngestArgs) -> Result<()> {
    if let Some(kind) = args.chunker {
        settings.ingest.chunker = kind.into();
    }
    let paths = DataPaths::resolve(&settings, base);
    let corpus = args.dir.unwrap_or_else(|| paths.corpus_dir.clone());
    if !corpus.is_dir() {
        return Err(Error::InvalidInput(format!("corpus directory {} does not exist", corpus.display())).into());
    }

    let chunker = chunker_for(settings.ingest.chunker);
    let passages = load_directory(&corpus, chunker.as_ref())?;
    tracing::info!(corpus = %corpus.display(), passages = passages.len(), "corpus chunked");
    if passages.is_empty() {
        println!("No .txt or .md passages found under {}", corpus.display());
        return Ok(());
    }

    if paths.lancedb_dir.exists() {
        std::fs::remove_dir_all(&paths.lancedb_dir)?;
    }
    std::fs::create_dir_all(&paths.lancedb_dir)?;
    let lance = Arc::new(LanceStore::open(&paths.lancedb_dir, &settings.data.table).await?);
    let lexical = Arc::new(TantivyLexicalIndex::create(&paths.tantivy_dir)?);
    let embedder = build_embedder(&settings)?;

    let total = passages.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages ({percent}%)")?
            .progress_chars("#>-"),
    );
    let ingestor = Ingestor::new(embedder, settings.ingest.batch_size)
        .with_sink(lance)
        .with_sink(lexical)
        .with_timeouts(settings.timeouts.clone());
    let report = ingestor.ingest(passages, |done| pb.set_position(done as u64)).await?;
    pb.finish_and_clear();

    println!(
        "Indexed {} passages in {} batches into {} and {}",
        report.passages,
        report.batches,
        paths.lancedb_dir.display(),
        paths.tantivy_dir.display()
    );
    Ok(())
}

async fn search(settings: Settings, base: &Path, args: SearchArgs) -> Result<()> {
    let top_k = args.top_k.unwrap_or(settings.retrieval.top_k);
    let stack = Stack::open(settings, base).await?;
    let results = stack.retriever()?.retrieve(&args.query, top_k).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", render_candidates(&results));
    }
    Ok(())
}

async fn expand(settings: Settings, base: &Path, args: ExpandArgs) -> Result<()> {
    let node_limit = args.node_limit.unwrap_or(settings.graph.node_limit);
    let hop_chunk_limit = args.hop_chunk_limit.unwrap_or(settings.graph.hop_chunk_limit);
    let stack = Stack::open(settings, base).await?;
    let retriever = stack.retriever()?;
    let graph = stack.graph()?;
    let results = GraphExpander::new(&retriever, &graph, stack.lance.as_ref())
        .expand(&args.query, node_limit, hop_chunk_limit)
        .await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", render_candidates(&results));
    }
    Ok(())
}

async fn ask(settings: Settings, base: &Path, args: AskArgs) -> Result<()> {
    let mut request = AnswerRequest::from_settings(args.question.clone(), &settings);
    if let Some(k) = args.top_k {
        request.top_k = k;
    }
    request.rerank |= args.rerank;
    if let Some(model) = args.model {
        request.model = model;
    }
    if let Some(effort) = args.effort.as_deref() {
        request.effort = effort.parse::<Effort>()?;
    }
    if let Some(n) = args.min_sources {
        request.gate.min_sources = n;
    }
    if let Some(score) = args.min_avg_score {
        request.gate.min_avg_score = score;
    }
    if let Some(n) = args.max_iterations {
        request.gate.max_iterations = n;
    }

    let generator = OpenAiGenerator::from_settings(&settings.generator)
        .map_err(|e| Error::InvalidConfig(format!("generator: {e:#}")))?;
    let rerank_timeout = settings.timeouts.rerank();
    let judge = if request.rerank { CohereJudge::from_settings(&settings.reranker)? } else { None };

    let stack = Stack::open(settings, base).await?;
    let mut orchestrator = Orchestrator::new(Arc::new(stack.retriever()?), Arc::new(generator));
    if let Some(judge) = judge {
        orchestrator = orchestrator.with_reranker(Reranker::new(Arc::new(judge), rerank_timeout));
    }

    if args.events {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<PipelineEvent>();
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match sse_frame(&event) {
                    Ok(frame) => print!("{frame}"),
                    Err(e) => tracing::warn!(error = %e, "could not encode progress event"),
                }
            }
        });
        let result = orchestrator.answer_with_progress(&request, &tx).await;
        drop(tx);
        printer.await?;
        result?;
        return Ok(());
    }

    let outcome = orchestrator.answer(&request).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", render_answer(&outcome));
    }
    Ok(())
}

async fn eval(settings: Settings, base: &Path, args: EvalArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.dataset)
        .map_err(|e| Error::InvalidInput(format!("cannot read {}: {e}", args.dataset.display())))?;
    let cases: Vec<EvalCase> = serde_json::from_str(&raw)
        .map_err(|e| Error::InvalidInput(format!("{} is not a QA dataset: {e}", args.dataset.display())))?;

    let mut template = AnswerRequest::from_settings(String::new(), &settings);
    template.rerank = false;
    if let Some(k) = args.top_k {
        template.top_k = k;
    }
    if let Some(model) = args.model {
        template.model = model;
    }
    let generator = OpenAiGenerator::from_settings(&settings.generator)
        .map_err(|e| Error::InvalidConfig(format!("generator: {e:#}")))?;
    let stack = Stack::open(settings, base).await?;
    let orchestrator = Orchestrator::new(Arc::new(stack.retriever()?), Arc::new(generator));

    let report = evaluate(&orchestrator, &cases, &template).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn documents(settings: Settings, base: &Path, action: DocumentsCommand) -> Result<()> {
    let paths = DataPaths::resolve(&settings, base);
    let lance = LanceStore::open(&paths.lancedb_dir, &settings.data.table).await?;
    match action {
        DocumentsCommand::List { json } => {
            let docs = lance.documents().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&docs)?);
            } else {
                print!("{}", render_documents(&docs));
            }
        }
        DocumentsCommand::Show { id, json } => {
            let passages = lance.document_passages(&id).await?;
            if passages.is_empty() {
                return Err(Error::InvalidInput(format!("no document '{id}'")).into());
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&passages)?);
            } else {
                print!("{}", render_document(&id, &passages));
            }
        }
        DocumentsCommand::Delete { id } => {
            let passage_ids: Vec<String> = lance.document_passages(&id).await?.into_iter().map(|p| p.id).collect();
            if passage_ids.is_empty() {
                return Err(Error::InvalidInput(format!("no document '{id}'")).into());
            }
            let removed = lance.delete_document(&id).await?;
            if paths.tantivy_dir.join("meta.json").exists() {
                TantivyLexicalIndex::open(&paths.tantivy_dir)?.delete_document(&id).await?;
            }
            if paths.graph_file.exists() {
                let mut graph = MemoryGraph::load(&paths.graph_file)?;
                for passage_id in &passage_ids {
                    graph.remove_passage(passage_id);
                }
                graph.save(&paths.graph_file)?;
            }
            println!("Deleted {id} ({removed} passages)");
        }
    }
    Ok(())
}
