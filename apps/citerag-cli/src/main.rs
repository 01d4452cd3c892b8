//! citerag CLI
//!
//! - `chunk`: normalize and chunk a JSONL document export
//! - `index`: embed chunk records and upsert them into the vector store
//! - `query`: ranked retrieval
//! - `context`: ranked retrieval packed into a citation-grounded prompt
//! - `status`: vector collection health
//!
//! Settings come from `config.toml`, `config.<RUST_ENV>.toml` and `APP_*`
//! environment variables.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use citerag_core::chunker::{read_jsonl, ChunkRecord, Chunker, ChunkingConfig};
use citerag_core::config::{Config, Settings};
use citerag_core::task::IngestionTaskManager;
use citerag_core::telemetry::init_tracing;
use citerag_core::traits::{Embedder, VectorSearch};
use citerag_core::types::{Query, SearchFilter};
use citerag_embed::get_default_embedder;
use citerag_hybrid::{ContextBudgeter, PromptComposer, Retriever, NO_RESULTS_ANSWER};
use citerag_vector::{IngestPipeline, LanceVectorStore};

#[derive(Parser)]
#[command(name = "citerag", version, about = "Citation-grounded retrieval over local docs, code and chat exports")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a JSONL file of source documents into chunk records
    Chunk {
        input: PathBuf,
        output: PathBuf,
        /// Corpus origin tag stored on every chunk (swc_docs, github, slack, ...)
        #[arg(long, default_value = "swc_docs")]
        source: String,
    },
    /// Embed chunk records and upsert them into the vector store
    Index {
        /// Chunk JSONL files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        progress: bool,
    },
    /// Print ranked candidates as JSON
    Query(QueryArgs),
    /// Print the composed prompt and its citations
    Context {
        #[command(flatten)]
        query: QueryArgs,
        /// Emit JSON instead of the plain prompt
        #[arg(long)]
        json: bool,
    },
    /// Show vector collection info
    Status,
}

#[derive(Args)]
struct QueryArgs {
    text: String,
    #[arg(long)]
    top_k: Option<usize>,
    #[arg(long)]
    rerank_top_k: Option<usize>,
    #[arg(long)]
    score_threshold: Option<f32>,
    /// Only consider chunks from this source tag
    #[arg(long)]
    source: Option<String>,
    /// Keep the vector-stage order
    #[arg(long)]
    no_rerank: bool,
}

impl QueryArgs {
    fn to_query(&self, settings: &Settings) -> Query {
        let retrieval = &settings.retrieval;
        Query {
            text: self.text.clone(),
            top_k: self.top_k.unwrap_or(retrieval.top_k),
            rerank_top_k: self.rerank_top_k.or(retrieval.rerank_top_k),
            score_threshold: self.score_threshold.or(retrieval.score_threshold),
            filter: self.source.as_ref().map(|s| SearchFilter::new().must("source", s.as_str())),
        }
    }
}

type CliRetriever = Retriever<Box<dyn Embedder>, LanceVectorStore>;

fn open_store(settings: &Settings, dim: usize) -> Result<LanceVectorStore> {
    LanceVectorStore::from_settings(&settings.store, dim)
}

fn build_retriever(settings: &Settings, args: &QueryArgs) -> Result<CliRetriever> {
    let embedder = get_default_embedder(&settings.embedding)?;
    let store = open_store(settings, embedder.dim())?;
    Ok(Retriever::from_settings(embedder, store, &settings.retrieval, &settings.fusion).with_rerank(settings.retrieval.rerank && !args.no_rerank))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Config::load()?.settings()?;
    match cli.command {
        Commands::Chunk { input, output, source } => {
            let chunker = Chunker::new(ChunkingConfig::from(&settings.chunking));
            let written = chunker.process_jsonl(&input, &output, &source)?;
            println!("{written} chunks written to {}", output.display());
        }
        Commands::Index { inputs, progress } => {
            let mut records: Vec<ChunkRecord> = Vec::new();
            for input in &inputs {
                records.extend(read_jsonl::<ChunkRecord>(input)?);
            }
            let embedder = get_default_embedder(&settings.embedding)?;
            let store = open_store(&settings, embedder.dim())?;
            let tasks = IngestionTaskManager::new();
            let report = IngestPipeline::new(embedder.as_ref(), &store, settings.embedding.batch_size)
                .with_progress(progress)
                .run(&tasks, &records)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Query(args) => {
            let retriever = build_retriever(&settings, &args)?;
            let ranked = retriever.retrieve(&args.to_query(&settings))?;
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }
        Commands::Context { query: args, json } => {
            let retriever = build_retriever(&settings, &args)?;
            let ranked = retriever.retrieve(&args.to_query(&settings))?;
            if ranked.is_empty() {
                println!("{NO_RESULTS_ANSWER}");
                return Ok(());
            }
            let composed = PromptComposer::new(ContextBudgeter::new(settings.budget)).compose(&args.text, &ranked);
            if json {
                println!("{}", serde_json::to_string_pretty(&composed)?);
            } else {
                println!("{}", composed.prompt);
                tracing::info!(blocks = composed.context.len(), used_chars = composed.context.used_chars, "composed prompt");
            }
        }
        Commands::Status => {
            let store = open_store(&settings, settings.embedding.dim)?;
            println!("{}", serde_json::to_string_pretty(&store.collection_info()?)?);
        }
    }
    Ok(())
}
