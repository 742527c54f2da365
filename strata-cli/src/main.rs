//! Strata CLI - Command-line front-end for the Datalog engine

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use strata_core::{parse_program, Atom, Engine, EngineConfig, EngineVariant, ResolvedAtom};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata - Concurrent Datalog evaluation engine")]
#[command(version)]
struct Cli {
    /// Program file (clauses terminated by '.', queries by '?')
    program: PathBuf,

    /// Queries to run, e.g. 'tc(a, X)'; defaults to the queries embedded
    /// in the program file
    queries: Vec<String>,

    /// Evaluation strategy
    #[arg(short, long, value_enum, default_value = "chunked")]
    engine: EngineKind,

    /// Facts per work item for the chunked engines
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// Worker threads; 0 uses all hardware parallelism
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineKind {
    /// Serial semi-naive evaluation
    Serial,
    /// Concurrent semi-naive evaluation
    Concurrent,
    /// Concurrent evaluation with chunked work items
    Chunked,
    /// Magic-set transformation over the chunked engine
    Magic,
}

impl From<EngineKind> for EngineVariant {
    fn from(kind: EngineKind) -> Self {
        match kind {
            EngineKind::Serial => EngineVariant::SemiNaiveSerial,
            EngineKind::Concurrent => EngineVariant::SemiNaiveConcurrent,
            EngineKind::Chunked => EngineVariant::ChunkedConcurrent,
            EngineKind::Magic => EngineVariant::MagicSetOverConcurrent,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// One ground atom per line
    Text,
    /// A JSON array of resolved atoms per query
    Json,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {:#}", "error:".red().bold(), error);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "strata_core=debug,strata=debug".into()),
            )
            .init();
    }

    let source = fs::read_to_string(&cli.program)
        .with_context(|| format!("reading program file {}", cli.program.display()))?;

    let mut engine = Engine::new(EngineConfig {
        variant: cli.engine.into(),
        workers: cli.workers,
        chunk_size: cli.chunk_size,
        ..EngineConfig::default()
    });

    let embedded = engine.load(&source)?;
    let queries = if cli.queries.is_empty() {
        embedded
    } else {
        cli.queries
            .iter()
            .map(|q| parse_query(&engine, q))
            .collect::<Result<Vec<_>>>()?
    };

    if queries.is_empty() {
        bail!("no queries: pass one as an argument or end one with '?' in the program file");
    }

    for query in &queries {
        let results = engine.query(query)?;
        let interner = engine.interner();
        match cli.format {
            Format::Text => {
                let mut lines: Vec<String> =
                    results.iter().map(|f| f.to_text(interner)).collect();
                lines.sort();
                for line in lines {
                    println!("{}", line);
                }
            }
            Format::Json => {
                let mut resolved: Vec<ResolvedAtom> =
                    results.iter().map(|f| f.resolve(interner)).collect();
                resolved.sort_by(|a, b| (&a.predicate, &a.args).cmp(&(&b.predicate, &b.args)));
                println!("{}", serde_json::to_string(&resolved)?);
            }
        }
    }

    Ok(())
}

/// Parse a single query given on the command line
fn parse_query(engine: &Engine, text: &str) -> Result<Atom> {
    let text = text.trim().trim_end_matches('?');
    let parsed = parse_program(&format!("{}?", text), engine.interner())
        .with_context(|| format!("parsing query '{}'", text))?;
    match parsed.queries.as_slice() {
        [query] => Ok(query.clone()),
        _ => bail!("'{}' is not a single query atom", text),
    }
}
