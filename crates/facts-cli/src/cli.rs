//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use facts_dsl::parse_document;
use facts_expr_ast::{ast_hash, extract_dependencies, DslDocument};
use facts_expr_check::collect_problems;
use facts_expr_eval::{evaluate_with_registry, OperatorRegistry};
use facts_store::FactStore;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::CliError;
use crate::examples::{self, EXAMPLES};

#[derive(Parser, Debug)]
#[command(name = "facts", about = "Evaluate arithmetic expressions over security facts")]
pub struct Cli {
    /// Directory with securities.json, attributes.json and facts.json (bundled data if omitted)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a document and print the result
    Eval(Input),
    /// Validate a document against the fact tables without evaluating it
    Check(Input),
    /// Print the attributes, operators, depth and hash of a document's expression
    Inspect(Input),
    /// List the pre-canned example documents
    Examples,
}

/// Where the document comes from. With none given, it is read from stdin.
#[derive(Args, Debug)]
pub struct Input {
    #[arg(short, long, conflicts_with_all = ["example", "document"])]
    pub file: Option<PathBuf>,

    /// Id of a pre-canned example (see `facts examples`)
    #[arg(short, long, conflicts_with = "document")]
    pub example: Option<String>,

    /// Document JSON given inline
    pub document: Option<String>,
}

pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<(), CliError> {
    match &cli.command {
        Command::Eval(input) => run_eval(cli.data_dir.as_deref(), input, out),
        Command::Check(input) => run_check(cli.data_dir.as_deref(), input, out),
        Command::Inspect(input) => run_inspect(input, out),
        Command::Examples => run_examples(out),
    }
}

/// Writes a failed command's message. An evaluation failure is the command's
/// output and goes to `out`, falling back to `err` if `out` cannot take it.
/// Everything else is a diagnostic on `err`.
pub fn report(error: &CliError, out: &mut dyn Write, err: &mut dyn Write) {
    match error {
        CliError::Evaluation(failure) => {
            if writeln!(out, "{failure}").is_err() {
                let _ = writeln!(err, "{failure}");
            }
        }
        other => {
            let _ = writeln!(err, "error: {other}");
        }
    }
}

pub fn load_store(data_dir: Option<&Path>) -> Result<FactStore, CliError> {
    let store = match data_dir {
        Some(dir) => FactStore::from_dir(dir)?,
        None => {
            info!("using bundled fact tables");
            FactStore::bundled()?
        }
    };
    Ok(store)
}

fn read_input(input: &Input) -> Result<String, CliError> {
    if let Some(path) = &input.file {
        return fs::read_to_string(path).map_err(|source| CliError::Read { path: path.clone(), source });
    }
    if let Some(id) = &input.example {
        let ex = examples::find(id).ok_or_else(|| CliError::UnknownExample(id.clone()))?;
        return Ok(ex.dsl.to_string());
    }
    if let Some(doc) = &input.document {
        return Ok(doc.clone());
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn read_document(input: &Input) -> Result<DslDocument, CliError> {
    Ok(parse_document(&read_input(input)?)?)
}

fn run_eval(data_dir: Option<&Path>, input: &Input, out: &mut dyn Write) -> Result<(), CliError> {
    let doc = read_document(input)?;
    let store = load_store(data_dir)?;
    let ops = OperatorRegistry::with_builtins();

    match evaluate_with_registry(&doc, &store, &ops) {
        Ok(value) => {
            writeln!(out, "{value}")?;
            Ok(())
        }
        Err(failure) => {
            for problem in collect_problems(&doc, &store, &ops) {
                debug!(%problem, "evaluation failed");
            }
            Err(failure.into())
        }
    }
}

fn run_check(data_dir: Option<&Path>, input: &Input, out: &mut dyn Write) -> Result<(), CliError> {
    let doc = read_document(input)?;
    let store = load_store(data_dir)?;
    let ops = OperatorRegistry::with_builtins();

    let problems = collect_problems(&doc, &store, &ops);
    if problems.is_empty() {
        writeln!(out, "ok")?;
        return Ok(());
    }
    for p in &problems {
        writeln!(out, "{p}")?;
    }
    Err(CliError::Check(problems))
}

fn run_inspect(input: &Input, out: &mut dyn Write) -> Result<(), CliError> {
    let doc = read_document(input)?;
    let deps = extract_dependencies(&doc.expression);

    let mut attributes: Vec<_> = deps.attributes.into_iter().collect();
    attributes.sort();
    let mut operators: Vec<_> = deps.operators.into_iter().collect();
    operators.sort();

    writeln!(out, "security: {}", doc.security)?;
    writeln!(out, "depth: {}", doc.expression.depth())?;
    writeln!(out, "attributes: {}", attributes.join(", "))?;
    writeln!(out, "operators: {}", operators.join(", "))?;
    writeln!(out, "hash: {}", ast_hash(&doc.expression)?)?;
    Ok(())
}

fn run_examples(out: &mut dyn Write) -> Result<(), CliError> {
    let width = EXAMPLES.iter().map(|e| e.id.len()).max().unwrap_or(0);
    for ex in EXAMPLES {
        writeln!(out, "{:width$}  {}", ex.id, ex.label)?;
    }
    Ok(())
}
