//! Command-line entry points: the API server plus one-shot batch commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::api::{serve, ApiContext};
use crate::config::{AppConfig, ConfigError};
use crate::pipeline::extraction::{read_transactions_csv, ExtractionError};
use crate::pipeline::llm::{LlmError, OpenRouterClient};
use crate::pipeline::{CompliancePipeline, PipelineError, Transaction};
use crate::validation::ensure_transaction_ids;

#[derive(Parser, Debug)]
#[command(name = "gdaip", version)]
#[command(about = "Regulatory documents to data-profiling rules, and transaction checks against them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the REST API server
    Serve {
        /// Host to bind to (overrides GDAIP_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides GDAIP_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Extract requirements, profiling rules and validation code from a document
    ExtractRules {
        /// Regulation PDF (or CSV)
        pdf: PathBuf,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Append detected tables to the text sent to the model
        #[arg(long)]
        include_tables: bool,
    },

    /// List the regulatory requirements found in a document
    Requirements {
        file: PathBuf,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Classify transactions as ANOMALY / NORMAL with the model
    Detect {
        /// Rules JSON, e.g. the output of `extract-rules`
        #[arg(long)]
        rules: PathBuf,

        /// Transactions as a JSON list, a JSON object holding one, or CSV
        #[arg(long)]
        transactions: PathBuf,

        /// Key of the transaction list inside a JSON object
        #[arg(long, default_value = "corporate_loans")]
        key: String,

        #[arg(short, long, default_value = "anomalies.json")]
        out: PathBuf,
    },
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = AppConfig::from_env()?;
    // The blocking HTTP client must be dropped outside the async runtime, so
    // this handle outlives it.
    let llm = Arc::new(OpenRouterClient::from_config(&config)?);
    if !llm.has_api_key() {
        tracing::warn!("OPENROUTER_API_KEY is not set; model calls will fail");
    }
    let pipeline = CompliancePipeline::new(llm.clone(), config.pipeline_settings());

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            let addr = config.bind_addr();
            let ctx = ApiContext::new(pipeline, config);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(serve(ctx, &addr))?;
            drop(runtime);
        }
        Commands::ExtractRules {
            pdf,
            out,
            include_tables,
        } => {
            let outcome = pipeline.process_file(&pdf, include_tables)?;
            write_json(out.as_deref(), &outcome)?;
        }
        Commands::Requirements { file, out } => {
            let doc = pipeline.extract_file(&file, false)?;
            let requirements = pipeline.requirements(&doc.text)?;
            tracing::info!(count = requirements.len(), "Requirements extracted");
            write_json(out.as_deref(), &requirements)?;
        }
        Commands::Detect {
            rules,
            transactions,
            key,
            out,
        } => {
            let rules: Value = serde_json::from_slice(&std::fs::read(&rules)?)?;
            let mut records = load_transactions(&transactions, &key)?;
            ensure_transaction_ids(&mut records);

            let verdicts = pipeline.detect(&rules, &records)?;
            write_json(Some(&out), &verdicts)?;
            let flagged = verdicts.iter().filter(|v| v.is_anomaly()).count();
            println!(
                "Processed {} transactions, {} flagged. Results saved to {}",
                records.len(),
                flagged,
                out.display()
            );
        }
    }
    Ok(())
}

/// Transactions from CSV, a JSON list, or the list under `key` in a JSON object.
pub fn load_transactions(path: &Path, key: &str) -> Result<Vec<Transaction>, CliError> {
    let bytes = std::fs::read(path)?;
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        return Ok(read_transactions_csv(&bytes)?);
    }

    let value: Value = serde_json::from_slice(&bytes)?;
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove(key).ok_or_else(|| {
            CliError::InvalidInput(format!("{} has no \"{key}\" list", path.display()))
        })?,
        _ => {
            return Err(CliError::InvalidInput(format!(
                "{} must hold a JSON list or object",
                path.display()
            )))
        }
    };
    Ok(serde_json::from_value(list)?)
}

fn write_json<T: Serialize>(out: Option<&Path>, value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, text)?;
            tracing::info!(path = %path.display(), "Output written");
        }
        None => println!("{text}"),
    }
    Ok(())
}
