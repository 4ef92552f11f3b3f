mod display;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lawvisor_ai::{Embed, HashingEmbedder, Judge, RuleJudge};
use lawvisor_core::{AnalysisConfig, ExtractedText, RegulationFamily};
use lawvisor_engine::Pipeline;
use lawvisor_store::{RegulationSource, RegulationStore, StaticCorpusSource};
use lawvisor_sync::{ChatJudge, GdprInfoSource};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit status for a document the pipeline halted.
const EXIT_HALTED: u8 = 2;

/// Regulatory-risk analysis for contracts, grounded in GDPR and SEC text.
#[derive(Parser, Debug)]
#[command(name = "lawvisor", version, about, long_about = None)]
struct Cli {
    /// TOML configuration file, layered over the defaults and under
    /// `LAWVISOR_*` environment variables.
    #[arg(long, global = true, env = "LAWVISOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze an extracted contract text file.
    Analyze(AnalyzeArgs),

    /// List the regulation articles the analyzer can cite.
    Regulations {
        /// Only show one family (gdpr or sec).
        #[arg(long)]
        family: Option<RegulationFamily>,

        /// Fetch GDPR text live from gdpr-info.eu.
        #[arg(long)]
        live: bool,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// Plain-text file holding the extracted contract text.
    file: PathBuf,

    /// Identifier for the report; defaults to the file stem.
    #[arg(long)]
    document_id: Option<String>,

    /// Confidence of the text extraction, in [0, 1].
    #[arg(long, default_value_t = 1.0, value_parser = parse_unit_interval)]
    ocr_confidence: f64,

    /// Print the report (or the halt) as JSON.
    #[arg(long)]
    json: bool,

    /// Fetch GDPR text live from gdpr-info.eu instead of the built-in corpus.
    #[arg(long)]
    live: bool,

    /// OpenAI-compatible API base used as the judge instead of the rule set.
    #[arg(long, requires = "llm_model")]
    llm_endpoint: Option<String>,

    /// Model name for `--llm-endpoint`.
    #[arg(long, requires = "llm_endpoint")]
    llm_model: Option<String>,

    /// Bearer token for `--llm-endpoint`.
    #[arg(long, env = "LAWVISOR_LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    /// Directory holding `model.onnx` and `tokenizer.json` for embeddings.
    #[cfg(feature = "onnx")]
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

fn parse_unit_interval(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{s} is not in [0, 1]"))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!("lawvisor v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Analyze(args) => run_analyze(cli.config.as_deref(), args).await,
        Commands::Regulations { family, live } => run_regulations(cli.config.as_deref(), family, live).await,
        Commands::Config => run_config(cli.config.as_deref()),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

// ── Commands ──

async fn run_analyze(config_path: Option<&Path>, args: AnalyzeArgs) -> anyhow::Result<u8> {
    let config = AnalysisConfig::load(config_path).context("loading configuration")?;
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let document_id = match &args.document_id {
        Some(id) => id.clone(),
        None => args
            .file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string()),
    };

    let pipeline = Pipeline::standard(config, source(args.live)?, embedder(&args)?, judge(&args)?)
        .await
        .context("setting up the analysis pipeline")?;
    tracing::info!(document_id = %document_id, judge = pipeline.judge_name(), "analyzing");

    let run = pipeline
        .run(ExtractedText::new(document_id, text, args.ocr_confidence))
        .await;

    if args.json {
        let body = match &run.outcome {
            Ok(report) => json!({
                "status": "completed",
                "classification": run.classification,
                "report": report,
            }),
            Err(failure) => json!({
                "status": "failed",
                "failure": failure,
                "history": run.document.history(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        match &run.outcome {
            Ok(report) => display::print_report(report, run.classification.as_ref()),
            Err(failure) => display::print_failure(failure, &run.document),
        }
    }

    Ok(if run.outcome.is_ok() { 0 } else { EXIT_HALTED })
}

async fn run_regulations(
    config_path: Option<&Path>,
    family: Option<RegulationFamily>,
    live: bool,
) -> anyhow::Result<u8> {
    let config = AnalysisConfig::load(config_path).context("loading configuration")?;
    let store = RegulationStore::from_config(source(live)?, &config.regulations);
    let articles = store
        .load_family(family)
        .await
        .context("loading regulation articles")?;
    display::print_regulations(&articles);
    Ok(0)
}

fn run_config(config_path: Option<&Path>) -> anyhow::Result<u8> {
    let config = AnalysisConfig::load(config_path).context("loading configuration")?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(0)
}

// ── Collaborators ──

fn source(live: bool) -> anyhow::Result<Arc<dyn RegulationSource>> {
    if live {
        Ok(Arc::new(GdprInfoSource::new(HTTP_TIMEOUT)?))
    } else {
        Ok(Arc::new(StaticCorpusSource))
    }
}

fn judge(args: &AnalyzeArgs) -> anyhow::Result<Arc<dyn Judge>> {
    match (&args.llm_endpoint, &args.llm_model) {
        (Some(endpoint), Some(model)) => {
            let mut judge = ChatJudge::new(endpoint, model, HTTP_TIMEOUT)?;
            if let Some(key) = &args.llm_api_key {
                judge = judge.with_api_key(key.clone());
            }
            Ok(Arc::new(judge))
        }
        _ => Ok(Arc::new(RuleJudge::new())),
    }
}

#[cfg(feature = "onnx")]
fn embedder(args: &AnalyzeArgs) -> anyhow::Result<Arc<dyn Embed>> {
    match &args.model_dir {
        Some(dir) => Ok(Arc::new(lawvisor_ai::OnnxEmbedder::load(dir)?)),
        None => Ok(Arc::new(HashingEmbedder::default())),
    }
}

#[cfg(not(feature = "onnx"))]
fn embedder(_: &AnalyzeArgs) -> anyhow::Result<Arc<dyn Embed>> {
    Ok(Arc::new(HashingEmbedder::default()))
}
