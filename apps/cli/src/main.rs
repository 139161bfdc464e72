use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storyarc_core::{
    AnalysisConfig, AnalysisEngine, AnalysisRequest, CacheStore, JobStore, ProviderConfig,
    PromptTemplate, build_gateway, format_analysis_readable, format_timestamp, manual_transcript,
};

#[derive(Parser)]
#[command(name = "storyarc")]
#[command(about = "Analyze long transcripts into narrative reports with AI macro/micro passes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a transcript text file
    Analyze {
        /// Path to a plain-text transcript
        transcript: PathBuf,

        /// Model id, e.g. "gpt-4o" or "claude-sonnet-4-20250514"
        #[arg(short, long, default_value = "gpt-4o")]
        model: String,

        /// Provider tag: "openai", "deepseek", "openrouter", "anthropic", ...
        #[arg(short, long, default_value = "openai")]
        provider: String,

        /// Override the provider base URL
        #[arg(long)]
        base_url: Option<String>,

        /// API key (defaults to the STORYARC_API_KEY environment variable)
        #[arg(long)]
        api_key: Option<String>,

        /// Output language (defaults to matching the transcript)
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// List past analyses
    History,

    /// Print a past analysis by its history key
    Show { key: String },

    /// Delete past analyses by their history keys
    Delete { keys: Vec<String> },
}

fn build_engine(provider_config: &ProviderConfig) -> Result<Arc<AnalysisEngine>> {
    let template = PromptTemplate::builtin();
    let cache = CacheStore::new(CacheStore::default_dir(), template.hash())
        .context("failed to open cache directory")?;
    let gateway = build_gateway(provider_config);
    Ok(Arc::new(AnalysisEngine::new(
        gateway,
        JobStore::new(),
        cache,
        template,
        AnalysisConfig::default(),
    )))
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

async fn run_analyze(
    transcript_path: PathBuf,
    model: String,
    provider_config: ProviderConfig,
) -> Result<()> {
    let text = fs::read_to_string(&transcript_path)
        .await
        .with_context(|| format!("failed to read {}", transcript_path.display()))?;

    let transcript = manual_transcript(&text);
    if transcript.segments.is_empty() {
        anyhow::bail!("transcript file contains no text");
    }

    println!(
        "\n{}  {}\n",
        style("storyarc").cyan().bold(),
        style("Narrative Analyzer").dim()
    );
    println!(
        "{} {} segments, ~{}",
        style("✓").green().bold(),
        transcript.segments.len(),
        format_timestamp(transcript.duration_seconds)
    );

    let output_language = provider_config.output_language.clone();
    let engine = build_engine(&provider_config)?;

    let request = AnalysisRequest {
        source: transcript_path.display().to_string(),
        cache_input: text,
        transcript,
        model,
        output_language,
    };
    let receipt = engine.submit(request);

    let pb = create_progress_bar();
    let job = loop {
        let job = engine.poll(receipt.job_id)?;
        pb.set_position(u64::from(job.progress));
        pb.set_message(job.message.clone());
        if job.status.is_terminal() {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    };

    if let Some(error) = job.error {
        pb.finish_and_clear();
        eprintln!("{} {}", style("Error:").red().bold(), error);
        std::process::exit(1);
    }

    pb.finish_with_message(format!("{} Analysis complete", style("✓").green().bold()));

    let result = job.result.context("completed job carried no result")?;
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", format_analysis_readable(&result.analysis));

    Ok(())
}

fn run_history(engine: &AnalysisEngine) {
    let entries = engine.list_history();
    if entries.is_empty() {
        println!("{}", style("No past analyses.").dim());
        return;
    }
    for entry in entries {
        println!(
            "{}  {}  {} {}",
            style(&entry.key[..12]).cyan(),
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.title,
            style(format!("({})", entry.model)).dim()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyarc=warn,storyarc_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Analyze {
            transcript,
            model,
            provider,
            base_url,
            api_key,
            lang,
        } => {
            let provider_config = ProviderConfig {
                provider: Some(provider),
                api_key,
                base_url,
                output_language: lang,
            };
            run_analyze(transcript, model, provider_config).await?;
        }
        Command::History => {
            let engine = build_engine(&ProviderConfig::default())?;
            run_history(&engine);
        }
        Command::Show { key } => {
            let engine = build_engine(&ProviderConfig::default())?;
            let item = engine.get_history_item(&key)?;
            println!("# {}\n", item.meta.title);
            println!(
                "{} {}\n",
                style("Source:").dim(),
                style(&item.meta.source).cyan()
            );
            println!("{}", format_analysis_readable(&item.analysis));
        }
        Command::Delete { keys } => {
            let engine = build_engine(&ProviderConfig::default())?;
            let removed = engine.delete_history(&keys);
            println!("{} Deleted {} entries", style("✓").green().bold(), removed);
        }
    }

    Ok(())
}
