//! Glosspeek CLI - read a text in the terminal and translate selections
//!
//! The reader TUI watches for text selections and shows a tooltip with a
//! translation and linguistic annotations. The `translate`, `models`, and
//! `config` subcommands expose the same coordinator without the TUI.

mod onboarding;
mod tui;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;

use glosspeek_core::provider::catalog;
use glosspeek_core::{
    Coordinator, CoordinatorHandle, CoordinatorInput, CoordinatorOutput, SettingsStore,
    TranslationResult,
};

/// Shown when the reader is opened without a file.
const DEMO_TEXT: &str = "\
Welcome to Glosspeek.

Open any text file with: glosspeek path/to/file.txt

Select a word or phrase in this window - drag with the mouse, or press v
and move the cursor - and after a short pause a tooltip appears with the
translation, part of speech, and an example sentence. Press p to pin a
translation, Esc to dismiss the tooltip, and s to open the settings.

The quick brown fox jumps over the lazy dog. A journey of a thousand
miles begins with a single step. All that glitters is not gold.
";

#[derive(Parser)]
#[command(name = "glosspeek")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Selection translator with linguistic annotations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Text file to open in the reader
    file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a phrase and print the annotated result
    Translate {
        /// The text to translate
        text: String,

        /// Print the raw JSON result instead of formatted output
        #[arg(long)]
        json: bool,
    },

    /// Discover the models the configured provider offers
    Models,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Warn by default so logs don't fight the TUI for the terminal;
    // --verbose raises it for troubleshooting.
    tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose {
            "info,glosspeek_core=debug"
        } else {
            "warn"
        })
        .with_writer(std::io::stderr)
        .init();

    let store = Arc::new(SettingsStore::open_default()?);

    // First run with no settings file: walk through setup before the TUI
    if cli.command.is_none() && !store.path().exists() && std::io::stdout().is_terminal() {
        onboarding::run(&store)?;
    }

    let (coordinator, handle) = Coordinator::new(store.clone())?;
    tokio::spawn(coordinator.run());

    match cli.command {
        Some(Commands::Translate { text, json }) => run_translate(&handle, &text, json).await,
        Some(Commands::Models) => run_models(&store, &handle).await,
        Some(Commands::Config) => {
            show_config(&store);
            Ok(())
        }
        None => {
            let (title, text) = load_document(cli.file.as_deref())?;
            tui::run(store, handle, title, text).await
        }
    }
}

fn load_document(file: Option<&Path>) -> anyhow::Result<(String, String)> {
    match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let title = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok((title, text))
        }
        None => Ok(("glosspeek".to_string(), DEMO_TEXT.to_string())),
    }
}

/// One-shot translation over the coordinator protocol.
async fn run_translate(handle: &CoordinatorHandle, text: &str, json: bool) -> anyhow::Result<()> {
    let mut rx = handle.register_context("one-shot");
    handle
        .send("one-shot", CoordinatorInput::translate(1, text))
        .await?;

    while let Some(output) = rx.recv().await {
        match output {
            CoordinatorOutput::Translation { result, .. } => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    print_result(&result);
                }
                return Ok(());
            }
            CoordinatorOutput::TranslationFailed { error, .. } => {
                anyhow::bail!("{error}");
            }
            // State broadcasts are not for us here
            _ => {}
        }
    }
    anyhow::bail!("coordinator went away before answering")
}

fn print_result(result: &TranslationResult) {
    println!(
        "{} → {}",
        style(&result.original_text).dim(),
        style(&result.translation).bold()
    );
    match &result.gender {
        Some(gender) => println!("{} ({})", result.part_of_speech, gender),
        None => println!("{}", result.part_of_speech),
    }
    println!("Example: {}", result.example);
    if let Some(freq) = &result.usage_frequency {
        println!("Usage: {}, {}", freq.frequency, freq.register);
    }
    if !result.collocations.is_empty() {
        println!("Collocations: {}", result.collocations.join(", "));
    }
    println!("{}", style(format!("Model: {}", result.model)).dim());
}

/// List the provider's models, falling back to the static list on failure.
async fn run_models(store: &SettingsStore, handle: &CoordinatorHandle) -> anyhow::Result<()> {
    let stored = store.get();
    if stored.base_url.is_empty() || stored.api_key.is_empty() {
        println!(
            "{}",
            style("No credentials configured; showing the built-in model list.").yellow()
        );
        print_models(catalog::fallback_models());
        return Ok(());
    }

    let mut rx = handle.register_context("models");
    handle
        .send(
            "models",
            CoordinatorInput::fetch_models(stored.base_url, stored.api_key),
        )
        .await?;

    while let Some(output) = rx.recv().await {
        match output {
            CoordinatorOutput::Models { models } => {
                print_models(&models);
                return Ok(());
            }
            CoordinatorOutput::ModelsFailed { error } => {
                println!(
                    "{}",
                    style(format!("Model discovery failed: {error}")).yellow()
                );
                println!("Falling back to the built-in model list.");
                print_models(catalog::fallback_models());
                return Ok(());
            }
            _ => {}
        }
    }
    anyhow::bail!("coordinator went away before answering")
}

fn print_models(models: &[glosspeek_core::ModelDescriptor]) {
    for model in models {
        if model.name == model.id {
            println!("{}", model.id);
        } else {
            println!("{}  {}", model.id, style(&model.name).dim());
        }
    }
}

fn show_config(store: &SettingsStore) {
    let stored = store.get();
    let provider = catalog::match_provider(&stored.base_url);
    println!("{}", style("Glosspeek configuration").bold());
    println!("  enabled:     {}", if stored.enabled { "yes" } else { "no" });
    println!("  provider:    {provider}");
    println!("  base URL:    {}", stored.base_url);
    println!("  language:    {}", stored.target_language);
    println!("  model:       {}", stored.resolved_model());
    println!("  API key:     {}", redact(&stored.api_key));
    println!("  pins:        {}", stored.pinned_translations.len());
    println!("  file:        {}", store.path().display());
}

fn redact(key: &str) -> String {
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("••••{tail}")
}
