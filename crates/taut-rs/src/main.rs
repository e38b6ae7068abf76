//! Command-line front end for the taut-rs context engine.
//!
//! Operates on transcript files saved by [`SessionHistory`]. Inspect a
//! transcript's window usage, run a compression pass over it, or extract
//! query-relevant fragments from a source file.
//!
//! # Examples
//!
//! ```sh
//! # Window usage and importance breakdown
//! taut status --transcript session.json
//!
//! # Compress in place with the smart strategy
//! taut compress --transcript session.json --strategy smart --in-place
//!
//! # Pull the most relevant excerpts of a file for a query
//! taut fragments --file src/main.rs --query "config loading"
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use taut_rs::context::{
    ImportanceScorer, ImportanceTier, count_tokens, extract_file_fragments,
};
use taut_rs::prelude::*;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Context window inspection and compression for saved transcripts.
#[derive(Parser)]
#[command(name = "taut")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show window usage and importance breakdown for a transcript.
    Status {
        /// Path to a saved transcript file.
        #[arg(long)]
        transcript: PathBuf,

        /// Token budget ceiling.
        #[arg(long, default_value_t = 200_000)]
        max_tokens: usize,
    },
    /// Run a compression pass over a transcript.
    Compress {
        /// Path to a saved transcript file.
        #[arg(long)]
        transcript: PathBuf,

        /// Strategy: remove_old, truncate, summarize, or smart.
        #[arg(long, default_value = "smart")]
        strategy: String,

        /// Token budget the pass tries to reach.
        #[arg(long, default_value_t = 96_000)]
        target_tokens: usize,

        /// Most-recent messages kept verbatim.
        #[arg(long, default_value_t = 5)]
        keep_recent: usize,

        /// Write the compressed transcript back to the input path.
        #[arg(long)]
        in_place: bool,

        /// Write the compressed transcript to this path instead.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Extract query-relevant excerpts from a source file.
    Fragments {
        /// File to extract from.
        #[arg(long)]
        file: PathBuf,

        /// Query terms, whitespace-separated.
        #[arg(long)]
        query: String,

        /// Maximum number of fragments to return.
        #[arg(long, default_value_t = 3)]
        max_fragments: usize,

        /// Maximum lines per fragment.
        #[arg(long, default_value_t = 20)]
        max_lines: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let result = match cli.command {
        Command::Status {
            transcript,
            max_tokens,
        } => run_status(&transcript, max_tokens),
        Command::Compress {
            transcript,
            strategy,
            target_tokens,
            keep_recent,
            in_place,
            output,
        } => run_compress(
            &transcript,
            &strategy,
            target_tokens,
            keep_recent,
            in_place,
            output,
        ),
        Command::Fragments {
            file,
            query,
            max_fragments,
            max_lines,
        } => run_fragments(&file, &query, max_fragments, max_lines),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_status(transcript: &Path, max_tokens: usize) -> Result<(), String> {
    let history = SessionHistory::load(transcript)?;
    let manager = ContextManager::new(ContextConfig::default().with_max_tokens(max_tokens));
    let state = manager.context_window_state(history.messages(), history.system_prompt());

    let count = count_tokens(history.messages(), history.system_prompt(), max_tokens);
    println!("{}", state.to_log_string());
    println!(
        "messages: {} ({} tokens), system prompt: {} tokens, available: {}",
        history.len(),
        count.messages,
        count.system_prompt,
        count.available,
    );

    // Importance breakdown by tier.
    let scored = ImportanceScorer::new().score_messages(history.messages());
    for tier in [
        ImportanceTier::Critical,
        ImportanceTier::High,
        ImportanceTier::Medium,
        ImportanceTier::Low,
    ] {
        let count = scored.iter().filter(|s| s.tier == tier).count();
        if count > 0 {
            println!("  {tier}: {count}");
        }
    }
    Ok(())
}

fn run_compress(
    transcript: &Path,
    strategy: &str,
    target_tokens: usize,
    keep_recent: usize,
    in_place: bool,
    output: Option<PathBuf>,
) -> Result<(), String> {
    let strategy: CompressionStrategy = strategy.parse()?;
    let history = SessionHistory::load(transcript)?;

    let mut manager = ContextManager::new(ContextConfig::default());
    let config = CompressionConfig {
        strategy,
        target_tokens,
        keep_recent_messages: keep_recent,
        keep_system_messages: true,
        generate_summary: true,
    };
    let result = manager.compress_messages(history.messages(), &config);

    println!(
        "{strategy}: {} -> {} tokens (saved {}), removed {} of {} messages",
        result.original_tokens,
        result.compressed_tokens,
        result.saved_tokens,
        result.removed_count,
        history.len(),
    );
    if let Some(summary) = &result.summary {
        println!(
            "summary: {} messages -> {} tokens",
            summary.message_count, summary.summary_tokens
        );
    }

    let destination = if in_place {
        Some(transcript.to_path_buf())
    } else {
        output
    };
    if let Some(path) = destination {
        let mut compressed = match history.system_prompt() {
            Some(p) => SessionHistory::new().with_system_prompt(p),
            None => SessionHistory::new(),
        };
        compressed.replace_messages(result.messages);
        compressed.save(&path)?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn run_fragments(
    file: &Path,
    query: &str,
    max_fragments: usize,
    max_lines: usize,
) -> Result<(), String> {
    let text =
        std::fs::read_to_string(file).map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let path = file.to_string_lossy();

    let fragments = extract_file_fragments(&text, &path, query, max_fragments, max_lines);
    if fragments.is_empty() {
        println!("no fragments");
        return Ok(());
    }

    for frag in fragments {
        println!(
            "── {}:{}-{} (score {:.0}) ──",
            frag.path, frag.start_line, frag.end_line, frag.relevance_score
        );
        println!("{}", frag.content);
    }
    Ok(())
}
