//! `rehearsal` binary: run baseline and theory-of-mind debates against a local Ollama model.
//!
//! Settings come from flags, then the `[session]` table of
//! `$XDG_CONFIG_HOME/rehearsal/config.toml`, then built-in defaults. Environment keys from
//! `.env` and the XDG `[env]` table are applied first, so `REHEARSAL_MODEL` and `OLLAMA_HOST`
//! can live in either.

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use cli::{run_all, DebateReport, Mode, RunOptions};
use config::SessionSettings;
use rehearsal::{LlmClient, OllamaChat};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "rehearsal")]
#[command(about = "Debate agents that rehearse each turn with a bounded look-ahead tree")]
struct Args {
    /// Debate topic
    #[arg(short, long, value_name = "TEXT")]
    topic: Option<String>,

    /// Total turns, alternating PRO then CON
    #[arg(long, value_name = "N")]
    turns: Option<usize>,

    /// Rehearsal tree depth (plies including the root options)
    #[arg(long, value_name = "N")]
    depth: Option<usize>,

    /// Candidates generated per node
    #[arg(long, value_name = "N")]
    breadth: Option<usize>,

    /// Ollama model name
    #[arg(short, long, env = "REHEARSAL_MODEL", value_name = "NAME")]
    model: Option<String>,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_HOST", value_name = "URL")]
    ollama_url: Option<String>,

    /// Directory for transcripts, tree renders and the log file
    #[arg(short, long, value_name = "DIR")]
    outputs: Option<PathBuf>,

    /// Which debates to run
    #[arg(long, value_enum, default_value_t = Mode::Compare)]
    mode: Mode,

    /// Print the reports as one JSON array on stdout instead of the live transcript
    #[arg(long)]
    json: bool,

    /// Only write `.dot` files; skip the Graphviz PNG render
    #[arg(long)]
    no_png: bool,
}

impl Args {
    fn flags(&self) -> SessionSettings {
        SessionSettings {
            topic: self.topic.clone(),
            turns: self.turns,
            depth: self.depth,
            breadth: self.breadth,
            model: self.model.clone(),
            ollama_url: self.ollama_url.clone(),
            outputs: self.outputs.clone(),
            ..Default::default()
        }
    }
}

fn print_summary(reports: &[DebateReport]) {
    println!("\n=== SUMMARY ===");
    for report in reports {
        let status = match (&report.outcome, &report.error) {
            (Some(outcome), _) => format!("{} turns, {:?}", outcome.turns.len(), outcome.termination),
            (None, Some(e)) => format!("aborted: {}", e),
            (None, None) => "no outcome".to_string(),
        };
        println!("{:<10} {}", report.name, status);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let file_settings = match config::load_and_apply(config::APP_NAME, None) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("warning: ignoring config: {}", e);
            SessionSettings::default()
        }
    };

    let args = Args::parse();
    let opts = RunOptions::resolve(args.flags(), file_settings, args.mode, args.json, args.no_png)?;
    std::fs::create_dir_all(&opts.outputs)?;

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let guard = logging::init(&opts.outputs, &stamp, opts.json);
    tracing::info!(model = %opts.model, url = %opts.ollama_url, mode = ?opts.mode, "rehearsal starting");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing the current call");
                cancel.cancel();
            }
        });
    }

    let ollama = OllamaChat::new(opts.model.clone()).with_base_url(&opts.ollama_url);
    if let Err(e) = ollama.warm_up().await {
        tracing::warn!(error = %e, "model warm-up failed; the first turn may be slow or fail");
    }
    let llm: Arc<dyn LlmClient> = Arc::new(ollama);

    let reports = run_all(&opts, llm, &stamp, &cancel).await?;
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        std::io::Write::flush(&mut std::io::stdout())?;
    } else {
        print_summary(&reports);
    }

    if reports.iter().any(|r| r.error.is_some()) {
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}
