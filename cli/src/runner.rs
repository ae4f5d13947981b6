//! Runs the debates a [`Mode`](crate::options::Mode) asks for and persists their transcripts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rehearsal::{
    DebateAgent, DebateError, DebateEvent, DebateOutcome, DebateSession, DialogueState,
    LlmClient, LlmGenerator, LlmScorer, LlmStyleClassifier, SessionConfig, Speaker, Termination,
    TreeRenderer,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;
use crate::knowledge::{talking_points, CON_KNOWLEDGE, PRO_KNOWLEDGE};
use crate::options::RunOptions;
use crate::render::DotFileRenderer;

/// What one debate produced, as written to `<name>_<stamp>.json`.
#[derive(Debug, Serialize)]
pub struct DebateReport {
    pub name: String,
    pub topic: String,
    pub config: SessionConfig,
    pub outcome: Option<DebateOutcome>,
    /// Transcript up to the failing turn when the session aborted.
    pub partial_transcript: Option<DialogueState>,
    pub error: Option<String>,
}

impl DebateReport {
    pub fn completed(&self) -> bool {
        matches!(&self.outcome, Some(o) if o.termination == Termination::Completed)
    }
}

fn agent(speaker: Speaker, llm: &Arc<dyn LlmClient>, tom: bool) -> DebateAgent {
    let points = match speaker {
        Speaker::Pro => PRO_KNOWLEDGE,
        Speaker::Con => CON_KNOWLEDGE,
    };
    let generator = LlmGenerator::new(Arc::clone(llm)).with_knowledge(speaker, talking_points(points));
    let agent = DebateAgent::new(
        speaker,
        Arc::new(generator),
        Arc::new(LlmScorer::new(Arc::clone(llm))),
    );
    if tom {
        agent.with_classifier(Arc::new(LlmStyleClassifier::new(Arc::clone(llm))))
    } else {
        agent
    }
}

/// Prints turns as they happen, grouped into rounds of one PRO and one CON turn.
async fn print_events(mut rx: mpsc::Receiver<DebateEvent>, quiet: bool) {
    while let Some(event) = rx.recv().await {
        if quiet {
            continue;
        }
        match event {
            DebateEvent::Spoke {
                turn,
                speaker,
                utterance,
                ..
            } => {
                if turn % 2 == 0 {
                    println!("\nROUND {}", turn / 2 + 1);
                }
                println!("{}: {}", speaker, utterance);
            }
            DebateEvent::Finished { turns, cancelled } if cancelled => {
                println!("\n(cancelled after {} turns)", turns);
            }
            _ => {}
        }
    }
}

/// Runs one debate and writes its report.
pub async fn run_debate(
    name: &str,
    config: SessionConfig,
    opts: &RunOptions,
    llm: &Arc<dyn LlmClient>,
    renderer: Arc<dyn TreeRenderer>,
    stamp: &str,
    cancel: &CancellationToken,
) -> Result<DebateReport, CliError> {
    let tom = !config.tom_enabled_for.is_empty();
    let (tx, rx) = mpsc::channel(64);
    let printer = tokio::spawn(print_events(rx, opts.json));

    if !opts.json {
        println!("\n--- {} DEBATE ---", name.to_uppercase());
        println!("TOPIC: {}", opts.topic);
    }
    tracing::info!(debate = name, topic = %opts.topic, tom, "debate starting");

    let mut session = DebateSession::new(
        opts.topic.clone(),
        config.clone(),
        agent(Speaker::Pro, llm, tom),
        agent(Speaker::Con, llm, tom),
    )?
    .with_events(tx)
    .with_renderer(renderer)
    .with_name(name);

    let result = session.run(cancel).await;
    drop(session);
    let _ = printer.await;

    let report = match result {
        Ok(outcome) => DebateReport {
            name: name.to_string(),
            topic: opts.topic.clone(),
            config,
            outcome: Some(outcome),
            partial_transcript: None,
            error: None,
        },
        Err(e @ DebateError::SessionAborted { .. }) => {
            tracing::error!(debate = name, error = %e, "debate aborted");
            if !opts.json {
                println!("\n(debate aborted: {})", e);
            }
            DebateReport {
                name: name.to_string(),
                topic: opts.topic.clone(),
                config,
                outcome: None,
                partial_transcript: e.transcript().cloned(),
                error: Some(e.to_string()),
            }
        }
        Err(e) => return Err(e.into()),
    };

    let path = write_report(&opts.outputs, &report, stamp)?;
    tracing::info!(debate = name, path = %path.display(), "transcript written");
    if !opts.json {
        println!("\n{} DEBATE COMPLETE (transcript: {})", name.to_uppercase(), path.display());
    }
    Ok(report)
}

/// Runs every debate of the selected mode in order; stops early when cancelled.
pub async fn run_all(
    opts: &RunOptions,
    llm: Arc<dyn LlmClient>,
    stamp: &str,
    cancel: &CancellationToken,
) -> Result<Vec<DebateReport>, CliError> {
    let renderer: Arc<dyn TreeRenderer> =
        Arc::new(DotFileRenderer::new(&opts.outputs).with_png(!opts.no_png));
    let mut reports = Vec::new();
    for (name, tom) in opts.mode.debates() {
        if cancel.is_cancelled() {
            break;
        }
        let report = run_debate(
            name,
            opts.session_config(*tom),
            opts,
            &llm,
            Arc::clone(&renderer),
            stamp,
            cancel,
        )
        .await?;
        reports.push(report);
    }
    Ok(reports)
}

pub fn write_report(dir: &Path, report: &DebateReport, stamp: &str) -> Result<PathBuf, CliError> {
    let path = dir.join(format!("{}_{}.json", report.name, stamp));
    std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
    Ok(path)
}
