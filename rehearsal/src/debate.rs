//! Debate orchestrator: alternates turns between two agents until the turn budget is spent.
//!
//! Each turn the active agent rehearses a tree against the full transcript, the selector
//! picks one option, and the utterance is appended. When theory of mind is on for the other
//! side, it then reads that utterance and updates its belief before its own turn.
//!
//! ```text
//! Init --start--> Turn(opening) --spoke--> Turn(other) ... --budget spent--> Terminal
//!                       \--no utterance / cancelled--> Terminal
//! ```
//!
//! When a turn yields nothing selectable, the session retries once with breadth and depth 1
//! (if `retry_relaxed`), then says `fallback_utterance` (if set), and otherwise aborts with
//! [`DebateError::SessionAborted`] carrying the transcript so far.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::DebateAgent;
use crate::config::SessionConfig;
use crate::dialogue::{DialogueState, Speaker};
use crate::error::DebateError;
use crate::events::{DebateEvent, UtteranceSource};
use crate::export::{TreeExport, TreeRenderer};
use crate::select::{PathSelector, Selection};
use crate::tree::RehearsalTree;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "speaker", rename_all = "snake_case")]
pub enum Phase {
    Init,
    /// Waiting for this speaker's turn.
    Turn(Speaker),
    Terminal,
}

/// What happened in one completed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    /// Zero-based.
    pub turn: usize,
    pub speaker: Speaker,
    pub utterance: String,
    pub source: UtteranceSource,
    /// Effective value of the chosen option; `None` for the fallback utterance.
    pub value: Option<f64>,
    /// The line the selector expects to follow, starting with the utterance.
    pub expected_line: Vec<String>,
    /// The tree the utterance was selected from.
    pub tree: Option<TreeExport>,
}

/// Why the session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Completed,
    Cancelled,
}

/// Result of [`DebateSession::run`].
#[derive(Debug, Clone, Serialize)]
pub struct DebateOutcome {
    pub transcript: DialogueState,
    pub turns: Vec<TurnRecord>,
    pub termination: Termination,
}

/// One debate between a PRO and a CON agent on a topic.
pub struct DebateSession {
    config: SessionConfig,
    selector: PathSelector,
    pro: DebateAgent,
    con: DebateAgent,
    transcript: DialogueState,
    records: Vec<TurnRecord>,
    phase: Phase,
    events: Option<mpsc::Sender<DebateEvent>>,
    renderer: Option<Arc<dyn TreeRenderer>>,
    name: String,
}

/// A selected option together with how it was obtained.
struct Chosen {
    utterance: String,
    source: UtteranceSource,
    value: Option<f64>,
    expected_line: Vec<String>,
    tree: Option<TreeExport>,
}

impl DebateSession {
    /// Validates `config` and pairs the agents. Beliefs are reset to the prior here.
    pub fn new(
        topic: impl Into<String>,
        config: SessionConfig,
        pro: DebateAgent,
        con: DebateAgent,
    ) -> Result<Self, DebateError> {
        config.validate()?;
        if pro.speaker() != Speaker::Pro || con.speaker() != Speaker::Con {
            return Err(DebateError::InvalidConfig(format!(
                "agents must be PRO and CON, got {} and {}",
                pro.speaker(),
                con.speaker()
            )));
        }
        let selector = PathSelector::new(config.policy, config.discount, config.min_aggregate_score);
        Ok(Self {
            selector,
            pro,
            con,
            transcript: DialogueState::new(topic),
            records: Vec::new(),
            phase: Phase::Init,
            events: None,
            renderer: None,
            name: "debate".to_string(),
            config,
        })
    }

    /// Streams progress events to `tx`. A dropped receiver is ignored.
    pub fn with_events(mut self, tx: mpsc::Sender<DebateEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Hands every turn's tree to `renderer`.
    pub fn with_renderer(mut self, renderer: Arc<dyn TreeRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Prefix for rendered tree names, e.g. `baseline` gives `baseline_turn1_pro`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transcript(&self) -> &DialogueState {
        &self.transcript
    }

    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    pub fn agent(&self, speaker: Speaker) -> &DebateAgent {
        match speaker {
            Speaker::Pro => &self.pro,
            Speaker::Con => &self.con,
        }
    }

    /// Hands the agents back, e.g. to seat them in a new session.
    pub fn into_agents(self) -> (DebateAgent, DebateAgent) {
        (self.pro, self.con)
    }

    fn agent_mut(&mut self, speaker: Speaker) -> &mut DebateAgent {
        match speaker {
            Speaker::Pro => &mut self.pro,
            Speaker::Con => &mut self.con,
        }
    }

    /// Runs turns until the budget is spent or `cancel` fires.
    ///
    /// Cancellation is not an error: the outcome carries the turns completed so far and
    /// [`Termination::Cancelled`]. The tree being built when it fired is discarded.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<DebateOutcome, DebateError> {
        let termination = loop {
            match self.step(cancel).await {
                Ok(Some(_)) => continue,
                Ok(None) => break Termination::Completed,
                Err(DebateError::Cancelled) => break Termination::Cancelled,
                Err(e) => return Err(e),
            }
        };
        self.emit(DebateEvent::Finished {
            turns: self.records.len(),
            cancelled: termination == Termination::Cancelled,
        })
        .await;
        tracing::info!(
            turns = self.records.len(),
            termination = ?termination,
            "debate finished"
        );
        Ok(DebateOutcome {
            transcript: self.transcript.clone(),
            turns: self.records.clone(),
            termination,
        })
    }

    /// Advances by one turn. `Ok(None)` once the session is terminal.
    pub async fn step(&mut self, cancel: &CancellationToken) -> Result<Option<TurnRecord>, DebateError> {
        let speaker = match self.phase {
            Phase::Terminal => return Ok(None),
            Phase::Init => {
                self.start();
                match self.phase {
                    Phase::Turn(s) => s,
                    _ => return Ok(None),
                }
            }
            Phase::Turn(s) => s,
        };
        if cancel.is_cancelled() {
            self.phase = Phase::Terminal;
            return Err(DebateError::Cancelled);
        }

        match self.take_turn(speaker, cancel).await {
            Ok(record) => {
                self.phase = if self.records.len() >= self.config.num_turns {
                    Phase::Terminal
                } else {
                    Phase::Turn(speaker.opponent())
                };
                Ok(Some(record))
            }
            Err(DebateError::Cancelled) => {
                tracing::info!(turn = self.records.len(), speaker = %speaker, "session cancelled");
                self.phase = Phase::Terminal;
                Err(DebateError::Cancelled)
            }
            Err(cause) => {
                tracing::error!(turn = self.records.len(), speaker = %speaker, error = %cause, "session aborted");
                self.phase = Phase::Terminal;
                Err(DebateError::SessionAborted {
                    transcript: self.transcript.clone(),
                    turns_completed: self.records.len(),
                    cause: Box::new(cause),
                })
            }
        }
    }

    fn start(&mut self) {
        let belief = self.config.belief;
        for speaker in Speaker::BOTH {
            let enabled = self.config.tom_enabled(speaker);
            self.agent_mut(speaker).reset_belief(enabled, &belief);
        }
        tracing::info!(
            topic = %self.transcript.topic,
            turns = self.config.num_turns,
            max_depth = self.config.max_depth,
            max_breadth = self.config.max_breadth,
            tom = ?self.config.tom_enabled_for,
            "debate started"
        );
        self.phase = if self.config.num_turns == 0 {
            Phase::Terminal
        } else {
            Phase::Turn(self.config.opening_speaker)
        };
    }

    async fn take_turn(
        &mut self,
        speaker: Speaker,
        cancel: &CancellationToken,
    ) -> Result<TurnRecord, DebateError> {
        let turn = self.records.len();
        self.emit(DebateEvent::TurnStarted { turn, speaker }).await;

        let chosen = self.choose(speaker, cancel).await?;
        let context = self.transcript.clone();
        self.transcript.push(speaker, chosen.utterance.clone())?;
        tracing::info!(turn, speaker = %speaker, source = ?chosen.source, utterance = %chosen.utterance, "spoke");
        self.emit(DebateEvent::Spoke {
            turn,
            speaker,
            utterance: chosen.utterance.clone(),
            source: chosen.source,
        })
        .await;

        if let (Some(renderer), Some(export)) = (&self.renderer, &chosen.tree) {
            let name = format!("{}_turn{}_{}", self.name, turn + 1, speaker.as_str().to_lowercase());
            render_blocking(Arc::clone(renderer), name, export.clone()).await;
        }

        let listener = speaker.opponent();
        let belief_config = self.config.belief;
        let timeout = self.config.call_timeout();
        let utterance = chosen.utterance.clone();
        let estimate = self
            .agent_mut(listener)
            .observe(&utterance, &context, &belief_config, timeout, cancel)
            .await;

        let record = TurnRecord {
            turn,
            speaker,
            utterance: chosen.utterance,
            source: chosen.source,
            value: chosen.value,
            expected_line: chosen.expected_line,
            tree: chosen.tree,
        };
        self.records.push(record.clone());

        if let Some(estimate) = estimate? {
            self.emit(DebateEvent::BeliefUpdated {
                observer: listener,
                estimate,
            })
            .await;
        }
        Ok(record)
    }

    /// Rehearses and selects, falling back as configured when nothing is selectable.
    async fn choose(&self, speaker: Speaker, cancel: &CancellationToken) -> Result<Chosen, DebateError> {
        let (depth, breadth) = (self.config.max_depth, self.config.max_breadth);
        let first = self
            .rehearse_and_select(speaker, depth, breadth, UtteranceSource::Rehearsed, cancel)
            .await;
        let err = match first {
            Ok(chosen) => return Ok(chosen),
            Err(e) if !is_unselectable(&e) => return Err(e),
            Err(e) => e,
        };

        let err = if self.config.retry_relaxed && (depth, breadth) != (1, 1) {
            tracing::warn!(speaker = %speaker, error = %err, "no selectable option; retrying with breadth 1, depth 1");
            match self
                .rehearse_and_select(speaker, 1, 1, UtteranceSource::Relaxed, cancel)
                .await
            {
                Ok(chosen) => return Ok(chosen),
                Err(e) if !is_unselectable(&e) => return Err(e),
                Err(e) => e,
            }
        } else {
            err
        };

        match &self.config.fallback_utterance {
            Some(fallback) => {
                tracing::warn!(speaker = %speaker, error = %err, "no selectable option; using fallback utterance");
                Ok(Chosen {
                    utterance: fallback.clone(),
                    source: UtteranceSource::Fallback,
                    value: None,
                    expected_line: vec![fallback.clone()],
                    tree: None,
                })
            }
            None => Err(err),
        }
    }

    async fn rehearse_and_select(
        &self,
        speaker: Speaker,
        depth: usize,
        breadth: usize,
        source: UtteranceSource,
        cancel: &CancellationToken,
    ) -> Result<Chosen, DebateError> {
        let tree = self
            .agent(speaker)
            .rehearse(&self.transcript, &self.config, depth, breadth, cancel)
            .await?;
        self.emit(DebateEvent::TreeBuilt {
            speaker,
            nodes: tree.node_count(),
            plies: tree.plies(),
            options: tree.options.iter().map(|o| o.utterance.clone()).collect(),
        })
        .await;

        let selection = self.selector.select(&tree)?;
        self.emit(DebateEvent::OptionSelected {
            speaker,
            chosen: selection.index,
            values: selection.values.clone(),
        })
        .await;
        Ok(self.chosen(&tree, selection, source))
    }

    fn chosen(&self, tree: &RehearsalTree, selection: Selection, source: UtteranceSource) -> Chosen {
        let expected_line: Vec<String> = self
            .selector
            .expected_line(&tree.options[selection.index])
            .into_iter()
            .map(|(speaker, text)| format!("{}: {}", speaker, text))
            .collect();
        for (step, line) in expected_line.iter().enumerate() {
            tracing::debug!(speaker = %tree.speaker, step = step + 1, line = %line, "expected line");
        }
        let export = TreeExport::new(tree, Some(&selection));
        Chosen {
            utterance: selection.utterance,
            source,
            value: Some(selection.value),
            expected_line,
            tree: Some(export),
        }
    }

    async fn emit(&self, event: DebateEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}

/// Renders on the blocking pool; renderers may write files or run external tools.
async fn render_blocking(renderer: Arc<dyn TreeRenderer>, name: String, export: TreeExport) {
    let task_name = name.clone();
    let result = tokio::task::spawn_blocking(move || renderer.render(&task_name, &export)).await;
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(name = %name, error = %e, "tree rendering failed; skipping"),
        Err(e) => tracing::warn!(name = %name, error = %e, "tree renderer panicked; skipping"),
    }
}

/// Errors after which a turn may still produce an utterance by relaxing or falling back.
fn is_unselectable(e: &DebateError) -> bool {
    matches!(
        e,
        DebateError::GenerationExhausted { .. } | DebateError::ScoringFailure { .. }
    )
}
