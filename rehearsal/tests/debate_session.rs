//! Integration tests for DebateSession: turn alternation, failure handling, cancellation,
//! theory of mind, events and rendering.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rehearsal::{
    ArgumentStyle, DebateAgent, DebateError, DebateEvent, DebateSession, EmotionalState,
    Observation, Phase, RenderError, ScriptedClassifier, ScriptedGenerator, ScriptedScorer,
    SessionConfig, Speaker, Termination, TreeExport, TreeRenderer, UtteranceSource,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::{resilience_script, steady_agent, NarrowOnlyGenerator};

#[tokio::test]
async fn transcript_alternates_and_counts_turns() {
    let config = SessionConfig::default().with_bounds(2, 2).with_turns(5);
    let mut session = DebateSession::new(
        "AI in education",
        config,
        steady_agent(Speaker::Pro, &["pro a", "pro b"]),
        steady_agent(Speaker::Con, &["con a", "con b"]),
    )
    .unwrap();
    assert_eq!(session.phase(), Phase::Init);

    let outcome = session.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.transcript.len(), 5);
    assert_eq!(outcome.turns.len(), 5);
    let speakers: Vec<Speaker> = outcome.transcript.turns().iter().map(|t| t.speaker).collect();
    assert_eq!(
        speakers,
        vec![Speaker::Pro, Speaker::Con, Speaker::Pro, Speaker::Con, Speaker::Pro]
    );
    assert_eq!(session.phase(), Phase::Terminal);
    assert!(session.step(&CancellationToken::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn each_step_advances_one_turn() {
    let config = SessionConfig::default()
        .with_bounds(1, 1)
        .with_turns(2)
        .with_opening_speaker(Speaker::Con);
    let mut session = DebateSession::new(
        "topic",
        config,
        steady_agent(Speaker::Pro, &["yes"]),
        steady_agent(Speaker::Con, &["no"]),
    )
    .unwrap();
    let cancel = CancellationToken::new();
    let first = session.step(&cancel).await.unwrap().unwrap();
    assert_eq!((first.turn, first.speaker), (0, Speaker::Con));
    assert_eq!(session.phase(), Phase::Turn(Speaker::Pro));
    let second = session.step(&cancel).await.unwrap().unwrap();
    assert_eq!((second.turn, second.speaker), (1, Speaker::Pro));
    assert_eq!(session.phase(), Phase::Terminal);
}

#[tokio::test]
async fn session_speaks_the_resilient_option() {
    let (gen, scorer) = resilience_script();
    let pro = DebateAgent::new(Speaker::Pro, Arc::new(gen), Arc::new(scorer));
    let config = SessionConfig::default().with_bounds(2, 2).with_turns(1);
    let mut session =
        DebateSession::new("topic", config, pro, steady_agent(Speaker::Con, &["no"])).unwrap();
    let outcome = session.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.transcript.turns()[0].utterance, "A2");
    let record = &outcome.turns[0];
    assert_eq!(record.source, UtteranceSource::Rehearsed);
    assert_eq!(record.expected_line, vec!["PRO: A2", "CON: B2"]);
    let tree = record.tree.as_ref().unwrap();
    assert_eq!(tree.selected, Some(3));
    assert_eq!(tree.nodes.len(), 6);
}

fn stalling_pro() -> DebateAgent {
    // Opens with P1, then has nothing to say.
    DebateAgent::new(
        Speaker::Pro,
        Arc::new(ScriptedGenerator::new().at_opening(&["P1"])),
        Arc::new(ScriptedScorer::new().otherwise(0.5)),
    )
}

#[tokio::test]
async fn empty_generation_aborts_with_transcript_intact() {
    let config = SessionConfig::default().with_bounds(2, 2).with_turns(4);
    let mut session =
        DebateSession::new("topic", config, stalling_pro(), steady_agent(Speaker::Con, &["C1"]))
            .unwrap();
    let err = session.run(&CancellationToken::new()).await.unwrap_err();
    match &err {
        DebateError::SessionAborted {
            transcript,
            turns_completed,
            ..
        } => {
            assert_eq!(*turns_completed, 2);
            let lines: Vec<&str> = transcript.turns().iter().map(|t| t.utterance.as_str()).collect();
            assert_eq!(lines, vec!["P1", "C1"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        err.root_cause(),
        DebateError::GenerationExhausted {
            speaker: Speaker::Pro,
            ..
        }
    ));
    assert_eq!(session.phase(), Phase::Terminal);
    assert_eq!(session.transcript().len(), 2);
}

#[tokio::test]
async fn fallback_utterance_keeps_the_session_going() {
    let config = SessionConfig::default()
        .with_bounds(2, 2)
        .with_turns(4)
        .with_fallback_utterance("I stand by my previous point.");
    let mut session =
        DebateSession::new("topic", config, stalling_pro(), steady_agent(Speaker::Con, &["C1"]))
            .unwrap();
    let outcome = session.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.transcript.len(), 4);
    assert_eq!(outcome.turns[2].source, UtteranceSource::Fallback);
    assert_eq!(outcome.turns[2].utterance, "I stand by my previous point.");
    assert!(outcome.turns[2].tree.is_none());
}

#[tokio::test]
async fn relaxed_retry_recovers_a_narrow_generator() {
    let pro = DebateAgent::new(
        Speaker::Pro,
        Arc::new(NarrowOnlyGenerator {
            line: "Only this.".into(),
        }),
        Arc::new(ScriptedScorer::new().otherwise(0.5)),
    );
    let config = SessionConfig::default().with_bounds(2, 2).with_turns(1);
    let mut session =
        DebateSession::new("topic", config, pro, steady_agent(Speaker::Con, &["no"])).unwrap();
    let outcome = session.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.turns[0].source, UtteranceSource::Relaxed);
    assert_eq!(outcome.turns[0].utterance, "Only this.");
}

#[tokio::test]
async fn without_relaxed_retry_a_narrow_generator_aborts() {
    let pro = DebateAgent::new(
        Speaker::Pro,
        Arc::new(NarrowOnlyGenerator {
            line: "Only this.".into(),
        }),
        Arc::new(ScriptedScorer::new().otherwise(0.5)),
    );
    let config = SessionConfig::default()
        .with_bounds(2, 2)
        .with_turns(1)
        .with_retry_relaxed(false);
    let mut session =
        DebateSession::new("topic", config, pro, steady_agent(Speaker::Con, &["no"])).unwrap();
    let err = session.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        DebateError::SessionAborted {
            turns_completed: 0,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn timed_out_root_generation_aborts() {
    let pro = DebateAgent::new(
        Speaker::Pro,
        Arc::new(
            ScriptedGenerator::new()
                .otherwise(&["late"])
                .with_delay(Duration::from_secs(120)),
        ),
        Arc::new(ScriptedScorer::new().otherwise(0.5)),
    );
    let config = SessionConfig::default()
        .with_turns(2)
        .with_call_timeout(Duration::from_secs(5));
    let mut session =
        DebateSession::new("topic", config, pro, steady_agent(Speaker::Con, &["no"])).unwrap();
    let err = session.run(&CancellationToken::new()).await.unwrap_err();
    match err.root_cause() {
        DebateError::GenerationExhausted { detail, .. } => assert!(detail.contains("timed out")),
        other => panic!("unexpected cause: {other}"),
    }
}

#[tokio::test]
async fn cancelled_before_start_ends_without_turns() {
    let token = CancellationToken::new();
    token.cancel();
    let mut session = DebateSession::new(
        "topic",
        SessionConfig::default(),
        steady_agent(Speaker::Pro, &["yes"]),
        steady_agent(Speaker::Con, &["no"]),
    )
    .unwrap();
    let outcome = session.run(&token).await.unwrap();
    assert_eq!(outcome.termination, Termination::Cancelled);
    assert!(outcome.transcript.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_turn_keeps_completed_turns() {
    let slow = |speaker, line: &'static str| {
        DebateAgent::new(
            speaker,
            Arc::new(
                ScriptedGenerator::new()
                    .otherwise(&[line])
                    .with_delay(Duration::from_secs(1)),
            ),
            Arc::new(ScriptedScorer::new().otherwise(0.5)),
        )
    };
    let config = SessionConfig::default().with_bounds(1, 1).with_turns(6);
    let mut session = DebateSession::new(
        "topic",
        config,
        slow(Speaker::Pro, "yes"),
        slow(Speaker::Con, "no"),
    )
    .unwrap();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        canceller.cancel();
    });
    let outcome = session.run(&token).await.unwrap();
    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.transcript.len(), 2);
    assert_eq!(session.phase(), Phase::Terminal);
}

#[tokio::test]
async fn tom_agent_reads_opponent_and_adapts_guidance() {
    let pro_gen = Arc::new(ScriptedGenerator::new().otherwise(&["calm point"]));
    let pro = DebateAgent::new(
        Speaker::Pro,
        pro_gen.clone(),
        Arc::new(ScriptedScorer::new().otherwise(0.5)),
    )
    .with_classifier(Arc::new(
        ScriptedClassifier::new(Observation::new(EmotionalState::Calm, ArgumentStyle::Direct))
            .on(
                "This is absurd!",
                Observation::new(EmotionalState::Frustrated, ArgumentStyle::Emotional),
            ),
    ));
    let con = steady_agent(Speaker::Con, &["This is absurd!"]);
    let config = SessionConfig::default()
        .with_bounds(1, 1)
        .with_turns(3)
        .with_tom(Speaker::Pro);
    let mut session = DebateSession::new("topic", config, pro, con).unwrap();
    session.run(&CancellationToken::new()).await.unwrap();

    let belief = session.agent(Speaker::Pro).belief().unwrap();
    assert_eq!(belief.observations, 1);
    assert_eq!(belief.emotional_estimate().state, EmotionalState::Frustrated);
    assert!(session.agent(Speaker::Con).belief().is_none());

    let guidance = pro_gen.guidance_seen();
    assert_eq!(guidance.len(), 2);
    assert!(guidance[0].is_none());
    assert!(guidance[1].as_deref().unwrap().contains("calm and factual"));
}

#[tokio::test]
async fn new_session_resets_beliefs() {
    let config = SessionConfig::default()
        .with_bounds(1, 1)
        .with_turns(4)
        .with_tom(Speaker::Pro)
        .with_tom(Speaker::Con);
    let mut first = DebateSession::new(
        "topic",
        config.clone(),
        steady_agent(Speaker::Pro, &["We have studies and data!"]),
        steady_agent(Speaker::Con, &["That is absurd! Wake up!"]),
    )
    .unwrap();
    first.run(&CancellationToken::new()).await.unwrap();
    let prior = rehearsal::BeliefState::prior(&config.belief);
    assert_ne!(first.agent(Speaker::Pro).belief(), Some(&prior));

    let (pro, con) = first.into_agents();
    let mut second = DebateSession::new("topic", config.with_turns(0), pro, con).unwrap();
    second.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(second.agent(Speaker::Pro).belief(), Some(&prior));
    assert_eq!(second.agent(Speaker::Con).belief(), Some(&prior));
}

#[tokio::test]
async fn events_trace_the_session() {
    let (tx, mut rx) = mpsc::channel(64);
    let config = SessionConfig::default().with_bounds(1, 2).with_turns(2);
    let mut session = DebateSession::new(
        "topic",
        config,
        steady_agent(Speaker::Pro, &["yes", "indeed"]),
        steady_agent(Speaker::Con, &["no"]),
    )
    .unwrap()
    .with_events(tx);
    session.run(&CancellationToken::new()).await.unwrap();
    drop(session);

    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    assert_eq!(
        events.first(),
        Some(&DebateEvent::TurnStarted {
            turn: 0,
            speaker: Speaker::Pro
        })
    );
    assert!(events.iter().any(|e| matches!(
        e,
        DebateEvent::TreeBuilt { options, .. } if options == &vec!["yes".to_string(), "indeed".to_string()]
    )));
    let spoken = events
        .iter()
        .filter(|e| matches!(e, DebateEvent::Spoke { .. }))
        .count();
    assert_eq!(spoken, 2);
    assert_eq!(
        events.last(),
        Some(&DebateEvent::Finished {
            turns: 2,
            cancelled: false
        })
    );
}

#[derive(Default)]
struct RecordingRenderer {
    names: Mutex<Vec<String>>,
}

impl TreeRenderer for RecordingRenderer {
    fn render(&self, name: &str, export: &TreeExport) -> Result<(), RenderError> {
        assert!(export.selected.is_some());
        self.names
            .lock()
            .map_err(|e| RenderError::Renderer(e.to_string()))?
            .push(name.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn renderer_sees_every_rehearsed_turn() {
    let renderer = Arc::new(RecordingRenderer::default());
    let config = SessionConfig::default().with_bounds(2, 1).with_turns(2);
    let mut session = DebateSession::new(
        "topic",
        config,
        steady_agent(Speaker::Pro, &["yes"]),
        steady_agent(Speaker::Con, &["no"]),
    )
    .unwrap()
    .with_renderer(renderer.clone())
    .with_name("baseline");
    session.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(
        *renderer.names.lock().unwrap(),
        vec!["baseline_turn1_pro", "baseline_turn2_con"]
    );
}

/// Blocks its thread the way a `dot -Tpng` subprocess would.
struct SlowRenderer {
    delay: Duration,
}

impl TreeRenderer for SlowRenderer {
    fn render(&self, _name: &str, _export: &TreeExport) -> Result<(), RenderError> {
        std::thread::sleep(self.delay);
        Ok(())
    }
}

#[tokio::test]
async fn slow_renderer_does_not_stall_the_runtime() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticks = Arc::clone(&ticks);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(10));
            loop {
                interval.tick().await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let config = SessionConfig::default().with_bounds(1, 1).with_turns(2);
    let mut session = DebateSession::new(
        "topic",
        config,
        steady_agent(Speaker::Pro, &["yes"]),
        steady_agent(Speaker::Con, &["no"]),
    )
    .unwrap()
    .with_renderer(Arc::new(SlowRenderer {
        delay: Duration::from_millis(300),
    }));
    let outcome = session.run(&CancellationToken::new()).await.unwrap();
    ticker.abort();

    assert_eq!(outcome.transcript.len(), 2);
    assert!(
        ticks.load(Ordering::SeqCst) >= 10,
        "ticker only ran {} times while rendering",
        ticks.load(Ordering::SeqCst)
    );
}

#[test]
fn mismatched_agents_are_rejected() {
    let err = DebateSession::new(
        "topic",
        SessionConfig::default(),
        steady_agent(Speaker::Con, &["x"]),
        steady_agent(Speaker::Con, &["y"]),
    )
    .err()
    .unwrap();
    assert!(matches!(err, DebateError::InvalidConfig(_)));
}
