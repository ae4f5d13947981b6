//! Resolved run options: command-line flags layered over `[session]` settings over defaults.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use config::SessionSettings;
use rehearsal::{BeliefConfig, SelectionPolicy, SessionConfig, Speaker};
use serde::Serialize;

use crate::error::CliError;
use crate::knowledge::DEFAULT_TOPIC;

pub const DEFAULT_MODEL: &str = "phi3:instruct";
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_OUTPUTS: &str = "outputs";

/// Which debates to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Both sides rehearse without an opponent model.
    Baseline,
    /// Both sides keep a theory-of-mind model of the other.
    Tom,
    /// Baseline first, then theory of mind, on the same topic.
    Compare,
}

impl Mode {
    /// `(name, tom)` for each debate this mode runs, in order.
    pub fn debates(self) -> &'static [(&'static str, bool)] {
        match self {
            Mode::Baseline => &[("baseline", false)],
            Mode::Tom => &[("tom", true)],
            Mode::Compare => &[("baseline", false), ("tom", true)],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub topic: String,
    pub model: String,
    pub ollama_url: String,
    pub outputs: PathBuf,
    pub mode: Mode,
    pub json: bool,
    /// Skip the `.png` render even when Graphviz is installed.
    pub no_png: bool,
    base: SessionConfig,
}

impl RunOptions {
    /// `flags` win over `file`; anything unset in both keeps its default.
    pub fn resolve(
        flags: SessionSettings,
        file: SessionSettings,
        mode: Mode,
        json: bool,
        no_png: bool,
    ) -> Result<Self, CliError> {
        let s = file.overlay(flags);
        let mut base = SessionConfig::default();
        if let Some(turns) = s.turns {
            base.num_turns = turns;
        }
        if let Some(depth) = s.depth {
            base.max_depth = depth;
        }
        if let Some(breadth) = s.breadth {
            base.max_breadth = breadth;
        }
        if let Some(discount) = s.discount {
            base.discount = discount;
        }
        if let Some(min) = s.min_aggregate_score {
            base.min_aggregate_score = min;
        }
        if let Some(ms) = s.call_timeout_ms {
            base = base.with_call_timeout(Duration::from_millis(ms));
        }
        if let Some(smoothing) = s.smoothing {
            base.belief = BeliefConfig {
                smoothing,
                ..base.belief
            };
        }
        if let Some(policy) = s.policy.as_deref() {
            base.policy = parse_policy(policy)?;
        }
        base.fallback_utterance = s.fallback_utterance;
        base.validate().map_err(|e| CliError::Option(e.to_string()))?;

        Ok(Self {
            topic: s.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            model: s.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ollama_url: s.ollama_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            outputs: s.outputs.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUTS)),
            mode,
            json,
            no_png,
            base,
        })
    }

    /// Session config for one debate; `tom` enables the opponent model on both sides.
    pub fn session_config(&self, tom: bool) -> SessionConfig {
        let mut config = self.base.clone();
        config.tom_enabled_for.clear();
        if tom {
            for speaker in Speaker::BOTH {
                config = config.with_tom(speaker);
            }
        }
        config
    }
}

fn parse_policy(raw: &str) -> Result<SelectionPolicy, CliError> {
    match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "adversarial" => Ok(SelectionPolicy::Adversarial),
        "best_first" => Ok(SelectionPolicy::BestFirst),
        other => Err(CliError::Option(format!(
            "unknown policy {:?}; expected adversarial or best_first",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_runner() {
        let o = RunOptions::resolve(
            SessionSettings::default(),
            SessionSettings::default(),
            Mode::Compare,
            false,
            false,
        )
        .unwrap();
        assert_eq!(o.topic, DEFAULT_TOPIC);
        assert_eq!(o.model, DEFAULT_MODEL);
        let c = o.session_config(false);
        assert_eq!((c.max_depth, c.max_breadth, c.num_turns), (2, 2, 6));
        assert!(c.tom_enabled_for.is_empty());
        assert_eq!(o.session_config(true).tom_enabled_for, vec![Speaker::Pro, Speaker::Con]);
    }

    #[test]
    fn flags_override_file_settings() {
        let file = SessionSettings {
            turns: Some(8),
            depth: Some(3),
            policy: Some("best-first".into()),
            ..Default::default()
        };
        let flags = SessionSettings {
            turns: Some(2),
            ..Default::default()
        };
        let o = RunOptions::resolve(flags, file, Mode::Baseline, true, true).unwrap();
        let c = o.session_config(false);
        assert_eq!(c.num_turns, 2);
        assert_eq!(c.max_depth, 3);
        assert_eq!(c.policy, SelectionPolicy::BestFirst);
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        let flags = SessionSettings {
            depth: Some(0),
            ..Default::default()
        };
        let err = RunOptions::resolve(flags, SessionSettings::default(), Mode::Tom, false, false)
            .unwrap_err();
        assert!(err.to_string().contains("max_depth"));
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let flags = SessionSettings {
            policy: Some("greedy".into()),
            ..Default::default()
        };
        assert!(
            RunOptions::resolve(flags, SessionSettings::default(), Mode::Tom, false, false).is_err()
        );
    }

    #[test]
    fn compare_runs_baseline_then_tom() {
        assert_eq!(Mode::Compare.debates(), &[("baseline", false), ("tom", true)]);
    }
}
