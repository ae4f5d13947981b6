//! Integration tests for the theory-of-mind belief model.


use rehearsal::belief::update;
use rehearsal::{
    ArgumentStyle, BeliefConfig, BeliefState, Criterion, EmotionalState, Observation,
    ScoringWeights,
};

fn frustrated() -> Observation {
    Observation::new(EmotionalState::Frustrated, ArgumentStyle::Emotional)
}

fn calm() -> Observation {
    Observation::new(EmotionalState::Calm, ArgumentStyle::Evidence)
}

#[test]
fn confidence_never_decreases_and_stays_bounded() {
    let config = BeliefConfig::default();
    let mut belief = BeliefState::prior(&config);
    let mut last = belief.confidence;
    for i in 0..20 {
        let obs = if i % 3 == 0 { calm() } else { frustrated() };
        belief = update(belief, &obs, &config);
        assert!(belief.confidence >= last);
        assert!(belief.confidence <= config.confidence_ceiling);
        last = belief.confidence;
    }
    assert_eq!(belief.observations, 20);
}

#[test]
fn repeated_observations_converge_on_the_observed_state() {
    let config = BeliefConfig::default();
    let mut belief = BeliefState::prior(&config);
    for _ in 0..6 {
        belief = update(belief, &frustrated(), &config);
    }
    let estimate = belief.emotional_estimate();
    assert_eq!(estimate.state, EmotionalState::Frustrated);
    assert!(estimate.probability > 0.95);
    assert_eq!(belief.dominant_style(), ArgumentStyle::Emotional);
}

#[test]
fn independent_beliefs_do_not_share_state() {
    let config = BeliefConfig::default();
    let first = BeliefState::prior(&config);
    let second = BeliefState::prior(&config);
    let first = update(first, &frustrated(), &config);
    assert_eq!(second, BeliefState::prior(&config));
    assert_ne!(first, second);
}

#[test]
fn reactive_opponent_shifts_weight_to_persuasiveness() {
    let config = BeliefConfig::default();
    let base = ScoringWeights::default();
    let prior = BeliefState::prior(&config);
    let mut belief = prior.clone();
    for _ in 0..3 {
        belief = update(belief, &frustrated(), &config);
    }
    let adapted = belief.scoring_weights(&base, config.adaptation_gain);
    assert!(adapted.get(Criterion::Persuasiveness) > base.get(Criterion::Persuasiveness));
    let sum: f64 = Criterion::ALL.iter().map(|c| adapted.get(*c)).sum();
    assert!((sum - 1.0).abs() < 1e-9);

    let unchanged = belief.scoring_weights(&base, 0.0);
    for c in Criterion::ALL {
        assert!((unchanged.get(c) - base.get(c)).abs() < 1e-12);
    }
}

#[test]
fn weaknesses_show_up_in_guidance() {
    let config = BeliefConfig::default();
    let obs = calm().with_weaknesses(vec!["ignores cost of devices".into()]);
    let belief = update(BeliefState::prior(&config), &obs, &config);
    let guidance = belief.guidance().unwrap();
    assert!(guidance.contains("ignores cost of devices"));
    assert!(guidance.contains("evidence-heavy"));
}
