//! Generator, scorer and style classifier that prompt an [`LlmClient`].
//!
//! The generator asks for `n` alternatives in one call and parses `CANDIDATE i:` lines.
//! The scorer and classifier ask for JSON and tolerate prose or code fences around it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::belief::{ArgumentStyle, Category, EmotionalState, Observation};
use crate::dialogue::{DialogueState, Speaker};
use crate::error::CollaboratorError;
use crate::llm::LlmClient;
use crate::message::Message;
use crate::scoring::CriterionScores;

use super::{GenerationRequest, Generator, Scorer, StyleClassifier};

const STATEMENT_PROMPT_CHARS: usize = 300;
const SCORED_RESPONSE_CHARS: usize = 500;
const RECENT_TURNS_IN_PROMPT: usize = 4;
const CANDIDATE_TAG: &str = "CANDIDATE";

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Generates candidate replies for either side from a fixed knowledge base per side.
pub struct LlmGenerator {
    llm: Arc<dyn LlmClient>,
    knowledge: HashMap<Speaker, Vec<String>>,
    /// Talking points offered per prompt.
    points_per_prompt: usize,
    max_sentences: usize,
}

impl LlmGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            knowledge: HashMap::new(),
            points_per_prompt: 2,
            max_sentences: 3,
        }
    }

    /// Sets the talking points `speaker` may draw on.
    pub fn with_knowledge(mut self, speaker: Speaker, points: Vec<String>) -> Self {
        self.knowledge.insert(speaker, points);
        self
    }

    pub fn with_max_sentences(mut self, n: usize) -> Self {
        self.max_sentences = n.max(1);
        self
    }

    /// Talking points for this prompt, rotated by transcript length so consecutive turns
    /// lead with different points.
    fn talking_points(&self, speaker: Speaker, context: &DialogueState) -> Vec<&str> {
        let Some(points) = self.knowledge.get(&speaker).filter(|p| !p.is_empty()) else {
            return Vec::new();
        };
        let start = context.len() % points.len();
        points
            .iter()
            .cycle()
            .skip(start)
            .take(self.points_per_prompt.min(points.len()))
            .map(String::as_str)
            .collect()
    }

    fn build_messages(&self, request: &GenerationRequest<'_>) -> Vec<Message> {
        let context = request.context;
        let side = request.speaker;
        let system = format!(
            "You are the {} side in a debate on: {}. Argue your side persuasively and stay on topic.",
            side, context.topic
        );
        let mut user = format!(
            "As the {} debater, respond to:\n\"{}\"\n",
            side,
            truncate_chars(context.statement_to_answer(), STATEMENT_PROMPT_CHARS)
        );
        let recent = context.recent_lines(RECENT_TURNS_IN_PROMPT);
        if recent.len() > 1 {
            user.push_str("\nRecent exchange:\n");
            for line in &recent {
                user.push_str(&truncate_chars(line, STATEMENT_PROMPT_CHARS));
                user.push('\n');
            }
        }
        let points = self.talking_points(side, context);
        if !points.is_empty() {
            user.push_str(&format!("\nUse one of: {}\n", points.join("; ")));
        }
        if let Some(guidance) = request.guidance {
            user.push_str(&format!("\n{}\n", guidance));
        }
        let n = request.n;
        user.push_str(&format!(
            "\nGive exactly {} alternative replies, each at most {} sentences. Output {} lines: {}.",
            n,
            self.max_sentences,
            n,
            (1..=n)
                .map(|i| format!("CANDIDATE {}: <reply>", i))
                .collect::<Vec<_>>()
                .join(", ")
        ));
        vec![Message::system(system), Message::user(user)]
    }
}

/// Parses `CANDIDATE i: text` lines; falls back to the whole content as one candidate.
pub(crate) fn parse_candidates(content: &str, n: usize) -> Vec<String> {
    let mut out = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        let Some(prefix) = line.get(..CANDIDATE_TAG.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(CANDIDATE_TAG) {
            continue;
        }
        let rest = &line[CANDIDATE_TAG.len()..];
        let Some(colon) = rest.find(':') else {
            continue;
        };
        if !rest[..colon].trim().chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let text = rest[colon + 1..].trim().trim_matches('"').trim();
        if !text.is_empty() {
            out.push(text.to_string());
        }
    }
    if out.is_empty() {
        let whole = content.trim();
        if !whole.is_empty() {
            out.push(whole.to_string());
        }
    }
    out.truncate(n);
    out
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<String>, CollaboratorError> {
        if request.n == 0 {
            return Ok(Vec::new());
        }
        let messages = self.build_messages(&request);
        let response = self.llm.invoke(&messages).await?;
        Ok(parse_candidates(&response.content, request.n))
    }
}

/// Extracts the first `{ ... }` object from model output (code fences and prose tolerated).
pub(crate) fn extract_json_object(raw: &str) -> Result<serde_json::Value, CollaboratorError> {
    let start = raw
        .find('{')
        .ok_or_else(|| CollaboratorError::Malformed("no JSON object in output".to_string()))?;
    let end = raw
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| CollaboratorError::Malformed("unterminated JSON object".to_string()))?;
    serde_json::from_str(&raw[start..=end])
        .map_err(|e| CollaboratorError::Malformed(format!("invalid JSON: {}", e)))
}

/// Judge that rates an utterance 0–`scale` per criterion and rescales to `[0, 1]`.
pub struct LlmScorer {
    llm: Arc<dyn LlmClient>,
    scale: f64,
}

impl LlmScorer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, scale: 10.0 }
    }

    /// Upper end of the rating scale requested from the judge.
    pub fn with_scale(mut self, scale: f64) -> Self {
        if scale.is_finite() && scale > 0.0 {
            self.scale = scale;
        }
        self
    }

    fn build_messages(&self, utterance: &str, context: &DialogueState) -> Vec<Message> {
        let user = format!(
            "Debate topic: {}\nStatement being answered: \"{}\"\n\n\
             Rate this response on a scale of 0-{} for:\n\
             1. Logical consistency\n2. Evidence quality\n3. Persuasiveness\n\n\
             Response: {}\n\
             Return JSON only, with keys: logic, evidence, persuasiveness",
            context.topic,
            truncate_chars(context.statement_to_answer(), STATEMENT_PROMPT_CHARS),
            self.scale,
            truncate_chars(utterance, SCORED_RESPONSE_CHARS)
        );
        vec![
            Message::system("You are a strict debate judge. Reply with JSON only."),
            Message::user(user),
        ]
    }

    fn parse_scores(&self, raw: &str) -> Result<CriterionScores, CollaboratorError> {
        let value = extract_json_object(raw)?;
        let object = value
            .as_object()
            .ok_or_else(|| CollaboratorError::Malformed("scores are not an object".to_string()))?;
        let numeric = object.iter().filter_map(|(k, v)| {
            let n = v
                .as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))?;
            Some((k.as_str(), n / self.scale))
        });
        CriterionScores::from_raw(numeric)
    }
}

#[async_trait]
impl Scorer for LlmScorer {
    async fn evaluate(
        &self,
        utterance: &str,
        context: &DialogueState,
    ) -> Result<CriterionScores, CollaboratorError> {
        let messages = self.build_messages(utterance, context);
        let response = self.llm.invoke(&messages).await?;
        self.parse_scores(&response.content)
    }
}

/// Opponent analysis: emotional state, argument style, weaknesses and core beliefs.
pub struct LlmStyleClassifier {
    llm: Arc<dyn LlmClient>,
}

impl LlmStyleClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn build_messages(&self, utterance: &str) -> Vec<Message> {
        let user = format!(
            "Analyze this debate statement:\n\"{}\"\n\n\
             Extract as JSON with:\n\
             - 'beliefs': list of core beliefs\n\
             - 'emotional_state': calm/angry/defensive\n\
             - 'argument_style': direct/emotional/technical/authority\n\
             - 'weaknesses': list of logical weaknesses",
            truncate_chars(utterance, SCORED_RESPONSE_CHARS)
        );
        vec![
            Message::system("You analyze debaters. Reply with JSON only."),
            Message::user(user),
        ]
    }
}

#[derive(Deserialize)]
struct RawAnalysis {
    emotional_state: Option<String>,
    argument_style: Option<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    beliefs: Vec<String>,
}

pub(crate) fn parse_observation(raw: &str) -> Result<Observation, CollaboratorError> {
    let value = extract_json_object(raw)?;
    let analysis: RawAnalysis = serde_json::from_value(value)
        .map_err(|e| CollaboratorError::Malformed(format!("analysis: {}", e)))?;
    let emotion = analysis
        .emotional_state
        .as_deref()
        .and_then(EmotionalState::from_label)
        .ok_or_else(|| {
            CollaboratorError::Malformed(format!(
                "unknown emotional_state {:?}",
                analysis.emotional_state
            ))
        })?;
    let style = analysis
        .argument_style
        .as_deref()
        .and_then(ArgumentStyle::from_label)
        .ok_or_else(|| {
            CollaboratorError::Malformed(format!(
                "unknown argument_style {:?}",
                analysis.argument_style
            ))
        })?;
    Ok(Observation {
        emotion,
        style,
        weaknesses: analysis.weaknesses,
        beliefs: analysis.beliefs,
    })
}

#[async_trait]
impl StyleClassifier for LlmStyleClassifier {
    async fn classify(
        &self,
        utterance: &str,
        _context: &DialogueState,
    ) -> Result<Observation, CollaboratorError> {
        let messages = self.build_messages(utterance);
        let response = self.llm.invoke(&messages).await?;
        parse_observation(&response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use crate::scoring::Criterion;

    fn state() -> DialogueState {
        let mut s = DialogueState::new("AI should be widely adopted in college education");
        s.push(Speaker::Con, "AI cannot replace mentors.").unwrap();
        s
    }

    #[test]
    fn parse_candidates_reads_numbered_lines() {
        let content = "CANDIDATE 1: First reply.\ncandidate 2: \"Second reply.\"\nnoise\nCANDIDATE 3: Third.";
        assert_eq!(
            parse_candidates(content, 2),
            vec!["First reply.".to_string(), "Second reply.".to_string()]
        );
    }

    #[test]
    fn parse_candidates_falls_back_to_whole_content() {
        assert_eq!(parse_candidates("  just one answer ", 3), vec!["just one answer"]);
        assert!(parse_candidates("   ", 3).is_empty());
    }

    #[test]
    fn talking_points_rotate_with_transcript_length() {
        let gen = LlmGenerator::new(Arc::new(MockLlm::with_content("x"))).with_knowledge(
            Speaker::Pro,
            vec!["a".into(), "b".into(), "c".into()],
        );
        let empty = DialogueState::new("t");
        assert_eq!(gen.talking_points(Speaker::Pro, &empty), vec!["a", "b"]);
        assert_eq!(gen.talking_points(Speaker::Pro, &state()), vec!["b", "c"]);
        assert!(gen.talking_points(Speaker::Con, &empty).is_empty());
    }

    #[test]
    fn generation_prompt_carries_guidance_and_count() {
        let gen = LlmGenerator::new(Arc::new(MockLlm::with_content("x")));
        let ctx = state();
        let messages = gen.build_messages(&GenerationRequest {
            context: &ctx,
            speaker: Speaker::Pro,
            n: 2,
            guidance: Some("Opponent appears frustrated."),
        });
        let user = messages[1].content();
        assert!(user.contains("AI cannot replace mentors."));
        assert!(user.contains("Opponent appears frustrated."));
        assert!(user.contains("CANDIDATE 2"));
    }

    #[tokio::test]
    async fn generator_returns_parsed_candidates() {
        let llm = MockLlm::with_content("CANDIDATE 1: Tutoring never sleeps.\nCANDIDATE 2: Grading time drops.");
        let gen = LlmGenerator::new(Arc::new(llm));
        let ctx = state();
        let out = gen
            .generate(GenerationRequest {
                context: &ctx,
                speaker: Speaker::Pro,
                n: 2,
                guidance: None,
            })
            .await
            .unwrap();
        assert_eq!(out, vec!["Tutoring never sleeps.", "Grading time drops."]);
    }

    #[test]
    fn extract_json_object_handles_fences_and_prose() {
        let raw = "Sure!\n```json\n{\"logic\": 8, \"evidence\": 6, \"persuasiveness\": 7}\n```";
        let v = extract_json_object(raw).unwrap();
        assert_eq!(v["logic"], 8);
        assert!(extract_json_object("no json here").is_err());
    }

    #[tokio::test]
    async fn scorer_rescales_ratings() {
        let llm = MockLlm::with_content(r#"{"logic": 8, "evidence": "6", "persuasiveness": 12}"#);
        let scorer = LlmScorer::new(Arc::new(llm));
        let s = scorer.evaluate("reply", &state()).await.unwrap();
        assert!((s.get(Criterion::Logic) - 0.8).abs() < 1e-9);
        assert!((s.get(Criterion::Evidence) - 0.6).abs() < 1e-9);
        assert_eq!(s.get(Criterion::Persuasiveness), 1.0);
    }

    #[tokio::test]
    async fn scorer_reports_malformed_output() {
        let scorer = LlmScorer::new(Arc::new(MockLlm::with_content("I liked it a lot")));
        let err = scorer.evaluate("reply", &state()).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Malformed(_)));
    }

    #[tokio::test]
    async fn scorer_maps_llm_failure_to_failed() {
        let scorer = LlmScorer::new(Arc::new(MockLlm::strict()));
        let err = scorer.evaluate("reply", &state()).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Failed(_)));
    }

    #[test]
    fn parse_observation_maps_labels() {
        let raw = r#"{"beliefs":["AI is biased"],"emotional_state":"angry","argument_style":"technical","weaknesses":["no numbers"]}"#;
        let obs = parse_observation(raw).unwrap();
        assert_eq!(obs.emotion, EmotionalState::Frustrated);
        assert_eq!(obs.style, ArgumentStyle::Evidence);
        assert_eq!(obs.weaknesses, vec!["no numbers".to_string()]);
        assert_eq!(obs.beliefs, vec!["AI is biased".to_string()]);
    }

    #[test]
    fn parse_observation_rejects_unknown_state() {
        let raw = r#"{"emotional_state":"sleepy","argument_style":"direct"}"#;
        assert!(matches!(parse_observation(raw), Err(CollaboratorError::Malformed(_))));
    }
}
