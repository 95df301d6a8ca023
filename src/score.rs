//! Post quality scoring.
use crate::lm::{fill_template, json_span, CompletionRequest, CompletionService};
use crate::post::{CoordinateRecord, Post};
use serde_json::Value;

const SCORE_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/score_post.md"
));

pub const SCORE_SYSTEM_ROLE: &str =
    "You are a professional food and travel content rater. Output JSON only.";

/// Score assigned when the model answered but no score could be read.
pub const UNPARSABLE_SCORE: u8 = 70;
/// Score assigned when the completion call itself failed.
pub const CALL_FAILED_SCORE: u8 = 60;

/// How a score was obtained. The two fallbacks carry distinct values so the
/// output still tells "model answered badly" apart from "model unreachable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Parsed(u8),
    Unparsable,
    CallFailed,
}

impl Score {
    pub fn value(self) -> u8 {
        match self {
            Score::Parsed(value) => value,
            Score::Unparsable => UNPARSABLE_SCORE,
            Score::CallFailed => CALL_FAILED_SCORE,
        }
    }
}

/// Rates a post given its content, engagement and resolved locations.
pub struct PostScorer {
    lm: Box<dyn CompletionService>,
}

impl PostScorer {
    pub fn new(lm: Box<dyn CompletionService>) -> Self {
        Self { lm }
    }

    pub fn score(&self, post: &Post, coordinates: &[CoordinateRecord]) -> Score {
        let prompt = build_score_prompt(post, coordinates);
        tracing::debug!(post_id = %post.id, prompt = %prompt, "scoring prompt");

        let response = match self.lm.complete(&CompletionRequest {
            system: SCORE_SYSTEM_ROLE,
            prompt: &prompt,
        }) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    post_id = %post.id,
                    error = %format!("{err:#}"),
                    "scoring call failed"
                );
                return Score::CallFailed;
            }
        };

        match parse_score(&response) {
            Some(value) => Score::Parsed(value),
            None => {
                tracing::warn!(post_id = %post.id, raw = %response, "unparsable scoring response");
                Score::Unparsable
            }
        }
    }
}

fn build_score_prompt(post: &Post, coordinates: &[CoordinateRecord]) -> String {
    let addresses = coordinates
        .iter()
        .map(|record| record.formatted_address.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let points = coordinates
        .iter()
        .map(|record| format!("{}, {}", record.lat, record.lng))
        .collect::<Vec<_>>()
        .join(", ");
    let [liked, collected, comments, shares] = post.engagement();

    fill_template(
        SCORE_PROMPT,
        &[
            ("title", post.title.as_str()),
            ("body", post.body.as_str()),
            ("addresses", addresses.as_str()),
            ("coordinates", points.as_str()),
            ("liked_count", liked.as_str()),
            ("collected_count", collected.as_str()),
            ("comment_count", comments.as_str()),
            ("share_count", shares.as_str()),
        ],
    )
}

/// Reads a numeric `score` from the first `{...}` span, rounded and clamped
/// to 0..=100.
fn parse_score(response: &str) -> Option<u8> {
    let span = json_span(response, '{', '}')?;
    let object: Value = serde_json::from_str(span).ok()?;
    let raw = object.get("score")?.as_f64()?;
    if !raw.is_finite() {
        return None;
    }
    // Clamped into u8 range first, so the cast cannot truncate.
    Some(raw.round().clamp(0.0, 100.0) as u8)
}
