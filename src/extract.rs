//! Candidate place extraction from post text.
use crate::lm::{fill_template, json_span, CompletionRequest, CompletionService};
use crate::post::Post;
use serde_json::Value;

const EXTRACT_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/extract_locations.md"
));

pub const EXTRACT_SYSTEM_ROLE: &str =
    "You are a precise place-name extraction assistant. Output JSON only.";

/// Asks the completion service for place names mentioned in a post.
pub struct LocationExtractor {
    lm: Box<dyn CompletionService>,
}

impl LocationExtractor {
    pub fn new(lm: Box<dyn CompletionService>) -> Self {
        Self { lm }
    }

    /// Candidate places for `post`, in the order the model listed them.
    ///
    /// Never fails: a call failure or an unusable response yields no
    /// candidates and is logged.
    pub fn extract(&self, post: &Post) -> Vec<String> {
        let prompt = build_extract_prompt(post);
        tracing::debug!(post_id = %post.id, prompt = %prompt, "extraction prompt");

        let response = match self.lm.complete(&CompletionRequest {
            system: EXTRACT_SYSTEM_ROLE,
            prompt: &prompt,
        }) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    post_id = %post.id,
                    error = %format!("{err:#}"),
                    "location extraction call failed"
                );
                return Vec::new();
            }
        };

        match parse_candidates(&response) {
            Some(candidates) => candidates,
            None => {
                tracing::warn!(
                    post_id = %post.id,
                    raw = %response,
                    "no JSON array in extraction response"
                );
                Vec::new()
            }
        }
    }
}

fn build_extract_prompt(post: &Post) -> String {
    let tags = post.tags_text();
    fill_template(
        EXTRACT_PROMPT,
        &[
            ("title", post.title.as_str()),
            ("body", post.body.as_str()),
            ("tags", tags.as_str()),
            ("source_keyword", post.source_keyword_text()),
        ],
    )
}

/// Returns `None` when the response holds no parseable JSON array.
fn parse_candidates(response: &str) -> Option<Vec<String>> {
    let span = json_span(response, '[', ']')?;
    let items: Vec<Value> = serde_json::from_str(span).ok()?;

    let mut candidates = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(text) if !text.trim().is_empty() => {
                candidates.push(text.trim().to_string())
            }
            Value::String(_) => {}
            other => tracing::debug!(item = %other, "skipping non-string candidate"),
        }
    }
    Some(candidates)
}
