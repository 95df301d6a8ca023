//! The per-post enrichment workflow.
//!
//! Each post goes through Extract -> Geocode -> Filter -> Score, strictly in
//! input order and one post at a time. A post with no rooftop coordinates is
//! discarded before scoring; every other post is appended to the
//! accumulator. The accumulator is snapshotted every `checkpoint_interval`
//! processed posts and once more at the end of the run.
//!
//! Failure policy:
//!
//! - extraction and scoring never fail a post (see [`LocationExtractor`] and
//!   [`PostScorer`] fallbacks);
//! - a geocoding lookup failure follows [`GeocodeFailurePolicy`];
//! - snapshot writes are best effort: a failed write is logged and the
//!   in-memory results carry over to the next attempt.
use crate::config::{CompletionConfig, Credentials, RunConfig};
use crate::extract::LocationExtractor;
use crate::geocode::{Geocoder, GoogleGeocodingClient};
use crate::lm::{ChatCompletionClient, CommandCompletion, CompletionService};
use crate::post::{EnrichedPost, Post};
use crate::score::{PostScorer, Score};
use crate::store::ArtifactStore;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to do when a geocoding lookup fails outright (network, bad body).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeFailurePolicy {
    /// Log and treat the candidate as having no coordinates.
    #[default]
    SkipCandidate,
    /// Stop the run with the error. No final snapshot is written.
    Abort,
}

/// Per-run knobs the pipeline reads while processing.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub checkpoint_interval: usize,
    pub region: Option<String>,
    pub language: String,
    pub geocode_failure: GeocodeFailurePolicy,
}

impl From<&RunConfig> for PipelineSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            checkpoint_interval: config.checkpoint_interval,
            region: config.region.clone(),
            language: config.language.clone(),
            geocode_failure: config.geocode_failure,
        }
    }
}

/// Retained posts in input order.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    posts: Vec<EnrichedPost>,
}

impl ResultAccumulator {
    pub fn push(&mut self, post: EnrichedPost) {
        self.posts.push(post);
    }

    pub fn posts(&self) -> &[EnrichedPost] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn into_posts(self) -> Vec<EnrichedPost> {
        self.posts
    }
}

/// Counters and artifact paths for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub retained: usize,
    pub discarded: usize,
    /// Retained posts whose score is a fallback value.
    pub fallback_scores: usize,
    /// Candidates skipped because their geocoding lookup failed.
    pub geocode_failures: usize,
    pub checkpoints: Vec<PathBuf>,
    pub checkpoint_failures: usize,
    /// `None` when the final snapshot could not be written.
    pub final_artifact: Option<PathBuf>,
}

#[derive(Debug)]
pub struct RunOutput {
    pub posts: Vec<EnrichedPost>,
    pub summary: RunSummary,
}

pub struct EnrichmentPipeline {
    extractor: LocationExtractor,
    geocoder: Geocoder,
    scorer: PostScorer,
    settings: PipelineSettings,
    store: ArtifactStore,
}

impl EnrichmentPipeline {
    pub fn new(
        extractor: LocationExtractor,
        geocoder: Geocoder,
        scorer: PostScorer,
        settings: PipelineSettings,
        store: ArtifactStore,
    ) -> Result<Self> {
        if settings.checkpoint_interval == 0 {
            return Err(anyhow!("checkpoint interval must be at least 1"));
        }
        Ok(Self {
            extractor,
            geocoder,
            scorer,
            settings,
            store,
        })
    }

    /// Build a pipeline backed by the live services named in `config`.
    pub fn from_config(
        config: &RunConfig,
        credentials: &Credentials,
        store: ArtifactStore,
    ) -> Result<Self> {
        let completion_key = credentials.completion_api_key.as_deref();
        let extractor =
            LocationExtractor::new(completion_service(&config.completion, completion_key)?);
        let scorer = PostScorer::new(completion_service(&config.completion, completion_key)?);
        let geocoder = Geocoder::new(Box::new(GoogleGeocodingClient::new(
            credentials.maps_api_key.clone(),
            &config.geocode.endpoint,
            config.geocode.timeout(),
        )));
        Self::new(
            extractor,
            geocoder,
            scorer,
            PipelineSettings::from(config),
            store,
        )
    }

    /// Process every post, checkpointing along the way, then write the final
    /// snapshot. Only an aborting geocode failure makes this return `Err`.
    pub fn run(&self, posts: Vec<Post>) -> Result<RunOutput> {
        let interval = self.settings.checkpoint_interval;
        let total = posts.len();
        let mut accumulator = ResultAccumulator::default();
        let mut summary = RunSummary::default();

        for (index, post) in posts.into_iter().enumerate() {
            tracing::info!(index = index + 1, total, post_id = %post.id, "processing post");
            match self.process_post(post, &mut summary)? {
                Some(enriched) => {
                    summary.retained += 1;
                    accumulator.push(enriched);
                }
                None => summary.discarded += 1,
            }
            summary.processed += 1;

            if summary.processed % interval == 0 {
                let checkpoint = summary.processed / interval;
                match self.store.write_checkpoint(checkpoint, accumulator.posts()) {
                    Ok(path) => {
                        tracing::info!(
                            processed = summary.processed,
                            valid = accumulator.len(),
                            path = %path.display(),
                            "checkpoint saved"
                        );
                        summary.checkpoints.push(path);
                    }
                    Err(err) => {
                        summary.checkpoint_failures += 1;
                        tracing::warn!(
                            processed = summary.processed,
                            valid = accumulator.len(),
                            error = %format!("{err:#}"),
                            "checkpoint write failed"
                        );
                    }
                }
            }
        }

        match self.store.write_final(accumulator.posts()) {
            Ok(path) => {
                tracing::info!(
                    valid = accumulator.len(),
                    path = %path.display(),
                    "final results saved"
                );
                summary.final_artifact = Some(path);
            }
            Err(err) => {
                tracing::warn!(
                    valid = accumulator.len(),
                    error = %format!("{err:#}"),
                    "final results write failed"
                );
            }
        }

        Ok(RunOutput {
            posts: accumulator.into_posts(),
            summary,
        })
    }

    fn process_post(&self, post: Post, summary: &mut RunSummary) -> Result<Option<EnrichedPost>> {
        let candidates = self.extractor.extract(&post);
        tracing::info!(post_id = %post.id, candidates = ?candidates, "candidate places");

        let mut locations = Vec::new();
        for candidate in &candidates {
            match self.geocoder.resolve(
                candidate,
                self.settings.region.as_deref(),
                &self.settings.language,
            ) {
                Ok(records) => locations.extend(records),
                Err(err) => match self.settings.geocode_failure {
                    GeocodeFailurePolicy::SkipCandidate => {
                        summary.geocode_failures += 1;
                        tracing::warn!(
                            post_id = %post.id,
                            candidate = %candidate,
                            error = %format!("{err:#}"),
                            "geocode lookup failed; skipping candidate"
                        );
                    }
                    GeocodeFailurePolicy::Abort => {
                        return Err(err.context(format!(
                            "geocode {candidate:?} for post {}",
                            post.id
                        )));
                    }
                },
            }
        }

        if locations.is_empty() {
            tracing::debug!(post_id = %post.id, "no rooftop locations; discarding post");
            return Ok(None);
        }

        let score = self.scorer.score(&post, &locations);
        if !matches!(score, Score::Parsed(_)) {
            summary.fallback_scores += 1;
        }
        tracing::debug!(
            post_id = %post.id,
            locations = locations.len(),
            score = score.value(),
            "post retained"
        );
        Ok(EnrichedPost::new(post, locations, score.value()))
    }
}

fn completion_service(
    config: &CompletionConfig,
    api_key: Option<&str>,
) -> Result<Box<dyn CompletionService>> {
    if let Some(command) = config.command.as_deref() {
        return Ok(Box::new(CommandCompletion::new(command)?));
    }
    let api_key =
        api_key.ok_or_else(|| anyhow!("completion API key is required for the HTTP backend"))?;
    Ok(Box::new(ChatCompletionClient::new(
        api_key.to_string(),
        &config.base_url,
        config.model.clone(),
        config.timeout(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_backend_requires_completion_key() {
        let config = RunConfig::default();
        let credentials = Credentials {
            maps_api_key: "maps".to_string(),
            completion_api_key: None,
        };
        let store = ArtifactStore::new(".", "processed_posts");
        assert!(EnrichmentPipeline::from_config(&config, &credentials, store).is_err());
    }

    #[test]
    fn command_backend_needs_no_completion_key() {
        let mut config = RunConfig::default();
        config.completion.command = Some("cat".to_string());
        let credentials = Credentials {
            maps_api_key: "maps".to_string(),
            completion_api_key: None,
        };
        let store = ArtifactStore::new(".", "processed_posts");
        assert!(EnrichmentPipeline::from_config(&config, &credentials, store).is_ok());
    }

    #[test]
    fn accumulator_preserves_push_order() {
        use crate::post::{CoordinateRecord, LocationPrecision};
        let record = CoordinateRecord {
            formatted_address: "a".to_string(),
            lat: 0.0,
            lng: 0.0,
            place_id: "p".to_string(),
            location_type: LocationPrecision::Rooftop,
        };
        let mut accumulator = ResultAccumulator::default();
        assert!(accumulator.is_empty());
        for id in ["x", "y", "z"] {
            accumulator.push(
                EnrichedPost::new(Post::new(id, "", ""), vec![record.clone()], 50)
                    .expect("enriched"),
            );
        }
        let ids: Vec<_> = accumulator
            .into_posts()
            .into_iter()
            .map(|post| post.post.id)
            .collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }
}
