//! Deterministic stand-ins for the completion and geocoding services.

use anyhow::{anyhow, Result};
use post_geotag::extract::LocationExtractor;
use post_geotag::geocode::{GeocodeQuery, GeocodeResponse, Geocoder, GeocodingService};
use post_geotag::lm::{CompletionRequest, CompletionService};
use post_geotag::score::PostScorer;
use post_geotag::store::ArtifactStore;
use post_geotag::{EnrichmentPipeline, GeocodeFailurePolicy, PipelineSettings, Post};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Shared log of prompts a stub received.
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Completion stub that answers by post title. Titles without an entry get
/// `fallback`; `None` replies simulate a failed call.
pub struct TitleKeyed {
    replies: BTreeMap<String, Option<String>>,
    fallback: Option<String>,
    calls: CallLog,
}

impl TitleKeyed {
    pub fn new(fallback: Option<&str>) -> Self {
        Self {
            replies: BTreeMap::new(),
            fallback: fallback.map(str::to_string),
            calls: CallLog::default(),
        }
    }

    pub fn reply(mut self, title: &str, reply: Option<&str>) -> Self {
        self.replies
            .insert(title.to_string(), reply.map(str::to_string));
        self
    }

    pub fn calls(&self) -> CallLog {
        Rc::clone(&self.calls)
    }
}

impl CompletionService for TitleKeyed {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        self.calls.borrow_mut().push(request.prompt.to_string());
        let reply = self
            .replies
            .iter()
            .find(|(title, _)| {
                request.prompt.contains(&format!("Post title: {title}\n"))
                    || request.prompt.contains(&format!("Title: {title}\n"))
            })
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.fallback.clone());
        reply.ok_or_else(|| anyhow!("completion service unavailable"))
    }
}

/// Geocoding stub keyed by address. Unknown addresses return `ZERO_RESULTS`.
#[derive(Default)]
pub struct StubGeocoding {
    responses: BTreeMap<String, Value>,
    failing: Vec<String>,
    calls: CallLog,
}

impl StubGeocoding {
    pub fn place(mut self, address: &str, matches: Vec<Value>) -> Self {
        self.responses.insert(
            address.to_string(),
            json!({"status": "OK", "results": matches}),
        );
        self
    }

    pub fn failing(mut self, address: &str) -> Self {
        self.failing.push(address.to_string());
        self
    }

    pub fn calls(&self) -> CallLog {
        Rc::clone(&self.calls)
    }
}

impl GeocodingService for StubGeocoding {
    fn lookup(&self, query: &GeocodeQuery<'_>) -> Result<GeocodeResponse> {
        self.calls.borrow_mut().push(query.address.to_string());
        if self.failing.iter().any(|address| address == query.address) {
            return Err(anyhow!("connection reset by peer"));
        }
        let body = self
            .responses
            .get(query.address)
            .cloned()
            .unwrap_or_else(|| json!({"status": "ZERO_RESULTS", "results": []}));
        Ok(serde_json::from_value(body)?)
    }
}

pub fn geocode_match(address: &str, location_type: &str) -> Value {
    json!({
        "formatted_address": address,
        "geometry": {
            "location": {"lat": 47.6101, "lng": -122.2015},
            "location_type": location_type
        },
        "place_id": format!("place:{address}")
    })
}

pub fn post(id: &str, title: &str) -> Post {
    Post::new(id, title, format!("body of {title}"))
}

pub fn settings(
    checkpoint_interval: usize,
    geocode_failure: GeocodeFailurePolicy,
) -> PipelineSettings {
    PipelineSettings {
        checkpoint_interval,
        region: Some("us".to_string()),
        language: "en".to_string(),
        geocode_failure,
    }
}

pub fn pipeline(
    extract: TitleKeyed,
    geocoding: StubGeocoding,
    score: TitleKeyed,
    settings: PipelineSettings,
    store: ArtifactStore,
) -> EnrichmentPipeline {
    EnrichmentPipeline::new(
        LocationExtractor::new(Box::new(extract)),
        Geocoder::new(Box::new(geocoding)),
        PostScorer::new(Box::new(score)),
        settings,
        store,
    )
    .expect("build pipeline")
}
