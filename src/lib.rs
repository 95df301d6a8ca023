//! Geotag social-media posts with rooftop coordinates and a quality score.
//!
//! The [`pipeline::EnrichmentPipeline`] drives three collaborators per post:
//! a [`extract::LocationExtractor`] that asks a language model for place
//! names, a [`geocode::Geocoder`] that resolves them, and a
//! [`score::PostScorer`] that rates posts with at least one location.
pub mod config;
pub mod extract;
pub mod geocode;
pub mod lm;
pub mod pipeline;
pub mod post;
pub mod score;
pub mod store;

pub use config::{Credentials, RunConfig};
pub use pipeline::{
    EnrichmentPipeline, GeocodeFailurePolicy, PipelineSettings, RunOutput, RunSummary,
};
pub use post::{CoordinateRecord, EnrichedPost, Post};
