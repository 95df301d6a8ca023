//! Post records as exported by the scraper, plus the enriched output shape.
//!
//! Posts are read from a JSON array and written back out with two extra
//! fields. Fields the pipeline does not use are kept in `extra` so the
//! enriched output is a superset of the input record.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Precision classification reported by the geocoding service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationPrecision {
    Rooftop,
    RangeInterpolated,
    GeometricCenter,
    Approximate,
    #[serde(other)]
    Unknown,
}

impl LocationPrecision {
    /// Only rooftop matches pin a specific venue.
    pub fn is_finest(&self) -> bool {
        matches!(self, LocationPrecision::Rooftop)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LocationPrecision::Rooftop => "ROOFTOP",
            LocationPrecision::RangeInterpolated => "RANGE_INTERPOLATED",
            LocationPrecision::GeometricCenter => "GEOMETRIC_CENTER",
            LocationPrecision::Approximate => "APPROXIMATE",
            LocationPrecision::Unknown => "UNKNOWN",
        }
    }
}

/// Engagement counter as exported; some sources emit strings like "1.2w".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Counter {
    Count(Number),
    Text(String),
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counter::Count(value) => write!(f, "{value}"),
            Counter::Text(value) => write!(f, "{value}"),
        }
    }
}

/// Tag list, either a JSON array or a single comma-joined string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tags {
    List(Vec<String>),
    Joined(String),
}

impl Tags {
    pub fn joined(&self) -> String {
        match self {
            Tags::List(tags) => tags.join(", "),
            Tags::Joined(tags) => tags.clone(),
        }
    }
}

/// A scraped post. Immutable input to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "note_id")]
    pub id: String,
    pub title: String,
    #[serde(rename = "desc")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_list: Option<Tags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked_count: Option<Counter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_count: Option<Counter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<Counter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_count: Option<Counter>,
    /// Fields the pipeline does not interpret, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    /// Minimal post used by callers that build records in code.
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            tag_list: None,
            source_keyword: None,
            liked_count: None,
            collected_count: None,
            comment_count: None,
            share_count: None,
            extra: Map::new(),
        }
    }

    pub fn tags_text(&self) -> String {
        self.tag_list.as_ref().map(Tags::joined).unwrap_or_default()
    }

    pub fn source_keyword_text(&self) -> &str {
        self.source_keyword.as_deref().unwrap_or("")
    }

    /// Engagement counters in prompt order: likes, collects, comments, shares.
    /// Missing counters render as "0".
    pub fn engagement(&self) -> [String; 4] {
        [
            &self.liked_count,
            &self.collected_count,
            &self.comment_count,
            &self.share_count,
        ]
        .map(|counter| {
            counter
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "0".to_string())
        })
    }
}

/// A geocoded venue at rooftop precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRecord {
    pub formatted_address: String,
    pub lat: f64,
    pub lng: f64,
    pub place_id: String,
    pub location_type: LocationPrecision,
}

/// A post that resolved to at least one location, with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPost {
    #[serde(flatten)]
    pub post: Post,
    pub locations: Vec<CoordinateRecord>,
    pub score: u8,
}

impl EnrichedPost {
    /// Returns `None` when there are no locations; such posts are never kept.
    ///
    /// Stale `locations` or `score` keys carried in `extra` (a processed
    /// snapshot fed back in as input) are replaced by the new values.
    pub fn new(mut post: Post, locations: Vec<CoordinateRecord>, score: u8) -> Option<Self> {
        if locations.is_empty() {
            return None;
        }
        post.extra.remove("locations");
        post.extra.remove("score");
        Some(Self {
            post,
            locations,
            score,
        })
    }
}
