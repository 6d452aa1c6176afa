//! Track manifest and post records as embedded in the page.

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Deserializer};

use crate::surface::AnchorId;
use crate::{GpsPoint, MapError, Result};

/// One entry of the embedded track manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackManifest {
    #[serde(deserialize_with = "number_or_string")]
    pub track_number: usize,
    pub color: String,
    pub vehicle: String,
    /// ISO date (`YYYY-MM-DD`) the track was recorded.
    pub date: String,
    pub highres_path: String,
    pub lowres_path: String,
}

impl TrackManifest {
    /// The date rendered with `format`, or verbatim if it is not an ISO date.
    pub fn formatted_date(&self, format: &str) -> String {
        match NaiveDate::parse_from_str(&self.date, "%Y-%m-%d") {
            Ok(date) => date.format(format).to_string(),
            Err(_) => self.date.clone(),
        }
    }
}

/// Parse the track manifest. Track numbers are expected to equal their position.
pub fn parse_manifest(json: &str) -> Result<Vec<TrackManifest>> {
    let manifest: Vec<TrackManifest> = serde_json::from_str(json)?;
    for (idx, entry) in manifest.iter().enumerate() {
        if entry.track_number != idx {
            warn!(
                "[Manifest] track {} listed at position {}, animation order follows the list",
                entry.track_number, idx
            );
        }
    }
    Ok(manifest)
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(usize),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Data attributes of a post preview element, as strings where the page stores strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDataset {
    pub track_number: String,
    /// `[lat, lng]` JSON, or empty when the post sits at its track's midpoint.
    pub lat_lng: String,
    /// `[lat, lng]` JSON offset used to fan out posts at the same location.
    pub spread_lat_lng: String,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
    pub thumbnail_width: f64,
    pub thumbnail_height: f64,
}

/// Post preview thumbnail with its natural size.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub url: String,
    pub width: f64,
    pub height: f64,
}

/// A validated post record.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub anchor: AnchorId,
    pub track_number: usize,
    /// `None` for deferred posts placed at their track's midpoint.
    pub position: Option<GpsPoint>,
    pub spread: GpsPoint,
    pub thumbnail: Thumbnail,
    pub title: String,
    pub url: String,
}

impl PostRecord {
    /// Validate the dataset of the post element identified by `anchor`.
    pub fn parse(anchor: AnchorId, dataset: &PostDataset) -> Result<Self> {
        let invalid = |reason: String| MapError::InvalidPost { anchor: anchor.0, reason };

        let track_number = dataset
            .track_number
            .trim()
            .parse()
            .map_err(|e| invalid(format!("track number '{}': {}", dataset.track_number, e)))?;

        let position = if dataset.lat_lng.trim().is_empty() {
            None
        } else {
            Some(parse_lat_lng(&dataset.lat_lng).map_err(|e| invalid(format!("latLng: {}", e)))?)
        };
        let spread = parse_lat_lng(&dataset.spread_lat_lng)
            .map_err(|e| invalid(format!("spreadLatLng: {}", e)))?;

        if !(dataset.thumbnail_width > 0.0 && dataset.thumbnail_height > 0.0) {
            return Err(invalid(format!(
                "thumbnail size {}x{}",
                dataset.thumbnail_width, dataset.thumbnail_height
            )));
        }

        Ok(Self {
            anchor,
            track_number,
            position,
            spread,
            thumbnail: Thumbnail {
                url: dataset.thumbnail_url.clone(),
                width: dataset.thumbnail_width,
                height: dataset.thumbnail_height,
            },
            title: dataset.title.clone(),
            url: dataset.url.clone(),
        })
    }

    pub fn is_deferred(&self) -> bool {
        self.position.is_none()
    }
}

fn parse_lat_lng(raw: &str) -> std::result::Result<GpsPoint, String> {
    let point: GpsPoint = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    if !point.latitude.is_finite() || !point.longitude.is_finite() {
        return Err(format!("non-finite coordinate {}", raw));
    }
    Ok(point)
}
