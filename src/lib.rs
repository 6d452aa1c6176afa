//! # Track Map
//!
//! Interactive map controller for a travel blog: GPS tracks and the photo
//! posts taken along them are rendered on a map, the tracks are revealed one
//! after another in an overview animation, track resolution follows the zoom
//! level and the map follows the post list while the reader scrolls.
//!
//! This library provides:
//! - Track archive loading (gzip + tar) with cancellation
//! - A per-track low/high resolution display state machine
//! - Zoom-dependent post markers that fan out co-located posts
//! - The [`MapManager`] orchestrating zoom, pan, fullscreen and visibility events
//!
//! The map widget, the page and the intersection observer are external
//! collaborators reached through the traits in [`surface`].
//!
//! ## Features
//!
//! - **`http`** - Enable the `reqwest` based fetcher for archives and tracks
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use track_map::{scale_factor, spread_factor, ZoomConfig};
//!
//! let zoom = ZoomConfig::default();
//!
//! // Markers grow with the zoom level and converge on their true location
//! assert!(scale_factor(zoom.max_zoom, &zoom) > scale_factor(zoom.min_zoom, &zoom));
//! assert!(spread_factor(zoom.max_zoom, &zoom) < spread_factor(zoom.min_zoom, &zoom));
//! ```

use std::fmt;

use serde::Deserialize;

pub mod archive;
pub mod config;
pub mod error;
pub mod geo_utils;
pub mod manager;
pub mod manifest;
pub mod observer;
pub mod post;
pub mod route;
pub mod runtime;
pub mod session;
pub mod surface;
pub mod track;

// HTTP module for track fetching
#[cfg(feature = "http")]
pub mod http;

#[cfg(test)]
mod test_support;

pub use archive::{extract_archive, load_archive, ArchiveEntry};
pub use config::{MapConfig, PageConfig, ZoomConfig};
pub use error::{MapError, Result};
pub use manager::{LoadEvent, MapEvent, MapManager};
pub use manifest::{parse_manifest, PostDataset, PostRecord, TrackManifest};
pub use observer::{select_max_visible, AutoplayGate, IntersectionEntry};
pub use post::{scale_factor, spread_factor, Post};
pub use route::{ParsedRoute, RouteLayer};
pub use runtime::{run, ChannelLoader, FsFetcher};
pub use session::MapSession;
pub use surface::{
    AnchorId, Collaborators, Fetch, Icon, LayerId, MapSurface, MarkerId, Page, PanOptions,
    TrackLoader, VisibilityObserver,
};
pub use track::{DisplayState, GpxTrack};

#[cfg(feature = "http")]
pub use http::HttpFetcher;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// Deserializes from the `[lat, lng]` arrays embedded in the page.
///
/// # Example
/// ```
/// use track_map::GpsPoint;
/// let point = GpsPoint::new(-16.5, -68.15); // La Paz
/// assert_eq!(point.to_string(), "LatLng(-16.5, -68.15)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f64; 2]")]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Offset this point by `offset` scaled with `factor`.
    pub fn offset_by(&self, offset: &GpsPoint, factor: f64) -> GpsPoint {
        GpsPoint::new(
            self.latitude + offset.latitude * factor,
            self.longitude + offset.longitude * factor,
        )
    }
}

impl From<[f64; 2]> for GpsPoint {
    fn from([latitude, longitude]: [f64; 2]) -> Self {
        Self { latitude, longitude }
    }
}

/// Formats like the map widget's coordinate labels, with six decimals at most.
impl fmt::Display for GpsPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let round = |v: f64| (v * 1e6).round() / 1e6;
        write!(f, "LatLng({}, {})", round(self.latitude), round(self.longitude))
    }
}

/// Geographic rectangle, used for route extents and the map viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from two opposite corners in any order.
    pub fn from_corners(a: GpsPoint, b: GpsPoint) -> Self {
        Self {
            min_lat: a.latitude.min(b.latitude),
            max_lat: a.latitude.max(b.latitude),
            min_lng: a.longitude.min(b.longitude),
            max_lng: a.longitude.max(b.longitude),
        }
    }

    /// Whether the two rectangles share at least one point. Touching edges count.
    ///
    /// ```
    /// use track_map::Bounds;
    /// let a = Bounds { min_lat: 0.0, max_lat: 1.0, min_lng: 0.0, max_lng: 1.0 };
    /// let b = Bounds { min_lat: 1.0, max_lat: 2.0, min_lng: 0.5, max_lng: 3.0 };
    /// assert!(a.intersects(&b));
    /// ```
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
            && self.min_lng <= other.max_lng
            && other.min_lng <= self.max_lng
    }

    /// Grow the bounds to include `other`.
    pub fn extend(&mut self, other: &Bounds) {
        self.min_lat = self.min_lat.min(other.min_lat);
        self.max_lat = self.max_lat.max(other.max_lat);
        self.min_lng = self.min_lng.min(other.min_lng);
        self.max_lng = self.max_lng.max(other.max_lng);
    }
}

// ============================================================================
// Tests
// ============================================================================
