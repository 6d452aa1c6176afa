//! Interfaces to the external collaborators of the map manager.
//!
//! The map widget, the page, the post intersection observer and the loader
//! of track data are all owned by the host. Rendered routes and markers are
//! handed out as opaque handles which are owned by exactly one track or post.

use std::time::Duration;

use futures::future::{AbortHandle, BoxFuture};

use crate::config::ControlLabels;
use crate::{Bounds, GpsPoint, Result};

/// Handle of a rendered route on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

/// Handle of a post marker on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(pub u64);

/// Identity of a post element in the post list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u64);

/// Marker image with its display size in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Icon {
    pub url: String,
    pub width: f64,
    pub height: f64,
}

/// Animation parameters for panning the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanOptions {
    pub animate: bool,
    pub duration: Duration,
    pub ease_linearity: f64,
}

impl Default for PanOptions {
    fn default() -> Self {
        Self {
            animate: true,
            duration: Duration::from_millis(1500),
            ease_linearity: 0.3,
        }
    }
}

/// Options applied when the map is set up.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceOptions {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub labels: ControlLabels,
}

/// Route geometry and style handed to the map for rendering.
#[derive(Debug, Clone, Copy)]
pub struct RouteStyle<'a> {
    pub lines: &'a [Vec<GpsPoint>],
    pub color: &'a str,
    pub tooltip: &'a str,
}

/// Options of a newly created post marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOptions {
    pub position: GpsPoint,
    pub title: String,
    pub rise_on_hover: bool,
}

/// The map widget.
///
/// Handles are created detached. All methods are called from the single
/// thread that also delivers map events.
pub trait MapSurface {
    /// Apply zoom limits and install the localized zoom/fullscreen/scale controls.
    fn configure(&mut self, options: &SurfaceOptions);
    fn fit_bounds(&mut self, bounds: Bounds);

    fn zoom(&self) -> u8;
    fn set_zoom(&mut self, zoom: u8);
    fn bounds(&self) -> Bounds;
    fn pan_to(&mut self, target: GpsPoint, options: PanOptions);
    fn is_fullscreen(&self) -> bool;
    fn set_scroll_wheel_zoom(&mut self, enabled: bool);

    fn create_route_layer(&mut self, style: RouteStyle<'_>) -> LayerId;
    fn attach_layer(&mut self, layer: LayerId);
    fn detach_layer(&mut self, layer: LayerId);

    fn create_marker(&mut self, options: MarkerOptions) -> MarkerId;
    fn set_marker_position(&mut self, marker: MarkerId, position: GpsPoint);
    fn set_marker_icon(&mut self, marker: MarkerId, icon: &Icon);
    fn set_marker_z_offset(&mut self, marker: MarkerId, offset: i32);
    fn attach_marker(&mut self, marker: MarkerId);
    fn detach_marker(&mut self, marker: MarkerId);

    /// Release the widget. No other method is called afterwards.
    fn release(&mut self);
}

/// The page hosting the map.
pub trait Page {
    /// Full page navigation.
    fn navigate(&mut self, url: &str);
    /// Start loading an image without waiting for it.
    fn preload_image(&mut self, url: &str);
    /// Current rendered height of the map in pixels.
    fn map_height(&self) -> f64;
}

/// Options of the post intersection observer.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverOptions {
    /// Top margin of the observed region, negative to exclude the map above it.
    pub root_margin_top: f64,
    pub thresholds: Vec<f64>,
}

/// Viewport intersection watcher for post anchors.
///
/// Changes are delivered back as [`crate::MapEvent::PostVisibility`].
pub trait VisibilityObserver {
    /// Replace the observer with a fresh one using `options`. Nothing is observed afterwards.
    fn reset(&mut self, options: ObserverOptions);
    fn observe(&mut self, anchor: AnchorId);
    fn disconnect(&mut self);
}

/// Starts the asynchronous loads of a map manager.
///
/// Completions are delivered back as [`crate::LoadEvent`]s.
pub trait TrackLoader {
    /// Fetch and extract the low resolution archive. Aborting the returned
    /// handle stops the load without any completion being delivered.
    fn fetch_archive(&mut self, url: &str) -> AbortHandle;
    /// Hand low resolution data back for parsing on a later turn of the event loop.
    fn schedule_low_res(&mut self, track_number: usize, data: Vec<u8>);
    /// Fetch the high resolution track at `path`.
    fn fetch_high_res(&mut self, track_number: usize, path: &str);
}

/// Source of raw bytes by path or URL.
pub trait Fetch: Send + Sync {
    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// The host-owned collaborators of one map manager.
pub struct Collaborators {
    pub page: Box<dyn Page>,
    pub observer: Box<dyn VisibilityObserver>,
    pub loader: Box<dyn TrackLoader>,
    /// Tag carried by load events addressed to this manager.
    pub generation: u64,
}
