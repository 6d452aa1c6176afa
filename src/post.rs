//! Photo post markers.
//!
//! Marker size and position depend on the zoom level. Thumbnails grow as the
//! map zooms in, and posts sharing a location are fanned out along their
//! spread offset at low zoom, converging on the true location when zoomed in.
//! Both are precomputed for every zoom level when the post is created.

use crate::config::{MapConfig, ZoomConfig};
use crate::manifest::PostRecord;
use crate::surface::{AnchorId, Icon, MapSurface, MarkerId, MarkerOptions, Page};
use crate::GpsPoint;

/// Marker scale at `zoom`: grows quadratically from 0.05 and saturates at 1.0.
///
/// ```
/// use track_map::{scale_factor, ZoomConfig};
/// let zoom = ZoomConfig::default();
/// assert_eq!(scale_factor(zoom.min_zoom, &zoom), 0.05);
/// assert!((scale_factor(zoom.max_zoom, &zoom) - 1.0).abs() < 1e-12);
/// ```
pub fn scale_factor(zoom: u8, config: &ZoomConfig) -> f64 {
    let steps = (zoom as f64 - config.min_zoom as f64) / 5.0;
    0.05 + (steps * steps).min(0.95)
}

/// Spread multiplier at `zoom`: 3.01 at the lowest zoom, falling to 0.01 at the highest.
pub fn spread_factor(zoom: u8, config: &ZoomConfig) -> f64 {
    let range = config.max_zoom as f64 - config.min_zoom as f64;
    if range <= 0.0 {
        return 0.01;
    }
    let distance = (config.max_zoom as f64 - zoom as f64) / range;
    0.01 + distance.powi(4) * 3.0
}

/// Marker appearance at one zoom level.
#[derive(Debug, Clone, PartialEq)]
struct ZoomVariant {
    icon: Icon,
    position: GpsPoint,
}

#[derive(Debug)]
pub struct Post {
    record: PostRecord,
    zoom: ZoomConfig,
    /// Indexed by `zoom - min_zoom`.
    variants: Vec<ZoomVariant>,
    marker: MarkerId,
    position: GpsPoint,
    displayed_zoom: Option<u8>,
    visible_ratio: f64,
}

impl Post {
    /// Create the post at `location` with a detached marker and start
    /// preloading its thumbnail.
    pub fn new<M: MapSurface + ?Sized>(
        record: PostRecord,
        location: GpsPoint,
        config: &MapConfig,
        map: &mut M,
        page: &mut dyn Page,
    ) -> Self {
        let thumbnail = &record.thumbnail;
        let normalization = config.thumbnail_max_dim / thumbnail.width.max(thumbnail.height);
        let width = thumbnail.width * normalization;
        let height = thumbnail.height * normalization;

        page.preload_image(&thumbnail.url);

        let variants: Vec<ZoomVariant> = config
            .zoom
            .levels()
            .map(|zoom| {
                let scale = scale_factor(zoom, &config.zoom);
                ZoomVariant {
                    icon: Icon {
                        url: thumbnail.url.clone(),
                        width: width * scale,
                        height: height * scale,
                    },
                    position: location.offset_by(&record.spread, spread_factor(zoom, &config.zoom)),
                }
            })
            .collect();

        let position = variants[0].position;
        let marker = map.create_marker(MarkerOptions {
            position,
            title: record.title.clone(),
            rise_on_hover: true,
        });

        Self {
            record,
            zoom: config.zoom,
            variants,
            marker,
            position,
            displayed_zoom: None,
            visible_ratio: 0.0,
        }
    }

    pub fn anchor(&self) -> AnchorId {
        self.record.anchor
    }

    pub fn track_number(&self) -> usize {
        self.record.track_number
    }

    pub fn marker(&self) -> MarkerId {
        self.marker
    }

    /// Current marker position.
    pub fn position(&self) -> GpsPoint {
        self.position
    }

    pub fn displayed_zoom(&self) -> Option<u8> {
        self.displayed_zoom
    }

    pub fn is_displayed(&self) -> bool {
        self.displayed_zoom.is_some()
    }

    /// Last reported visible fraction of the post in the list, 0 if never reported.
    pub fn visible_ratio(&self) -> f64 {
        self.visible_ratio
    }

    pub fn set_visible_ratio(&mut self, ratio: f64) {
        self.visible_ratio = ratio;
    }

    /// Icon and position used at `zoom`.
    pub fn variant(&self, zoom: u8) -> (&Icon, GpsPoint) {
        let variant = &self.variants[(self.zoom.clamp(zoom) - self.zoom.min_zoom) as usize];
        (&variant.icon, variant.position)
    }

    /// Show the marker for the map's current zoom. No-op if already shown at that zoom.
    pub fn display<M: MapSurface + ?Sized>(&mut self, map: &mut M) {
        let zoom = self.zoom.clamp(map.zoom());
        if self.displayed_zoom == Some(zoom) {
            return;
        }

        let variant = &self.variants[(zoom - self.zoom.min_zoom) as usize];
        map.set_marker_position(self.marker, variant.position);
        map.set_marker_icon(self.marker, &variant.icon);
        if self.displayed_zoom.is_none() {
            map.attach_marker(self.marker);
        }
        self.position = variant.position;
        self.displayed_zoom = Some(zoom);
    }

    pub fn undisplay<M: MapSurface + ?Sized>(&mut self, map: &mut M) {
        if self.displayed_zoom.take().is_some() {
            map.detach_marker(self.marker);
        }
    }

    /// Navigate to the post page.
    pub fn open(&self, page: &mut dyn Page) {
        page.navigate(&self.record.url);
    }
}
