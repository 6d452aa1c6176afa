//! A GPS track rendered at two resolutions.
//!
//! The low resolution route comes from the track archive and is parsed once.
//! The high resolution route is fetched on first need and cached for the
//! lifetime of the track; the first completed load wins. At most one of the
//! two renderings is attached to the map at any time.

use std::cell::OnceCell;

use log::{debug, info, warn};

use crate::manifest::TrackManifest;
use crate::route::{ParsedRoute, RouteLayer};
use crate::surface::{MapSurface, TrackLoader};
use crate::{GpsPoint, Result};

/// Which rendering of a track is attached to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    Hidden,
    LowRes,
    HighRes,
}

/// Lifecycle state of a track, derived from what is loaded and displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Low resolution data not parsed yet; display requests are ignored.
    Unloaded,
    /// Parsed but not on the map.
    LowResLoaded,
    LowResDisplayed,
    /// High resolution requested but not available yet.
    HighResLoading,
    HighResDisplayed,
}

#[derive(Debug)]
pub struct GpxTrack {
    manifest: TrackManifest,
    dev_mode: bool,
    date_label: String,
    midpoint: Option<GpsPoint>,
    low_res: OnceCell<RouteLayer>,
    high_res: OnceCell<RouteLayer>,
    display: DisplayState,
    /// The latest display request asked for high resolution.
    high_res_wanted: bool,
    high_res_in_flight: bool,
}

impl GpxTrack {
    pub fn new(manifest: TrackManifest, dev_mode: bool, date_format: &str) -> Self {
        let date_label = manifest.formatted_date(date_format);
        Self {
            manifest,
            dev_mode,
            date_label,
            midpoint: None,
            low_res: OnceCell::new(),
            high_res: OnceCell::new(),
            display: DisplayState::Hidden,
            high_res_wanted: false,
            high_res_in_flight: false,
        }
    }

    pub fn track_number(&self) -> usize {
        self.manifest.track_number
    }

    /// Middle point of the first line of the low resolution route.
    pub fn midpoint(&self) -> Option<GpsPoint> {
        self.midpoint
    }

    pub fn display_state(&self) -> DisplayState {
        self.display
    }

    pub fn state(&self) -> TrackState {
        if self.low_res.get().is_none() {
            return TrackState::Unloaded;
        }
        match self.display {
            DisplayState::HighRes => TrackState::HighResDisplayed,
            _ if self.high_res_wanted => TrackState::HighResLoading,
            DisplayState::LowRes => TrackState::LowResDisplayed,
            DisplayState::Hidden => TrackState::LowResLoaded,
        }
    }

    pub fn is_low_res_loaded(&self) -> bool {
        self.low_res.get().is_some()
    }

    pub fn low_res(&self) -> Option<&RouteLayer> {
        self.low_res.get()
    }

    pub fn high_res(&self) -> Option<&RouteLayer> {
        self.high_res.get()
    }

    /// Parse the low resolution route and create its (detached) rendering.
    ///
    /// Returns `true` when this call made the track ready, `false` if it was
    /// already loaded. The caller runs its on-ready work exactly when `true`
    /// is returned.
    pub fn load_low_res<M: MapSurface + ?Sized>(&mut self, map: &mut M, raw: &[u8]) -> Result<bool> {
        if self.low_res.get().is_some() {
            return Ok(false);
        }

        let route = ParsedRoute::parse(&self.manifest.lowres_path, raw)?;
        if self.midpoint.is_none() {
            self.midpoint = route.midpoint();
        }

        let tooltip = self.tooltip(&self.manifest.lowres_path, &route);
        let layer = RouteLayer::create(map, route, &self.manifest.color, &tooltip);
        self.low_res.get_or_init(|| layer);

        info!(
            "[Track {}] low res ready ({})",
            self.manifest.track_number, tooltip
        );
        Ok(true)
    }

    /// Show the low resolution rendering. Ignored until it has been loaded.
    pub fn display_low_res<M: MapSurface + ?Sized>(&mut self, map: &mut M) {
        self.high_res_wanted = false;
        if self.display == DisplayState::LowRes {
            return;
        }
        let Some(low_res) = self.low_res.get() else {
            return;
        };

        if self.display == DisplayState::HighRes {
            if let Some(high_res) = self.high_res.get() {
                high_res.detach(map);
            }
        }
        low_res.attach(map);
        self.display = DisplayState::LowRes;
    }

    /// Show the high resolution rendering, requesting it from `loader` first
    /// if it is not available. Only one request is in flight at a time.
    pub fn display_high_res<M: MapSurface + ?Sized>(&mut self, map: &mut M, loader: &mut dyn TrackLoader) {
        if self.display == DisplayState::HighRes {
            return;
        }

        if self.high_res.get().is_some() {
            self.attach_high_res(map);
            return;
        }

        self.high_res_wanted = true;
        if !self.high_res_in_flight {
            self.high_res_in_flight = true;
            debug!(
                "[Track {}] requesting {}",
                self.manifest.track_number, self.manifest.highres_path
            );
            loader.fetch_high_res(self.manifest.track_number, &self.manifest.highres_path);
        }
    }

    /// Complete a high resolution load.
    ///
    /// The first successful completion is kept and all later ones are
    /// discarded. The rendering is shown if high resolution is still wanted.
    /// Failures are logged and leave the track as it is; the next high
    /// resolution request retries.
    pub fn complete_high_res<M: MapSurface + ?Sized>(&mut self, map: &mut M, result: Result<Vec<u8>>) {
        self.high_res_in_flight = false;

        if self.high_res.get().is_some() {
            debug!(
                "[Track {}] discarding duplicate high res load",
                self.manifest.track_number
            );
            return;
        }

        let route = match result.and_then(|raw| ParsedRoute::parse(&self.manifest.highres_path, &raw)) {
            Ok(route) => route,
            Err(e) => {
                warn!("[Track {}] high res load failed: {}", self.manifest.track_number, e);
                self.high_res_wanted = false;
                return;
            }
        };

        let tooltip = self.tooltip(&self.manifest.highres_path, &route);
        let layer = RouteLayer::create(map, route, &self.manifest.color, &tooltip);
        self.high_res.get_or_init(|| layer);
        info!("[Track {}] high res ready", self.manifest.track_number);

        if self.high_res_wanted && self.display != DisplayState::HighRes {
            self.attach_high_res(map);
        }
    }

    /// Remove whichever rendering is attached.
    pub fn undisplay<M: MapSurface + ?Sized>(&mut self, map: &mut M) {
        self.high_res_wanted = false;
        let attached = match self.display {
            DisplayState::Hidden => return,
            DisplayState::LowRes => self.low_res.get(),
            DisplayState::HighRes => self.high_res.get(),
        };
        if let Some(layer) = attached {
            layer.detach(map);
        }
        self.display = DisplayState::Hidden;
    }

    fn attach_high_res<M: MapSurface + ?Sized>(&mut self, map: &mut M) {
        let Some(high_res) = self.high_res.get() else {
            return;
        };
        if self.display == DisplayState::LowRes {
            if let Some(low_res) = self.low_res.get() {
                low_res.detach(map);
            }
        }
        high_res.attach(map);
        self.display = DisplayState::HighRes;
        self.high_res_wanted = false;
    }

    fn tooltip(&self, path: &str, route: &ParsedRoute) -> String {
        if self.dev_mode {
            match self.midpoint {
                Some(midpoint) => format!("{}, {}", path, midpoint),
                None => path.to_string(),
            }
        } else {
            format!("{}, {:.0}km", self.date_label, route.distance_km())
        }
    }
}
