//! Map tunables and the configuration embedded in the page.

use std::time::Duration;

use serde::Deserialize;

use crate::surface::PanOptions;
use crate::{Bounds, GpsPoint};

/// Zoom thresholds driving the display mode of tracks and posts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomConfig {
    /// Lowest zoom level of the map.
    /// Default: 1
    pub min_zoom: u8,

    /// Highest zoom level of the map.
    /// Default: 16
    pub max_zoom: u8,

    /// Zoom the map is raised to when scrolling focuses a post.
    /// Default: 7
    pub scrolling_min_zoom: u8,

    /// From this zoom on, tracks in the viewport are shown in high resolution.
    /// Default: 10
    pub high_res_min_zoom: u8,

    /// Up to this zoom the overview animation runs.
    /// Default: 3
    pub animation_max_zoom: u8,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min_zoom: 1,
            max_zoom: 16,
            scrolling_min_zoom: 7,
            high_res_min_zoom: 10,
            animation_max_zoom: 3,
        }
    }
}

impl ZoomConfig {
    /// Clamp `zoom` into `[min_zoom, max_zoom]`.
    pub fn clamp(&self, zoom: u8) -> u8 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// All zoom levels from min to max, inclusive.
    pub fn levels(&self) -> impl Iterator<Item = u8> {
        self.min_zoom..=self.max_zoom
    }
}

/// Configuration of the map manager.
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub zoom: ZoomConfig,

    /// Interval between two overview animation steps.
    /// Default: 100ms
    pub animation_delay: Duration,

    /// Thumbnails are normalized so their longer side has this size in pixels.
    /// Default: 100.0
    pub thumbnail_max_dim: f64,

    /// Stacking offset of the focused post marker.
    /// Default: 1000
    pub focus_z_offset: i32,

    /// How the map pans to a newly focused post.
    pub focus_pan: PanOptions,

    /// Visible fractions at which the post observer reports changes.
    /// Default: 0.0, 0.1, ..., 1.0
    pub post_thresholds: Vec<f64>,

    /// `chrono` format of the track date in tooltips.
    /// Default: "%d.%m.%Y"
    pub date_format: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomConfig::default(),
            animation_delay: Duration::from_millis(100),
            thumbnail_max_dim: 100.0,
            focus_z_offset: 1000,
            focus_pan: PanOptions::default(),
            post_thresholds: (0..=10).map(|i| i as f64 / 10.0).collect(),
            date_format: "%d.%m.%Y".to_string(),
        }
    }
}

/// Localized titles of the map controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ControlLabels {
    #[serde(rename = "zoomInL10n", default)]
    pub zoom_in: String,
    #[serde(rename = "zoomOutL10n", default)]
    pub zoom_out: String,
    #[serde(rename = "viewFullscreenL10n", default)]
    pub view_fullscreen: String,
    #[serde(rename = "exitFullscreenL10n", default)]
    pub exit_fullscreen: String,
}

/// Page-level settings handed over by the site renderer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    #[serde(default)]
    pub dev_mode: bool,

    /// Initial viewport as two opposite `[lat, lng]` corners.
    pub init_bounds: [GpsPoint; 2],

    /// Location of the compressed low resolution track archive.
    pub lowres_track_archive: String,

    #[serde(flatten)]
    pub labels: ControlLabels,
}

impl PageConfig {
    /// Parse the page configuration from its embedded JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn init_bounds(&self) -> Bounds {
        Bounds::from_corners(self.init_bounds[0], self.init_bounds[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = MapConfig::default();
        assert_eq!(config.post_thresholds.len(), 11);
        assert_eq!(config.post_thresholds[0], 0.0);
        assert_eq!(config.post_thresholds[10], 1.0);
    }

    #[test]
    fn test_zoom_levels_and_clamp() {
        let zoom = ZoomConfig::default();
        assert_eq!(zoom.levels().count(), 16);
        assert_eq!(zoom.clamp(0), 1);
        assert_eq!(zoom.clamp(30), 16);
    }

    #[test]
    fn test_page_config_from_json() {
        let json = r#"{
            "devMode": true,
            "initBounds": [[-55.0, -80.0], [12.0, -35.0]],
            "lowresTrackArchive": "/tracks/lowres.tar.gz",
            "zoomInL10n": "Vergrößern",
            "zoomOutL10n": "Verkleinern",
            "viewFullscreenL10n": "Vollbild",
            "exitFullscreenL10n": "Vollbild verlassen"
        }"#;
        let config = PageConfig::from_json(json).unwrap();
        assert!(config.dev_mode);
        assert_eq!(config.lowres_track_archive, "/tracks/lowres.tar.gz");
        assert_eq!(config.labels.zoom_out, "Verkleinern");
        let bounds = config.init_bounds();
        assert_eq!(bounds.min_lat, -55.0);
        assert_eq!(bounds.max_lng, -35.0);
    }

    #[test]
    fn test_page_config_dev_mode_defaults_off() {
        let json = r#"{"initBounds": [[0, 0], [1, 1]], "lowresTrackArchive": "a.tar.gz"}"#;
        let config = PageConfig::from_json(json).unwrap();
        assert!(!config.dev_mode);
        assert_eq!(config.labels, ControlLabels::default());
    }
}
