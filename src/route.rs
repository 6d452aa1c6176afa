//! Parsed GPX geometry and its rendering on the map.

use std::io::Cursor;

use log::debug;

use crate::geo_utils::{compute_bounds, middle_point, total_length};
use crate::surface::{LayerId, MapSurface, RouteStyle};
use crate::{Bounds, GpsPoint, MapError, Result};

/// Geometry of one GPX file.
///
/// Every `<rte>` and every `<trkseg>` becomes one line, routes first, in
/// document order. Points with invalid coordinates are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRoute {
    pub lines: Vec<Vec<GpsPoint>>,
    pub bounds: Bounds,
    /// Total length in meters
    pub distance: f64,
}

impl ParsedRoute {
    /// Parse GPX `raw`; `name` is only used in errors and logs.
    pub fn parse(name: &str, raw: &[u8]) -> Result<Self> {
        let gpx = gpx::read(Cursor::new(raw)).map_err(|e| MapError::Gpx(format!("{}: {}", name, e)))?;

        let to_line = |points: &[gpx::Waypoint]| -> Vec<GpsPoint> {
            points
                .iter()
                .map(|wpt| {
                    let p = wpt.point();
                    GpsPoint::new(p.y(), p.x())
                })
                .filter(|p| p.is_valid())
                .collect()
        };

        let lines: Vec<Vec<GpsPoint>> = gpx
            .routes
            .iter()
            .map(|route| to_line(&route.points))
            .chain(
                gpx.tracks
                    .iter()
                    .flat_map(|track| track.segments.iter())
                    .map(|segment| to_line(&segment.points)),
            )
            .filter(|line| !line.is_empty())
            .collect();

        if lines.is_empty() {
            return Err(MapError::EmptyRoute(name.to_string()));
        }

        let mut bounds = compute_bounds(&lines[0]);
        for line in &lines[1..] {
            bounds.extend(&compute_bounds(line));
        }
        let distance = total_length(&lines);

        debug!(
            "[Route] {}: {} lines, {} points, {:.0}m",
            name,
            lines.len(),
            lines.iter().map(Vec::len).sum::<usize>(),
            distance
        );

        Ok(Self { lines, bounds, distance })
    }

    /// Middle point of the first line.
    pub fn midpoint(&self) -> Option<GpsPoint> {
        self.lines.first().and_then(|line| middle_point(line))
    }

    /// Length in whole kilometers as shown in tooltips.
    pub fn distance_km(&self) -> f64 {
        (self.distance / 1000.0).round()
    }
}

/// A parsed route together with the map layer rendering it.
///
/// The layer is owned by whoever owns this value; attach and detach are the
/// only operations performed on it.
#[derive(Debug)]
pub struct RouteLayer {
    route: ParsedRoute,
    layer: LayerId,
}

impl RouteLayer {
    /// Create a detached layer for `route`.
    pub fn create<M: MapSurface + ?Sized>(map: &mut M, route: ParsedRoute, color: &str, tooltip: &str) -> Self {
        let layer = map.create_route_layer(RouteStyle {
            lines: &route.lines,
            color,
            tooltip,
        });
        Self { route, layer }
    }

    pub fn route(&self) -> &ParsedRoute {
        &self.route
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn intersects(&self, bounds: &Bounds) -> bool {
        self.route.bounds.intersects(bounds)
    }

    pub fn attach<M: MapSurface + ?Sized>(&self, map: &mut M) {
        map.attach_layer(self.layer);
    }

    pub fn detach<M: MapSurface + ?Sized>(&self, map: &mut M) {
        map.detach_layer(self.layer);
    }
}
