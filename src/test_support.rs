//! Recording fakes of the collaborator traits and fixture builders.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use flate2::write::GzEncoder;
use flate2::Compression;
use futures::future::{self, AbortHandle, BoxFuture, FutureExt};

use crate::manifest::{PostRecord, Thumbnail, TrackManifest};
use crate::surface::{
    AnchorId, Collaborators, Fetch, Icon, LayerId, MapSurface, MarkerId, MarkerOptions,
    ObserverOptions, Page, PanOptions, RouteStyle, SurfaceOptions, TrackLoader, VisibilityObserver,
};
use crate::{Bounds, GpsPoint, MapError, Result};

// ============================================================================
// Map
// ============================================================================

#[derive(Debug, Clone)]
pub struct FakeLayer {
    pub color: String,
    pub tooltip: String,
    pub lines: Vec<Vec<GpsPoint>>,
    pub attached: bool,
    pub attach_count: usize,
}

#[derive(Debug, Clone)]
pub struct FakeMarker {
    pub options: MarkerOptions,
    pub position: GpsPoint,
    pub icon: Option<Icon>,
    pub z_offset: i32,
    pub attached: bool,
}

#[derive(Debug)]
pub struct FakeMap {
    pub zoom: u8,
    pub bounds: Bounds,
    pub fullscreen: bool,
    pub scroll_wheel_zoom: bool,
    pub options: Option<SurfaceOptions>,
    pub fitted: Option<Bounds>,
    pub pans: Vec<(GpsPoint, PanOptions)>,
    pub released: bool,
    calls: Option<Rc<RefCell<CallLog>>>,
    layers: Vec<FakeLayer>,
    markers: Vec<FakeMarker>,
}

impl FakeMap {
    /// A map at `zoom` whose viewport covers the whole world.
    pub fn new(zoom: u8) -> Self {
        Self {
            zoom,
            bounds: Bounds { min_lat: -90.0, max_lat: 90.0, min_lng: -180.0, max_lng: 180.0 },
            fullscreen: false,
            scroll_wheel_zoom: true,
            options: None,
            fitted: None,
            pans: Vec::new(),
            released: false,
            calls: None,
            layers: Vec::new(),
            markers: Vec::new(),
        }
    }

    /// Record `release` into `calls`.
    pub fn with_calls(mut self, calls: &Rc<RefCell<CallLog>>) -> Self {
        self.calls = Some(Rc::clone(calls));
        self
    }

    pub fn layer(&self, id: LayerId) -> &FakeLayer {
        &self.layers[id.0 as usize]
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_layer_attached(&self, id: LayerId) -> bool {
        self.layer(id).attached
    }

    pub fn attached_layer_count(&self) -> usize {
        self.layers.iter().filter(|l| l.attached).count()
    }

    pub fn marker(&self, id: MarkerId) -> &FakeMarker {
        &self.markers[id.0 as usize]
    }

    pub fn attached_marker_count(&self) -> usize {
        self.markers.iter().filter(|m| m.attached).count()
    }
}

impl MapSurface for FakeMap {
    fn configure(&mut self, options: &SurfaceOptions) {
        self.options = Some(options.clone());
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.fitted = Some(bounds);
    }

    fn zoom(&self) -> u8 {
        self.zoom
    }

    fn set_zoom(&mut self, zoom: u8) {
        self.zoom = zoom;
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn pan_to(&mut self, target: GpsPoint, options: PanOptions) {
        self.pans.push((target, options));
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn set_scroll_wheel_zoom(&mut self, enabled: bool) {
        self.scroll_wheel_zoom = enabled;
    }

    fn create_route_layer(&mut self, style: RouteStyle<'_>) -> LayerId {
        self.layers.push(FakeLayer {
            color: style.color.to_string(),
            tooltip: style.tooltip.to_string(),
            lines: style.lines.to_vec(),
            attached: false,
            attach_count: 0,
        });
        LayerId(self.layers.len() as u64 - 1)
    }

    fn attach_layer(&mut self, layer: LayerId) {
        let layer = &mut self.layers[layer.0 as usize];
        assert!(!layer.attached, "layer attached twice");
        layer.attached = true;
        layer.attach_count += 1;
    }

    fn detach_layer(&mut self, layer: LayerId) {
        self.layers[layer.0 as usize].attached = false;
    }

    fn create_marker(&mut self, options: MarkerOptions) -> MarkerId {
        self.markers.push(FakeMarker {
            position: options.position,
            options,
            icon: None,
            z_offset: 0,
            attached: false,
        });
        MarkerId(self.markers.len() as u64 - 1)
    }

    fn set_marker_position(&mut self, marker: MarkerId, position: GpsPoint) {
        self.markers[marker.0 as usize].position = position;
    }

    fn set_marker_icon(&mut self, marker: MarkerId, icon: &Icon) {
        self.markers[marker.0 as usize].icon = Some(icon.clone());
    }

    fn set_marker_z_offset(&mut self, marker: MarkerId, offset: i32) {
        self.markers[marker.0 as usize].z_offset = offset;
    }

    fn attach_marker(&mut self, marker: MarkerId) {
        self.markers[marker.0 as usize].attached = true;
    }

    fn detach_marker(&mut self, marker: MarkerId) {
        self.markers[marker.0 as usize].attached = false;
    }

    fn release(&mut self) {
        assert!(!self.released, "map released twice");
        self.released = true;
        if let Some(calls) = &self.calls {
            calls.borrow_mut().record("release");
        }
    }
}

// ============================================================================
// Page, observer and loader
// ============================================================================

/// Ordered log of teardown calls across the fakes.
///
/// Archive aborts happen on an `AbortHandle` the fakes never see being
/// called, so they are picked up from the loader log on the next record.
#[derive(Debug, Default)]
pub struct CallLog {
    pub calls: Vec<&'static str>,
    loader: Option<Rc<RefCell<LoaderLog>>>,
    aborts_seen: usize,
}

impl CallLog {
    pub fn record(&mut self, call: &'static str) {
        self.note_aborts();
        self.calls.push(call);
    }

    pub fn note_aborts(&mut self) {
        let aborted = match &self.loader {
            Some(loader) => loader.borrow().archives.iter().filter(|(_, h)| h.is_aborted()).count(),
            None => 0,
        };
        while self.aborts_seen < aborted {
            self.aborts_seen += 1;
            self.calls.push("abort");
        }
    }
}

#[derive(Debug, Default)]
pub struct PageLog {
    pub navigations: Vec<String>,
    pub preloads: Vec<String>,
    pub map_height: f64,
}

pub struct FakePage(pub Rc<RefCell<PageLog>>);

impl Page for FakePage {
    fn navigate(&mut self, url: &str) {
        self.0.borrow_mut().navigations.push(url.to_string());
    }

    fn preload_image(&mut self, url: &str) {
        self.0.borrow_mut().preloads.push(url.to_string());
    }

    fn map_height(&self) -> f64 {
        self.0.borrow().map_height
    }
}

#[derive(Debug, Default)]
pub struct ObserverLog {
    pub options: Option<ObserverOptions>,
    pub observed: Vec<AnchorId>,
    pub connected: bool,
    pub resets: usize,
    pub calls: Option<Rc<RefCell<CallLog>>>,
}

pub struct FakeObserver(pub Rc<RefCell<ObserverLog>>);

impl VisibilityObserver for FakeObserver {
    fn reset(&mut self, options: ObserverOptions) {
        let mut log = self.0.borrow_mut();
        log.options = Some(options);
        log.observed.clear();
        log.connected = false;
        log.resets += 1;
    }

    fn observe(&mut self, anchor: AnchorId) {
        let mut log = self.0.borrow_mut();
        log.observed.push(anchor);
        log.connected = true;
    }

    fn disconnect(&mut self) {
        let mut log = self.0.borrow_mut();
        log.observed.clear();
        log.connected = false;
        if let Some(calls) = &log.calls {
            calls.borrow_mut().record("disconnect");
        }
    }
}

#[derive(Debug, Default)]
pub struct LoaderLog {
    pub archives: Vec<(String, AbortHandle)>,
    pub low_res: Vec<(usize, Vec<u8>)>,
    pub high_res: Vec<(usize, String)>,
}

pub struct FakeLoader(pub Rc<RefCell<LoaderLog>>);

impl TrackLoader for FakeLoader {
    fn fetch_archive(&mut self, url: &str) -> AbortHandle {
        let (handle, _registration) = AbortHandle::new_pair();
        self.0.borrow_mut().archives.push((url.to_string(), handle.clone()));
        handle
    }

    fn schedule_low_res(&mut self, track_number: usize, data: Vec<u8>) {
        self.0.borrow_mut().low_res.push((track_number, data));
    }

    fn fetch_high_res(&mut self, track_number: usize, path: &str) {
        self.0.borrow_mut().high_res.push((track_number, path.to_string()));
    }
}

/// Shared logs of one set of fake collaborators.
#[derive(Clone)]
pub struct Harness {
    pub page: Rc<RefCell<PageLog>>,
    pub observer: Rc<RefCell<ObserverLog>>,
    pub loader: Rc<RefCell<LoaderLog>>,
    pub calls: Rc<RefCell<CallLog>>,
}

impl Default for Harness {
    fn default() -> Self {
        let loader = Rc::new(RefCell::new(LoaderLog::default()));
        let calls = Rc::new(RefCell::new(CallLog {
            loader: Some(Rc::clone(&loader)),
            ..CallLog::default()
        }));
        let observer = Rc::new(RefCell::new(ObserverLog {
            calls: Some(Rc::clone(&calls)),
            ..ObserverLog::default()
        }));
        Self {
            page: Rc::default(),
            observer,
            loader,
            calls,
        }
    }
}

impl Harness {
    pub fn collaborators(&self, generation: u64) -> Collaborators {
        Collaborators {
            page: Box::new(FakePage(Rc::clone(&self.page))),
            observer: Box::new(FakeObserver(Rc::clone(&self.observer))),
            loader: Box::new(FakeLoader(Rc::clone(&self.loader))),
            generation,
        }
    }
}

// ============================================================================
// Fetch
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct MemoryFetch {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFetch {
    pub fn with(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.to_string(), data.into());
        self
    }
}

impl Fetch for MemoryFetch {
    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        let result = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| MapError::Fetch(format!("{}: not found", path)));
        future::ready(result).boxed()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// A gzip compressed tar holding `files`.
pub fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    let mut encoder = builder.into_inner().unwrap();
    encoder.flush().unwrap();
    encoder.finish().unwrap()
}

/// GPX document with one `<trkseg>` per line of `(lat, lng)` pairs.
pub fn gpx_track(lines: &[&[(f64, f64)]]) -> String {
    let mut gpx = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <gpx version=\"1.1\" creator=\"test\" xmlns=\"http://www.topografix.com/GPX/1/1\">\n",
    );
    if !lines.is_empty() {
        gpx.push_str("<trk>\n");
        for line in lines {
            gpx.push_str("<trkseg>\n");
            for (lat, lng) in line.iter() {
                gpx.push_str(&format!("<trkpt lat=\"{}\" lon=\"{}\"></trkpt>\n", lat, lng));
            }
            gpx.push_str("</trkseg>\n");
        }
        gpx.push_str("</trk>\n");
    }
    gpx.push_str("</gpx>\n");
    gpx
}

/// Straight north-bound track of `points` points starting at `(lat, lng)`.
pub fn straight_track(lat: f64, lng: f64, points: usize) -> String {
    // rounded so the coordinates survive the text round trip unchanged
    let line: Vec<(f64, f64)> = (0..points)
        .map(|i| (((lat + i as f64 * 0.01) * 1e6).round() / 1e6, lng))
        .collect();
    gpx_track(&[&line])
}

pub fn manifest_entry(track_number: usize) -> TrackManifest {
    TrackManifest {
        track_number,
        color: format!("#00{:02}ff", track_number),
        vehicle: "bicycle".to_string(),
        date: format!("2023-05-{:02}", track_number + 1),
        highres_path: format!("/tracks/{:04}_highres.gpx", track_number),
        lowres_path: format!("/tracks/{:04}_lowres.gpx", track_number),
    }
}

pub fn post_record(anchor: u64, track_number: usize, position: Option<GpsPoint>) -> PostRecord {
    PostRecord {
        anchor: AnchorId(anchor),
        track_number,
        position,
        spread: GpsPoint::new(0.1, 0.2),
        thumbnail: Thumbnail {
            url: format!("/img/{}.thumb.jpg", anchor),
            width: 400.0,
            height: 200.0,
        },
        title: format!("Post {}", anchor),
        url: format!("/posts/{}/", anchor),
    }
}
