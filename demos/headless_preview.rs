//! Drives the map manager against a built site directory without a browser.
//! Run with: RUST_LOG=info cargo run --example headless_preview -- <site-dir>
//!
//! The site directory needs `page.json` (page configuration), `tracks.json`
//! (track manifest), optionally `posts.json` (post datasets) and the files
//! they reference. Map operations are printed instead of rendered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use track_map::surface::{MarkerOptions, ObserverOptions, RouteStyle, SurfaceOptions};
use track_map::{
    parse_manifest, AnchorId, Bounds, ChannelLoader, Collaborators, Fetch, FsFetcher, GpsPoint, Icon,
    LayerId, MapConfig, MapEvent, MapManager, MapSession, MapSurface, MarkerId, Page, PageConfig,
    PanOptions, PostDataset, PostRecord, VisibilityObserver,
};

/// Prints every map operation.
struct LoggingMap {
    zoom: u8,
    viewport: Bounds,
    next_handle: u64,
    attached_layers: usize,
    attached_markers: usize,
}

impl LoggingMap {
    fn new() -> Self {
        Self {
            zoom: 2,
            viewport: Bounds { min_lat: -90.0, max_lat: 90.0, min_lng: -180.0, max_lng: 180.0 },
            next_handle: 0,
            attached_layers: 0,
            attached_markers: 0,
        }
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl MapSurface for LoggingMap {
    fn configure(&mut self, options: &SurfaceOptions) {
        println!("map: zoom {}..={}", options.min_zoom, options.max_zoom);
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        println!("map: fit {:?}", bounds);
        self.viewport = bounds;
    }

    fn zoom(&self) -> u8 {
        self.zoom
    }

    fn set_zoom(&mut self, zoom: u8) {
        println!("map: zoom {}", zoom);
        self.zoom = zoom;
    }

    fn bounds(&self) -> Bounds {
        self.viewport
    }

    fn pan_to(&mut self, target: GpsPoint, options: PanOptions) {
        println!("map: pan to {} over {:?}", target, options.duration);
    }

    fn is_fullscreen(&self) -> bool {
        false
    }

    fn set_scroll_wheel_zoom(&mut self, enabled: bool) {
        println!("map: scroll wheel zoom {}", enabled);
    }

    fn create_route_layer(&mut self, style: RouteStyle<'_>) -> LayerId {
        let points: usize = style.lines.iter().map(Vec::len).sum();
        println!("route: {} points in {} ({})", points, style.color, style.tooltip);
        LayerId(self.handle())
    }

    fn attach_layer(&mut self, _layer: LayerId) {
        self.attached_layers += 1;
    }

    fn detach_layer(&mut self, _layer: LayerId) {
        self.attached_layers = self.attached_layers.saturating_sub(1);
    }

    fn create_marker(&mut self, options: MarkerOptions) -> MarkerId {
        println!("marker: '{}' at {}", options.title, options.position);
        MarkerId(self.handle())
    }

    fn set_marker_position(&mut self, _marker: MarkerId, _position: GpsPoint) {}

    fn set_marker_icon(&mut self, _marker: MarkerId, _icon: &Icon) {}

    fn set_marker_z_offset(&mut self, _marker: MarkerId, _offset: i32) {}

    fn attach_marker(&mut self, _marker: MarkerId) {
        self.attached_markers += 1;
    }

    fn detach_marker(&mut self, _marker: MarkerId) {
        self.attached_markers = self.attached_markers.saturating_sub(1);
    }

    fn release(&mut self) {
        println!("map: released");
    }
}

struct ConsolePage;

impl Page for ConsolePage {
    fn navigate(&mut self, url: &str) {
        println!("page: navigate to {}", url);
    }

    fn preload_image(&mut self, _url: &str) {}

    fn map_height(&self) -> f64 {
        480.0
    }
}

struct NoObserver;

impl VisibilityObserver for NoObserver {
    fn reset(&mut self, _options: ObserverOptions) {}
    fn observe(&mut self, _anchor: AnchorId) {}
    fn disconnect(&mut self) {}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let site = std::env::args().nth(1).ok_or("usage: headless_preview <site-dir>")?;
    let fetcher = Arc::new(FsFetcher::new(&site));

    let page_config = PageConfig::from_json(&String::from_utf8(fetcher.fetch("/page.json").await?)?)?;
    let manifest = parse_manifest(&String::from_utf8(fetcher.fetch("/tracks.json").await?)?)?;
    let datasets: Vec<PostDataset> = match fetcher.fetch("/posts.json").await {
        Ok(raw) => serde_json::from_slice(&raw)?,
        Err(_) => Vec::new(),
    };
    let records = datasets
        .iter()
        .enumerate()
        .map(|(idx, dataset)| PostRecord::parse(AnchorId(idx as u64), dataset))
        .collect::<Result<Vec<_>, _>>()?;

    println!("Headless preview");
    println!("================");
    println!("Tracks: {}", manifest.len());
    println!("Posts: {}", records.len());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let loader_tx = tx.clone();
    let shared: Arc<dyn Fetch> = fetcher;
    let mut session = MapSession::new(move |generation| {
        Ok(MapManager::new(
            LoggingMap::new(),
            MapConfig::default(),
            page_config.clone(),
            manifest.clone(),
            records.clone(),
            Collaborators {
                page: Box::new(ConsolePage),
                observer: Box::new(NoObserver),
                loader: Box::new(ChannelLoader::new(loader_tx.clone(), Arc::clone(&shared), generation)),
                generation,
            },
        ))
    });
    session.on_resize(true)?;

    // overview animation
    if let Ok(Err(e)) = tokio::time::timeout(Duration::from_secs(3), track_map::run(&mut session, &mut rx)).await {
        return Err(e.into());
    }

    // zoom into the initial viewport
    if let Some(manager) = session.manager_mut() {
        manager.map_mut().set_zoom(12);
    }
    tx.send(MapEvent::ZoomEnd)?;
    if let Ok(Err(e)) = tokio::time::timeout(Duration::from_secs(3), track_map::run(&mut session, &mut rx)).await {
        return Err(e.into());
    }

    if let Some(manager) = session.manager() {
        let high_res = manager.tracks().iter().filter(|t| t.high_res().is_some()).count();
        println!();
        println!("Tracks loaded: {}", manager.tracks().iter().filter(|t| t.is_low_res_loaded()).count());
        println!("High res loaded: {}", high_res);
        println!("Layers shown: {}", manager.map().attached_layers);
        println!("Markers shown: {}", manager.map().attached_markers);
    }

    session.on_resize(false)?;
    Ok(())
}
