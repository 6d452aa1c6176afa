//! The map manager: owns the map, the tracks and posts, and turns map,
//! page and loader events into display transitions.
//!
//! Everything runs on one logical thread. Each event is handled to
//! completion before the next one, so display transitions of a track never
//! interleave; asynchronous loads re-enter as [`LoadEvent`]s.
//!
//! ## Display modes
//!
//! | Zoom | Mode |
//! |------|------|
//! | `<= animation_max_zoom` | overview animation, tracks revealed one per tick |
//! | `< high_res_min_zoom` | all tracks in low resolution |
//! | otherwise | high resolution for tracks in the viewport |

use std::cmp::Reverse;
use std::collections::HashMap;

use futures::future::AbortHandle;
use log::{debug, info};

use crate::archive::{entry_for_track, ArchiveEntry};
use crate::config::{MapConfig, PageConfig};
use crate::manifest::{PostRecord, TrackManifest};
use crate::observer::{select_max_visible, IntersectionEntry};
use crate::post::Post;
use crate::surface::{
    AnchorId, Collaborators, MapSurface, MarkerId, ObserverOptions, Page, SurfaceOptions,
    TrackLoader, VisibilityObserver,
};
use crate::track::GpxTrack;
use crate::Result;

/// Completion of an asynchronous load started through a [`TrackLoader`].
#[derive(Debug)]
pub enum LoadEvent {
    ArchiveLoaded(Result<Vec<ArchiveEntry>>),
    LowResLoaded { track_number: usize, data: Vec<u8> },
    HighResLoaded { track_number: usize, result: Result<Vec<u8>> },
}

/// Everything a map manager reacts to.
#[derive(Debug)]
pub enum MapEvent {
    /// The map finished a zoom change.
    ZoomEnd,
    /// The map finished panning.
    MoveEnd,
    /// The map entered or left fullscreen.
    FullscreenChange,
    MarkerClicked(MarkerId),
    /// Visible fractions of post anchors changed.
    PostVisibility(Vec<IntersectionEntry>),
    /// The window was resized; `map_visible` tells whether the map container is shown.
    Resize { map_visible: bool },
    /// Overview animation timer.
    Tick,
    /// A load completed for the manager of session `generation`.
    Load { generation: u64, event: LoadEvent },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Waiting for the first zoom or the track archive.
    Idle,
    Animating { cursor: usize },
    LowRes,
    HighRes,
}

pub struct MapManager<M: MapSurface> {
    map: M,
    config: MapConfig,
    page_config: PageConfig,
    manifest: Vec<TrackManifest>,
    tracks: Vec<GpxTrack>,
    posts: Vec<Post>,
    /// Posts without coordinates, waiting for their track's midpoint.
    deferred: HashMap<usize, Vec<PostRecord>>,
    page: Box<dyn Page>,
    observer: Box<dyn VisibilityObserver>,
    loader: Box<dyn TrackLoader>,
    archive_fetch: Option<AbortHandle>,
    mode: Mode,
    focused: Option<AnchorId>,
    generation: u64,
    removed: bool,
}

impl<M: MapSurface> MapManager<M> {
    /// Set up `map`, create the posts with known coordinates, start
    /// observing them and start loading the track archive.
    pub fn new(
        mut map: M,
        config: MapConfig,
        page_config: PageConfig,
        manifest: Vec<TrackManifest>,
        records: Vec<PostRecord>,
        collaborators: Collaborators,
    ) -> Self {
        let Collaborators { mut page, observer, mut loader, generation } = collaborators;

        map.configure(&SurfaceOptions {
            min_zoom: config.zoom.min_zoom,
            max_zoom: config.zoom.max_zoom,
            labels: page_config.labels.clone(),
        });
        map.set_scroll_wheel_zoom(false);
        map.fit_bounds(page_config.init_bounds());

        // the latest post is focused initially
        let focused = records
            .iter()
            .min_by_key(|record| Reverse(record.track_number))
            .map(|record| record.anchor);

        let mut posts = Vec::with_capacity(records.len());
        let mut deferred: HashMap<usize, Vec<PostRecord>> = HashMap::new();
        for record in records {
            match record.position {
                Some(position) => posts.push(Post::new(record, position, &config, &mut map, page.as_mut())),
                None => deferred.entry(record.track_number).or_default().push(record),
            }
        }

        let archive_fetch = Some(loader.fetch_archive(&page_config.lowres_track_archive));
        info!(
            "[MapManager #{}] {} tracks, {} posts ({} deferred)",
            generation,
            manifest.len(),
            posts.len(),
            deferred.values().map(Vec::len).sum::<usize>()
        );

        let mut manager = Self {
            map,
            config,
            page_config,
            manifest,
            tracks: Vec::new(),
            posts,
            deferred,
            page,
            observer,
            loader,
            archive_fetch,
            mode: Mode::Idle,
            focused,
            generation,
            removed: false,
        };
        manager.init_post_observer();
        manager
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    /// Mutable access to the map, e.g. for the host to apply user interaction.
    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn tracks(&self) -> &[GpxTrack] {
        &self.tracks
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn focused(&self) -> Option<AnchorId> {
        self.focused
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.mode, Mode::Animating { .. })
    }

    /// Index of the next track the overview animation reveals.
    pub fn animation_cursor(&self) -> Option<usize> {
        match self.mode {
            Mode::Animating { cursor } => Some(cursor),
            _ => None,
        }
    }

    /// Whether the animation timer has work left.
    pub fn needs_tick(&self) -> bool {
        matches!(self.mode, Mode::Animating { cursor } if cursor < self.tracks.len())
    }

    /// Handle one event to completion.
    ///
    /// Errors are fatal for the map: a corrupt archive, or an archive or
    /// low resolution track that could not be loaded.
    pub fn handle_event(&mut self, event: MapEvent) -> Result<()> {
        if self.removed {
            debug!("[MapManager #{}] ignoring {:?} after removal", self.generation, event);
            return Ok(());
        }

        match event {
            MapEvent::ZoomEnd => self.on_zoom_end(),
            MapEvent::MoveEnd => self.on_move_end(),
            MapEvent::FullscreenChange => self.on_fullscreen_change(),
            MapEvent::MarkerClicked(marker) => self.on_marker_clicked(marker),
            MapEvent::PostVisibility(entries) => self.focus_max_visible_post(&entries),
            MapEvent::Resize { map_visible: true } => self.on_resize(),
            MapEvent::Resize { map_visible: false } => self.remove(),
            MapEvent::Tick => self.tick(),
            MapEvent::Load { generation, event } => {
                if generation != self.generation {
                    debug!(
                        "[MapManager #{}] dropping stale load event of #{}",
                        self.generation, generation
                    );
                    return Ok(());
                }
                return self.on_load(event);
            }
        }
        Ok(())
    }

    /// Tear down: abort the archive load, stop the animation, disconnect
    /// the observer and release the map. Safe to call more than once.
    pub fn remove(&mut self) {
        if self.removed {
            return;
        }
        if let Some(fetch) = self.archive_fetch.take() {
            fetch.abort();
        }
        self.mode = Mode::Idle;
        self.observer.disconnect();
        self.map.release();
        self.removed = true;
        info!("[MapManager #{}] removed", self.generation);
    }

    /// Rebuild the post observer after the map's size changed.
    pub fn on_resize(&mut self) {
        self.init_post_observer();
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    fn on_load(&mut self, event: LoadEvent) -> Result<()> {
        match event {
            LoadEvent::ArchiveLoaded(result) => {
                self.archive_fetch = None;
                self.init_tracks(result?)
            }
            LoadEvent::LowResLoaded { track_number, data } => self.on_low_res_loaded(track_number, &data),
            LoadEvent::HighResLoaded { track_number, result } => {
                match self.tracks.iter_mut().find(|t| t.track_number() == track_number) {
                    Some(track) => track.complete_high_res(&mut self.map, result),
                    None => debug!("[MapManager] high res for unknown track {}", track_number),
                }
                Ok(())
            }
        }
    }

    fn init_tracks(&mut self, entries: Vec<ArchiveEntry>) -> Result<()> {
        // check the whole archive before loading anything from it
        let mut payloads = Vec::with_capacity(self.manifest.len());
        for entry in &self.manifest {
            let archived = entry_for_track(&entries, entry.track_number, &entry.lowres_path)?;
            payloads.push((entry.track_number, archived.data.clone()));
        }

        self.tracks = self
            .manifest
            .iter()
            .map(|entry| GpxTrack::new(entry.clone(), self.page_config.dev_mode, &self.config.date_format))
            .collect();
        for (track_number, data) in payloads {
            self.loader.schedule_low_res(track_number, data);
        }

        self.show_animation();
        Ok(())
    }

    fn on_low_res_loaded(&mut self, track_number: usize, data: &[u8]) -> Result<()> {
        let Some(track) = self.tracks.iter_mut().find(|t| t.track_number() == track_number) else {
            debug!("[MapManager] low res for unknown track {}", track_number);
            return Ok(());
        };

        if !track.load_low_res(&mut self.map, data)? {
            return Ok(());
        }

        let Some(records) = self.deferred.remove(&track_number) else {
            return Ok(());
        };
        let Some(midpoint) = track.midpoint() else {
            return Ok(());
        };

        let show = matches!(self.mode, Mode::LowRes | Mode::HighRes);
        for record in records {
            let mut post = Post::new(record, midpoint, &self.config, &mut self.map, self.page.as_mut());
            if show {
                post.display(&mut self.map);
            }
            self.posts.push(post);
        }
        if !self.map.is_fullscreen() {
            self.observe_posts();
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Display modes
    // ------------------------------------------------------------------------

    fn on_zoom_end(&mut self) {
        let zoom = self.map.zoom();
        if zoom <= self.config.zoom.animation_max_zoom {
            self.show_animation();
        } else if zoom < self.config.zoom.high_res_min_zoom {
            self.show_low_res();
        } else {
            self.show_high_res();
        }
    }

    fn on_move_end(&mut self) {
        if self.config.zoom.high_res_min_zoom <= self.map.zoom() {
            self.show_high_res();
        }
    }

    fn show_animation(&mut self) {
        if let Mode::Animating { cursor } = self.mode {
            self.display_posts_up_to(cursor);
            return;
        }

        for track in &mut self.tracks {
            track.undisplay(&mut self.map);
        }
        for post in &mut self.posts {
            post.undisplay(&mut self.map);
        }
        self.mode = Mode::Animating { cursor: 0 };
        info!("[MapManager #{}] overview animation started", self.generation);
    }

    fn show_low_res(&mut self) {
        self.mode = Mode::LowRes;
        for track in &mut self.tracks {
            track.display_low_res(&mut self.map);
        }
        self.display_all_posts();
    }

    fn show_high_res(&mut self) {
        self.mode = Mode::HighRes;
        let viewport = self.map.bounds();
        for track in &mut self.tracks {
            let in_view = track.low_res().is_some_and(|low_res| low_res.intersects(&viewport));
            if in_view {
                track.display_high_res(&mut self.map, self.loader.as_mut());
            } else {
                track.display_low_res(&mut self.map);
            }
        }
        self.display_all_posts();
    }

    /// One animation step: show the track at the cursor and the posts up to
    /// it, advancing only once that track's low resolution data is loaded.
    fn tick(&mut self) {
        let Mode::Animating { cursor } = self.mode else {
            return;
        };
        let Some(track) = self.tracks.get_mut(cursor) else {
            return;
        };

        track.display_low_res(&mut self.map);
        let loaded = track.is_low_res_loaded();
        self.display_posts_up_to(cursor);

        if loaded {
            self.mode = Mode::Animating { cursor: cursor + 1 };
        }
    }

    fn display_posts_up_to(&mut self, cursor: usize) {
        for post in &mut self.posts {
            if post.track_number() <= cursor {
                post.display(&mut self.map);
            }
        }
    }

    fn display_all_posts(&mut self) {
        for post in &mut self.posts {
            post.display(&mut self.map);
        }
    }

    // ------------------------------------------------------------------------
    // Interaction
    // ------------------------------------------------------------------------

    fn on_fullscreen_change(&mut self) {
        if self.map.is_fullscreen() {
            self.map.set_scroll_wheel_zoom(true);
            self.observer.disconnect();
        } else {
            self.map.set_scroll_wheel_zoom(false);
            self.observe_posts();
        }
    }

    fn on_marker_clicked(&mut self, marker: MarkerId) {
        if let Some(post) = self.posts.iter().find(|p| p.marker() == marker) {
            post.open(self.page.as_mut());
        }
    }

    fn init_post_observer(&mut self) {
        self.observer.reset(ObserverOptions {
            root_margin_top: -self.page.map_height(),
            thresholds: self.config.post_thresholds.clone(),
        });
        if !self.map.is_fullscreen() {
            self.observe_posts();
        }
    }

    fn observe_posts(&mut self) {
        self.observer.disconnect();
        for post in &self.posts {
            self.observer.observe(post.anchor());
        }
    }

    /// Center the map on the most visible post of the list and raise its marker.
    /// The pan target is the post's position at the zoom the map has after
    /// the scrolling minimum is applied, not its last displayed position.
    fn focus_max_visible_post(&mut self, entries: &[IntersectionEntry]) {
        for entry in entries {
            if let Some(post) = self.posts.iter_mut().find(|p| p.anchor() == entry.target) {
                post.set_visible_ratio(entry.ratio);
            }
        }

        let Some(idx) = select_max_visible(self.posts.iter().map(|p| (p.visible_ratio(), p.track_number())))
        else {
            return;
        };
        let anchor = self.posts[idx].anchor();
        if self.focused == Some(anchor) {
            return;
        }

        if self.map.zoom() < self.config.zoom.scrolling_min_zoom {
            self.map.set_zoom(self.config.zoom.scrolling_min_zoom);
        }
        let (_, target) = self.posts[idx].variant(self.map.zoom());
        self.map.pan_to(target, self.config.focus_pan);

        for post in &self.posts {
            self.map.set_marker_z_offset(post.marker(), 0);
        }
        self.map.set_marker_z_offset(self.posts[idx].marker(), self.config.focus_z_offset);

        debug!(
            "[MapManager #{}] focus post {:?} of track {}",
            self.generation,
            anchor,
            self.posts[idx].track_number()
        );
        self.focused = Some(anchor);
    }
}

impl<M: MapSurface> Drop for MapManager<M> {
    fn drop(&mut self) {
        self.remove();
    }
}
