//! Tokio driver: runs loads as tasks, feeds their completions back as
//! events and owns the overview animation timer.
//!
//! Map state is never shared with the tasks. Everything they produce comes
//! back through the event channel and is handled by [`run`] on the caller's
//! task, one event at a time.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, AbortHandle, BoxFuture, FutureExt};
use log::{debug, info};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::archive::load_archive;
use crate::manager::{LoadEvent, MapEvent, MapManager};
use crate::session::MapSession;
use crate::surface::{Fetch, MapSurface, TrackLoader};
use crate::{MapError, Result};

/// [`TrackLoader`] running loads on the tokio runtime and reporting them
/// through the event channel, tagged with its manager's generation.
pub struct ChannelLoader {
    sender: UnboundedSender<MapEvent>,
    fetcher: Arc<dyn Fetch>,
    generation: u64,
}

impl ChannelLoader {
    pub fn new(sender: UnboundedSender<MapEvent>, fetcher: Arc<dyn Fetch>, generation: u64) -> Self {
        Self { sender, fetcher, generation }
    }

    fn send(sender: &UnboundedSender<MapEvent>, generation: u64, event: LoadEvent) {
        if sender.send(MapEvent::Load { generation, event }).is_err() {
            debug!("[ChannelLoader #{}] event loop gone, dropping load", generation);
        }
    }
}

impl TrackLoader for ChannelLoader {
    fn fetch_archive(&mut self, url: &str) -> AbortHandle {
        let (handle, registration) = AbortHandle::new_pair();
        let sender = self.sender.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let generation = self.generation;
        let url = url.to_string();

        tokio::spawn(async move {
            if let Some(result) = load_archive(fetcher.as_ref(), &url, registration).await {
                Self::send(&sender, generation, LoadEvent::ArchiveLoaded(result));
            }
        });
        handle
    }

    fn schedule_low_res(&mut self, track_number: usize, data: Vec<u8>) {
        // parsed when the loop gets to it, after the event at hand
        Self::send(&self.sender, self.generation, LoadEvent::LowResLoaded { track_number, data });
    }

    fn fetch_high_res(&mut self, track_number: usize, path: &str) {
        let sender = self.sender.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let generation = self.generation;
        let path = path.to_string();

        tokio::spawn(async move {
            let result = fetcher.fetch(&path).await;
            Self::send(&sender, generation, LoadEvent::HighResLoaded { track_number, result });
        });
    }
}

/// Serves site paths from a local directory. Paths leaving the directory
/// through `..` are rejected.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Fetch for FsFetcher {
    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
            return future::ready(Err(MapError::Fetch(format!("{}: outside the site root", path)))).boxed();
        }

        let file = self.root.join(relative);
        async move {
            tokio::fs::read(&file)
                .await
                .map_err(|e| MapError::Fetch(format!("{}: {}", file.display(), e)))
        }
        .boxed()
    }
}

/// Drive `session` until the event channel closes.
///
/// The animation timer exists only while the current manager's overview
/// animation has tracks left to reveal. The first tick comes one animation
/// delay after the timer starts.
pub async fn run<M, F>(session: &mut MapSession<M, F>, events: &mut UnboundedReceiver<MapEvent>) -> Result<()>
where
    M: MapSurface,
    F: FnMut(u64) -> Result<MapManager<M>>,
{
    let mut ticker: Option<Interval> = None;

    loop {
        match (session.needs_tick(), ticker.is_some()) {
            (true, false) => {
                let delay = session
                    .manager()
                    .map(|manager| manager.config().animation_delay)
                    .unwrap_or_default()
                    .max(Duration::from_millis(1));
                let mut interval = time::interval_at(Instant::now() + delay, delay);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker = Some(interval);
                debug!("[Runtime] animation timer started ({:?})", delay);
            }
            (false, true) => {
                ticker = None;
                debug!("[Runtime] animation timer stopped");
            }
            _ => {}
        }

        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = next_tick(&mut ticker) => MapEvent::Tick,
        };
        session.handle_event(event)?;
    }

    info!("[Runtime] event channel closed");
    Ok(())
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}
