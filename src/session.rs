//! Map lifetime across window resizes.
//!
//! On narrow layouts the map container is hidden. The session tears the
//! manager down while the map is hidden and builds a fresh one once it is
//! shown again. Every manager gets a new generation number so load events
//! still in flight for a torn down manager are recognised and dropped.

use log::info;

use crate::manager::{MapEvent, MapManager};
use crate::surface::MapSurface;
use crate::Result;

pub struct MapSession<M: MapSurface, F> {
    factory: F,
    manager: Option<MapManager<M>>,
    generation: u64,
}

impl<M, F> MapSession<M, F>
where
    M: MapSurface,
    F: FnMut(u64) -> Result<MapManager<M>>,
{
    /// `factory` builds the manager for a generation; nothing is built
    /// until the first resize reports a visible map.
    pub fn new(factory: F) -> Self {
        Self { factory, manager: None, generation: 0 }
    }

    pub fn manager(&self) -> Option<&MapManager<M>> {
        self.manager.as_ref()
    }

    pub fn manager_mut(&mut self) -> Option<&mut MapManager<M>> {
        self.manager.as_mut()
    }

    /// Generation of the newest manager, 0 before the first one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.manager.is_some()
    }

    /// Whether the current manager's overview animation needs timer ticks.
    pub fn needs_tick(&self) -> bool {
        self.manager.as_ref().is_some_and(MapManager::needs_tick)
    }

    /// React to the map container being shown or hidden.
    pub fn on_resize(&mut self, map_visible: bool) -> Result<()> {
        match (map_visible, self.manager.as_mut()) {
            (true, Some(manager)) => manager.on_resize(),
            (true, None) => {
                self.generation += 1;
                info!("[MapSession] creating map #{}", self.generation);
                self.manager = Some((self.factory)(self.generation)?);
            }
            (false, Some(_)) => {
                if let Some(mut manager) = self.manager.take() {
                    manager.remove();
                }
                info!("[MapSession] map #{} hidden", self.generation);
            }
            (false, None) => {}
        }
        Ok(())
    }

    /// Route `event` to the current manager. Events arriving while no map
    /// exists are dropped.
    pub fn handle_event(&mut self, event: MapEvent) -> Result<()> {
        match event {
            MapEvent::Resize { map_visible } => self.on_resize(map_visible),
            event => match self.manager.as_mut() {
                Some(manager) => manager.handle_event(event),
                None => Ok(()),
            },
        }
    }
}
