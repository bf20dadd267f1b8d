//! Observers: joined connections and the player entity they control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use meridian_core::{ChunkGrid, ChunkLocation, EntityId, Vec3};
use parking_lot::Mutex;

use super::{Entity, Intent};
use crate::connection::{Connection, ObserverInput};
use crate::render::{Notice, Renderer};

/// A connected client with an avatar in the world.
///
/// The view grid is recomputed in start-observer-routines only, so every
/// visibility test within a tick sees the same grid.
pub struct Observer {
    connection: Arc<dyn Connection>,
    player: Arc<Entity>,
    view_distance: u32,
    view: Mutex<ChunkGrid>,
    alive: AtomicBool,
}

impl Observer {
    /// Wraps a joined connection and its player entity.
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>, player: Arc<Entity>, view_distance: u32) -> Self {
        let view = ChunkGrid::around(ChunkLocation::from_position(player.position()), view_distance);
        Self {
            connection,
            player,
            view_distance,
            view: Mutex::new(view),
            alive: AtomicBool::new(true),
        }
    }

    /// The observer's own entity.
    #[inline]
    #[must_use]
    pub fn player(&self) -> &Arc<Entity> {
        &self.player
    }

    /// The client connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Render distance in chunks.
    #[inline]
    #[must_use]
    pub const fn view_distance(&self) -> u32 {
        self.view_distance
    }

    /// Chunks currently in view.
    #[must_use]
    pub fn view(&self) -> ChunkGrid {
        *self.view.lock()
    }

    /// False once the observer is on its way out.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Marks the observer and its player for destruction.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::Release);
        self.player.despawn();
    }

    /// Applies queued client input.
    ///
    /// Only the latest input of the tick counts; the player moves once per
    /// tick. Returns true if there was any input.
    pub fn start_routine(&self) -> bool {
        let Some(input) = std::iter::from_fn(|| self.connection.poll_input()).last() else {
            return false;
        };
        self.apply(input);
        true
    }

    fn apply(&self, input: ObserverInput) {
        self.player.set_forms(input.forms);
        self.player.set_intent(Intent {
            position: input.position,
            look: input.look,
            on_ground: input.on_ground,
        });
        self.look_from(input.position);
    }

    fn look_from(&self, position: Vec3) {
        let center = ChunkLocation::from_position(position);
        *self.view.lock() = ChunkGrid::around(center, self.view_distance);
    }
}

impl Renderer for Observer {
    fn id(&self) -> EntityId {
        self.player.id()
    }

    fn is_connected(&self) -> bool {
        self.is_alive() && self.connection.is_connected()
    }

    fn can_render(&self, position: Vec3) -> bool {
        self.view.lock().contains(ChunkLocation::from_position(position))
    }

    fn deliver(&self, notice: &Notice) {
        if self.is_connected() {
            self.connection.send(notice);
        }
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("name", &self.connection.name())
            .field("player", &self.player.id())
            .field("view_distance", &self.view_distance)
            .field("alive", &self.is_alive())
            .finish()
    }
}
