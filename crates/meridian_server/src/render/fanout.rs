//! Per-entity renderer registry.
//!
//! Each entity owns one [`RendererSet`]: the observers currently shown the
//! entity. Subscriptions come from [`RendererSet::apply`] during the render
//! phase and leave through cancellation, disconnection or visibility
//! eviction in [`RendererSet::handle_rendering`].

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use meridian_core::{EntityId, Vec3};
use parking_lot::Mutex;

use super::{MovementNotice, Notice, Renderer};

struct Subscribers {
    ids: HashSet<EntityId>,
    handles: VecDeque<Arc<dyn Renderer>>,
}

/// Outcome of one visibility pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderPass {
    /// Renderers still subscribed.
    pub retained: usize,
    /// Renderers evicted because they can no longer see the entity.
    pub evicted: usize,
    /// Renderers dropped because their connection is gone.
    pub disconnected: usize,
}

/// The observers an entity is shown to.
pub struct RendererSet {
    owner: EntityId,
    inner: Mutex<Subscribers>,
    moving: AtomicBool,
}

impl RendererSet {
    /// Creates an empty set for entity `owner`.
    #[must_use]
    pub fn new(owner: EntityId) -> Self {
        Self {
            owner,
            inner: Mutex::new(Subscribers {
                ids: HashSet::new(),
                handles: VecDeque::new(),
            }),
            moving: AtomicBool::new(false),
        }
    }

    /// Entity this set belongs to.
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> EntityId {
        self.owner
    }

    /// Subscribes `renderer`.
    ///
    /// Returns false, with no effect, for the owner itself or a renderer
    /// that is already subscribed.
    pub fn apply(&self, renderer: &Arc<dyn Renderer>) -> bool {
        let id = renderer.id();
        if id == self.owner {
            return false;
        }

        let mut inner = self.inner.lock();
        if !inner.ids.insert(id) {
            return false;
        }
        inner.handles.push_back(Arc::clone(renderer));
        true
    }

    /// Visibility pass for an entity standing at `position`.
    ///
    /// Disconnected renderers are dropped silently. Renderers that cannot
    /// see `position` are dropped and, if the entity is `alive`, sent one
    /// despawn notice.
    pub fn handle_rendering(&self, position: Vec3, alive: bool) -> RenderPass {
        let mut pass = RenderPass::default();
        let despawn = Notice::Despawn { id: self.owner };

        let mut inner = self.inner.lock();
        let Subscribers { ids, handles } = &mut *inner;
        handles.retain(|renderer| {
            if !renderer.is_connected() {
                ids.remove(&renderer.id());
                pass.disconnected += 1;
                false
            } else if !renderer.can_render(position) {
                if alive {
                    renderer.deliver(&despawn);
                }
                ids.remove(&renderer.id());
                pass.evicted += 1;
                false
            } else {
                pass.retained += 1;
                true
            }
        });

        pass
    }

    /// Sends `notice` to every subscriber.
    ///
    /// Movement-class notices must go through a [`MovementFrame`] instead.
    ///
    /// # Panics
    ///
    /// Panics if `notice` is a movement-class notice.
    pub fn broadcast(&self, notice: &Notice) {
        assert!(
            !notice.is_movement(),
            "movement notices for entity {} must be sent through a movement frame",
            self.owner
        );
        self.deliver_all(notice);
    }

    fn deliver_all(&self, notice: &Notice) {
        let inner = self.inner.lock();
        for renderer in &inner.handles {
            renderer.deliver(notice);
        }
    }

    /// Opens the one-shot window for a movement-class broadcast.
    ///
    /// # Panics
    ///
    /// Panics if a frame for this entity is already open.
    #[must_use]
    pub fn begin_movement(&self) -> MovementFrame<'_> {
        let already = self.moving.swap(true, Ordering::AcqRel);
        assert!(!already, "movement frame for entity {} already open", self.owner);
        MovementFrame { set: self }
    }

    /// Removes one subscriber without notifying it.
    pub fn cancel(&self, id: EntityId) -> bool {
        let mut inner = self.inner.lock();
        if !inner.ids.remove(&id) {
            return false;
        }
        inner.handles.retain(|renderer| renderer.id() != id);
        true
    }

    /// Sends one despawn to every connected subscriber, then empties the set.
    ///
    /// Used when the entity is destroyed.
    pub fn flush(&self) -> usize {
        let despawn = Notice::Despawn { id: self.owner };
        let mut inner = self.inner.lock();

        let mut delivered = 0;
        for renderer in inner.handles.drain(..) {
            if renderer.is_connected() {
                renderer.deliver(&despawn);
                delivered += 1;
            }
        }
        inner.ids.clear();
        delivered
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().handles.len()
    }

    /// True if nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `id` is subscribed.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.inner.lock().ids.contains(&id)
    }
}

impl std::fmt::Debug for RendererSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererSet")
            .field("owner", &self.owner)
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Open movement window for one entity.
///
/// Consumed by its single [`broadcast`](Self::broadcast). Dropping it
/// without broadcasting closes the window with nothing sent.
#[must_use = "a movement frame closes when dropped"]
pub struct MovementFrame<'a> {
    set: &'a RendererSet,
}

impl MovementFrame<'_> {
    /// Sends the movement notice to every subscriber and closes the frame.
    pub fn broadcast(self, notice: MovementNotice) {
        self.set.deliver_all(&notice.into_notice(self.set.owner));
    }
}

impl Drop for MovementFrame<'_> {
    fn drop(&mut self) {
        self.set.moving.store(false, Ordering::Release);
    }
}
