//! Entities: identity, motion and the renderer set that shows them.

use std::sync::atomic::{AtomicBool, Ordering};

use meridian_core::{BoundingBox, ChunkGrid, EntityId, Look, Producer, Vec3};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::behavior::{Behavior, RoutineContext};
use crate::render::{MovementNotice, Notice, RendererSet};
use crate::MAX_RELATIVE_MOVE;

/// What an entity is. Decides its size and its spawn notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// An observer's avatar.
    Player,
    /// A creature, typed by the content layer.
    Mob {
        /// Content-defined creature type.
        type_id: u16,
    },
    /// A dropped item.
    Item,
    /// Anything fired or thrown.
    Projectile,
}

impl EntityKind {
    /// Bounding width (x and z) and height, in world units.
    #[must_use]
    pub const fn dimensions(self) -> (f64, f64) {
        match self {
            EntityKind::Player => (0.6, 1.8),
            EntityKind::Mob { .. } => (0.9, 1.4),
            EntityKind::Item => (0.25, 0.25),
            EntityKind::Projectile => (0.5, 0.5),
        }
    }
}

/// Posture flags broadcast with form changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Forms {
    /// Crouching.
    pub sneaking: bool,
    /// Running.
    pub sprinting: bool,
}

/// Position, look and posture of an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Motion {
    /// Feet position.
    pub position: Vec3,
    /// Orientation.
    pub look: Look,
    /// Touching the ground.
    pub on_ground: bool,
    /// Posture.
    pub forms: Forms,
}

/// Where an entity wants to be after the next move-entities phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intent {
    /// Target position.
    pub position: Vec3,
    /// Target look.
    pub look: Look,
    /// Target on-ground flag.
    pub on_ground: bool,
}

/// Request to create an entity in the next create-entities phase.
pub struct SpawnRequest {
    pub(crate) kind: EntityKind,
    pub(crate) position: Vec3,
    pub(crate) look: Look,
    pub(crate) behavior: Option<Box<dyn Behavior>>,
}

impl SpawnRequest {
    /// Request for a `kind` entity at `position`, without a behaviour.
    #[must_use]
    pub fn new(kind: EntityKind, position: Vec3) -> Self {
        Self {
            kind,
            position,
            look: Look::default(),
            behavior: None,
        }
    }

    /// Sets the initial look.
    #[must_use]
    pub fn with_look(mut self, look: Look) -> Self {
        self.look = look;
        self
    }

    /// Attaches a routine run every start-entity-routines phase.
    #[must_use]
    pub fn with_behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    /// Kind of entity requested.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }
}

impl std::fmt::Debug for SpawnRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnRequest")
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("behavior", &self.behavior.is_some())
            .finish()
    }
}

/// A simulated thing with an identifier.
///
/// Motion sits behind an entity-local lock. It is copied out before the
/// renderer set is touched, so the two locks never nest.
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    motion: Mutex<Motion>,
    intent: Mutex<Option<Intent>>,
    alive: AtomicBool,
    renderers: RendererSet,
    behavior: Option<Mutex<Box<dyn Behavior>>>,
}

impl Entity {
    /// Creates a live entity.
    #[must_use]
    pub fn new(id: EntityId, kind: EntityKind, position: Vec3, look: Look) -> Self {
        Self {
            id,
            kind,
            motion: Mutex::new(Motion {
                position,
                look,
                on_ground: true,
                forms: Forms::default(),
            }),
            intent: Mutex::new(None),
            alive: AtomicBool::new(true),
            renderers: RendererSet::new(id),
            behavior: None,
        }
    }

    pub(crate) fn from_request(id: EntityId, request: SpawnRequest) -> Self {
        let mut entity = Self::new(id, request.kind, request.position, request.look);
        entity.behavior = request.behavior.map(Mutex::new);
        entity
    }

    /// Identifier.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Snapshot of the current motion.
    #[must_use]
    pub fn motion(&self) -> Motion {
        *self.motion.lock()
    }

    /// Current feet position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.motion.lock().position
    }

    /// Bounding volume at the current position.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        let (width, height) = self.kind.dimensions();
        BoundingBox::standing_at(self.position(), width, height)
    }

    /// Every chunk the bounding volume spans.
    #[must_use]
    pub fn chunks(&self) -> ChunkGrid {
        ChunkGrid::covering(&self.bounds())
    }

    /// False once the entity has been despawned.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Marks the entity dead. It is destroyed in the next destroy phase.
    pub fn despawn(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Observers the entity is shown to.
    #[inline]
    #[must_use]
    pub const fn renderers(&self) -> &RendererSet {
        &self.renderers
    }

    /// Replaces the pending intent.
    pub fn set_intent(&self, intent: Intent) {
        *self.intent.lock() = Some(intent);
    }

    /// Notice that introduces this entity to a new renderer.
    #[must_use]
    pub fn spawn_notice(&self) -> Notice {
        let motion = self.motion();
        Notice::Spawn {
            id: self.id,
            kind: self.kind,
            position: motion.position,
            look: motion.look,
        }
    }

    /// Applies the pending intent and tells the renderers.
    ///
    /// Moves longer than [`MAX_RELATIVE_MOVE`] are sent as teleports, the
    /// rest as one movement-class notice. Returns the position afterwards.
    pub fn relocate(&self) -> Vec3 {
        let Some(intent) = self.intent.lock().take() else {
            return self.position();
        };

        let before = {
            let mut motion = self.motion.lock();
            let before = *motion;
            motion.position = intent.position;
            motion.look = intent.look;
            motion.on_ground = intent.on_ground;
            before
        };

        let delta = intent.position - before.position;
        let moved = delta != Vec3::ZERO;
        let turned = intent.look != before.look;
        let landed = intent.on_ground != before.on_ground;
        let on_ground = intent.on_ground;

        if delta.length() > MAX_RELATIVE_MOVE {
            self.renderers.broadcast(&Notice::Teleport {
                id: self.id,
                position: intent.position,
                look: intent.look,
                on_ground,
            });
            return intent.position;
        }

        let notice = match (moved, turned) {
            (true, true) => Some(MovementNotice::MoveRotate {
                delta,
                look: intent.look,
                on_ground,
            }),
            (true, false) => Some(MovementNotice::Move { delta, on_ground }),
            (false, true) => Some(MovementNotice::Rotate {
                look: intent.look,
                on_ground,
            }),
            (false, false) if landed => Some(MovementNotice::Stand { on_ground }),
            (false, false) => None,
        };

        if let Some(notice) = notice {
            self.renderers.begin_movement().broadcast(notice);
        }
        intent.position
    }

    /// Sets the posture flags, broadcasting a form change if they differ.
    pub fn set_forms(&self, forms: Forms) -> bool {
        let changed = {
            let mut motion = self.motion.lock();
            let changed = motion.forms != forms;
            motion.forms = forms;
            changed
        };

        if changed {
            self.renderers.broadcast(&Notice::ChangeForms { id: self.id, forms });
        }
        changed
    }

    /// Runs the behaviour, if any, and applies what it decided.
    pub(crate) fn run_routine(&self, tick: u64, spawner: Producer<'_, SpawnRequest>) {
        let Some(behavior) = &self.behavior else {
            return;
        };
        if !self.is_alive() {
            return;
        }

        let mut ctx = RoutineContext::new(tick, self.id, self.motion(), spawner);
        behavior.lock().tick(&mut ctx);

        let (intent, despawn) = ctx.finish();
        if let Some(intent) = intent {
            self.set_intent(intent);
        }
        if despawn {
            self.despawn();
        }
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("alive", &self.is_alive())
            .field("renderers", &self.renderers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, LoopbackConnection};
    use crate::render::Renderer;
    use meridian_core::ChunkLocation;
    use std::sync::Arc;

    /// Renderer that sees everything and forwards to a loopback connection.
    struct Everywhere {
        id: EntityId,
        conn: Arc<LoopbackConnection>,
    }

    impl Renderer for Everywhere {
        fn id(&self) -> EntityId {
            self.id
        }
        fn is_connected(&self) -> bool {
            self.conn.is_connected()
        }
        fn can_render(&self, _position: Vec3) -> bool {
            true
        }
        fn deliver(&self, notice: &Notice) {
            self.conn.send(notice);
        }
    }

    fn watched(position: Vec3) -> (Entity, Arc<LoopbackConnection>) {
        let entity = Entity::new(EntityId::new(1), EntityKind::Item, position, Look::default());
        let conn = LoopbackConnection::new("watcher", 4);
        let renderer: Arc<dyn Renderer> = Arc::new(Everywhere {
            id: EntityId::new(99),
            conn: Arc::clone(&conn),
        });
        assert!(entity.renderers().apply(&renderer));
        (entity, conn)
    }

    fn intent(position: Vec3, look: Look, on_ground: bool) -> Intent {
        Intent {
            position,
            look,
            on_ground,
        }
    }

    #[test]
    fn test_small_move_is_relative() {
        let (entity, conn) = watched(Vec3::ZERO);
        entity.set_intent(intent(Vec3::new(1.0, 0.0, 2.0), Look::default(), true));

        assert_eq!(entity.relocate(), Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(
            conn.received(),
            vec![Notice::Move {
                id: entity.id(),
                delta: Vec3::new(1.0, 0.0, 2.0),
                on_ground: true
            }]
        );
    }

    #[test]
    fn test_large_move_is_teleport() {
        let (entity, conn) = watched(Vec3::ZERO);
        entity.set_intent(intent(Vec3::new(100.0, 0.0, 0.0), Look::default(), true));
        entity.relocate();

        assert!(matches!(conn.received()[..], [Notice::Teleport { .. }]));
    }

    #[test]
    fn test_move_and_turn_is_one_notice() {
        let (entity, conn) = watched(Vec3::ZERO);
        entity.set_intent(intent(Vec3::new(0.5, 0.0, 0.0), Look::new(90.0, 0.0), true));
        entity.relocate();

        assert!(matches!(conn.received()[..], [Notice::MoveRotate { .. }]));
    }

    #[test]
    fn test_stand_only_when_ground_flag_changes() {
        let (entity, conn) = watched(Vec3::ZERO);

        entity.set_intent(intent(Vec3::ZERO, Look::default(), true));
        entity.relocate();
        assert!(conn.received().is_empty());

        entity.set_intent(intent(Vec3::ZERO, Look::default(), false));
        entity.relocate();
        assert_eq!(
            conn.received(),
            vec![Notice::Stand {
                id: entity.id(),
                on_ground: false
            }]
        );
    }

    #[test]
    fn test_relocate_without_intent_is_silent() {
        let (entity, conn) = watched(Vec3::new(3.0, 64.0, 3.0));
        assert_eq!(entity.relocate(), Vec3::new(3.0, 64.0, 3.0));
        assert!(conn.received().is_empty());
    }

    #[test]
    fn test_forms_broadcast_on_change_only() {
        let (entity, conn) = watched(Vec3::ZERO);
        let crouched = Forms {
            sneaking: true,
            sprinting: false,
        };

        assert!(entity.set_forms(crouched));
        assert!(!entity.set_forms(crouched));
        assert_eq!(conn.received().len(), 1);
    }

    #[test]
    fn test_bounds_span_chunk_border() {
        let entity = Entity::new(
            EntityId::new(1),
            EntityKind::Mob { type_id: 3 },
            Vec3::new(16.2, 64.0, 0.3),
            Look::default(),
        );
        let chunks = entity.chunks();

        assert_eq!(chunks.len(), 4);
        assert!(chunks.contains(ChunkLocation::new(0, -1)));
        assert!(chunks.contains(ChunkLocation::new(1, 0)));
    }

    #[test]
    fn test_despawn() {
        let entity = Entity::new(EntityId::new(1), EntityKind::Player, Vec3::ZERO, Look::default());
        assert!(entity.is_alive());
        entity.despawn();
        assert!(!entity.is_alive());
    }
}
