//! State-change notices delivered to renderers.

use meridian_core::{EntityId, Look, Vec3};

use crate::world::{EntityKind, Forms};

/// One entity state change, as a renderer receives it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Notice {
    /// The entity came into view.
    Spawn {
        /// Entity that appeared.
        id: EntityId,
        /// What kind of entity it is.
        kind: EntityKind,
        /// Where it stands.
        position: Vec3,
        /// Where it looks.
        look: Look,
    },
    /// Relative move.
    Move {
        /// Entity that moved.
        id: EntityId,
        /// Offset from the previous position.
        delta: Vec3,
        /// Whether it now touches the ground.
        on_ground: bool,
    },
    /// Look change without movement.
    Rotate {
        /// Entity that turned.
        id: EntityId,
        /// New look.
        look: Look,
        /// Whether it touches the ground.
        on_ground: bool,
    },
    /// Relative move and look change in one notice.
    MoveRotate {
        /// Entity that moved.
        id: EntityId,
        /// Offset from the previous position.
        delta: Vec3,
        /// New look.
        look: Look,
        /// Whether it now touches the ground.
        on_ground: bool,
    },
    /// Only the on-ground flag changed.
    Stand {
        /// Entity affected.
        id: EntityId,
        /// New flag.
        on_ground: bool,
    },
    /// Absolute reposition, used when a relative move is too large.
    Teleport {
        /// Entity that moved.
        id: EntityId,
        /// New position.
        position: Vec3,
        /// New look.
        look: Look,
        /// Whether it touches the ground.
        on_ground: bool,
    },
    /// Sneaking/sprinting changed.
    ChangeForms {
        /// Entity affected.
        id: EntityId,
        /// New forms.
        forms: Forms,
    },
    /// The entity left view or was destroyed.
    Despawn {
        /// Entity that disappeared.
        id: EntityId,
    },
}

impl Notice {
    /// Entity the notice is about.
    #[must_use]
    pub const fn target(&self) -> EntityId {
        match *self {
            Notice::Spawn { id, .. }
            | Notice::Move { id, .. }
            | Notice::Rotate { id, .. }
            | Notice::MoveRotate { id, .. }
            | Notice::Stand { id, .. }
            | Notice::Teleport { id, .. }
            | Notice::ChangeForms { id, .. }
            | Notice::Despawn { id } => id,
        }
    }

    /// True for the one-shot movement class.
    #[must_use]
    pub const fn is_movement(&self) -> bool {
        matches!(
            self,
            Notice::Move { .. } | Notice::Rotate { .. } | Notice::MoveRotate { .. } | Notice::Stand { .. }
        )
    }
}

/// Movement-class notice, broadcast at most once per movement frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MovementNotice {
    /// See [`Notice::Move`].
    Move {
        /// Offset from the previous position.
        delta: Vec3,
        /// Whether it now touches the ground.
        on_ground: bool,
    },
    /// See [`Notice::Rotate`].
    Rotate {
        /// New look.
        look: Look,
        /// Whether it touches the ground.
        on_ground: bool,
    },
    /// See [`Notice::MoveRotate`].
    MoveRotate {
        /// Offset from the previous position.
        delta: Vec3,
        /// New look.
        look: Look,
        /// Whether it now touches the ground.
        on_ground: bool,
    },
    /// See [`Notice::Stand`].
    Stand {
        /// New flag.
        on_ground: bool,
    },
}

impl MovementNotice {
    /// Addresses the notice to `id`.
    #[must_use]
    pub const fn into_notice(self, id: EntityId) -> Notice {
        match self {
            MovementNotice::Move { delta, on_ground } => Notice::Move { id, delta, on_ground },
            MovementNotice::Rotate { look, on_ground } => Notice::Rotate { id, look, on_ground },
            MovementNotice::MoveRotate {
                delta,
                look,
                on_ground,
            } => Notice::MoveRotate {
                id,
                delta,
                look,
                on_ground,
            },
            MovementNotice::Stand { on_ground } => Notice::Stand { id, on_ground },
        }
    }
}
