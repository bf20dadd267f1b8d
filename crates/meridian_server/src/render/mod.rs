//! # Renderer Fan-out
//!
//! Multicast of entity state changes to the observers that can see the
//! entity.
//!
//! ```text
//!   entity E ── RendererSet ──┬── observer A  (Spawn, Move, ..., Despawn)
//!                             ├── observer B
//!                             └── observer C
//! ```
//!
//! Movement-class notices (move, rotate, move-rotate, stand) are one-shot
//! per movement frame: [`RendererSet::begin_movement`] opens the frame and
//! [`MovementFrame::broadcast`] consumes it. Teleports, form changes and
//! despawns go through [`RendererSet::broadcast`] with no such limit.
//!
//! The set does no entity-level locking. Callers copy position and look out
//! of the entity before calling in.

mod fanout;
mod notice;

pub use fanout::{MovementFrame, RenderPass, RendererSet};
pub use notice::{MovementNotice, Notice};

use meridian_core::{EntityId, Vec3};

/// One connected client's view of the world.
pub trait Renderer: Send + Sync {
    /// Identifier of the observer's own entity.
    fn id(&self) -> EntityId;

    /// False once the underlying connection is gone.
    fn is_connected(&self) -> bool;

    /// True if something standing at `position` is within view.
    fn can_render(&self, position: Vec3) -> bool;

    /// Delivers one notice. A no-op once disconnected.
    fn deliver(&self, notice: &Notice);
}
