//! # Connection Contract
//!
//! What the world needs from the network layer. Wire encoding and the
//! handshake live on the other side of this trait.
//!
//! [`LoopbackConnection`] is an in-memory implementation: it records every
//! notice it is sent and hands back inputs pushed into it. Tests and the
//! simulation harness drive the world through it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use meridian_core::{EntityId, Look, Vec3};
use parking_lot::Mutex;

use crate::render::Notice;
use crate::world::Forms;

/// Client input applied during start-observer-routines.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObserverInput {
    /// Where the client says its player stands.
    pub position: Vec3,
    /// Where it looks.
    pub look: Look,
    /// Whether it touches the ground.
    pub on_ground: bool,
    /// Sneaking/sprinting.
    pub forms: Forms,
}

/// One client connection, as seen by the world.
pub trait Connection: Send + Sync {
    /// Label for logs.
    fn name(&self) -> &str;

    /// False once the peer is gone.
    fn is_connected(&self) -> bool;

    /// Sends one notice. A no-op once disconnected.
    fn send(&self, notice: &Notice);

    /// Next queued input, oldest first.
    fn poll_input(&self) -> Option<ObserverInput>;

    /// Render distance the client asked for, in chunks.
    fn view_distance(&self) -> u32;

    /// Closes the connection from the server side.
    fn close(&self);
}

/// In-memory [`Connection`].
pub struct LoopbackConnection {
    name: String,
    view_distance: AtomicU32,
    connected: AtomicBool,
    closed: AtomicBool,
    input_tx: Sender<ObserverInput>,
    input_rx: Receiver<ObserverInput>,
    received: Mutex<Vec<Notice>>,
}

impl LoopbackConnection {
    /// Creates a connected loopback asking for `view_distance` chunks.
    #[must_use]
    pub fn new(name: impl Into<String>, view_distance: u32) -> Arc<Self> {
        let (input_tx, input_rx) = unbounded();
        Arc::new(Self {
            name: name.into(),
            view_distance: AtomicU32::new(view_distance),
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            input_tx,
            input_rx,
            received: Mutex::new(Vec::new()),
        })
    }

    /// Queues client input for the next tick.
    pub fn push_input(&self, input: ObserverInput) {
        let _ = self.input_tx.send(input);
    }

    /// Simulates the peer going away.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// True once the server closed this connection.
    #[must_use]
    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Copy of every notice received so far.
    #[must_use]
    pub fn received(&self) -> Vec<Notice> {
        self.received.lock().clone()
    }

    /// Removes and returns every notice received so far.
    pub fn take_received(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.received.lock())
    }

    /// Entities the client currently has spawned, replaying the notices.
    #[must_use]
    pub fn visible(&self) -> HashSet<EntityId> {
        let mut visible = HashSet::new();
        for notice in self.received.lock().iter() {
            match *notice {
                Notice::Spawn { id, .. } => {
                    visible.insert(id);
                }
                Notice::Despawn { id } => {
                    visible.remove(&id);
                }
                _ => {}
            }
        }
        visible
    }
}

impl Connection for LoopbackConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, notice: &Notice) {
        if self.is_connected() {
            self.received.lock().push(*notice);
        }
    }

    fn poll_input(&self) -> Option<ObserverInput> {
        self.input_rx.try_recv().ok()
    }

    fn view_distance(&self) -> u32 {
        self.view_distance.load(Ordering::Relaxed)
    }

    fn close(&self) {
        self.connected.store(false, Ordering::Release);
        self.closed.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for LoopbackConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackConnection")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .field("received", &self.received.lock().len())
            .finish()
    }
}
