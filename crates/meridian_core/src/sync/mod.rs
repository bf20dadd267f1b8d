//! # Synchronization Primitives for the Tick Pipeline
//!
//! ## The Problem
//!
//! ```text
//! Phase k   (workers):  DRAIN entities, re-enqueue survivors
//! Phase k+1 (workers):  DRAIN the same entities again
//!
//! Without separation: a worker re-reads an item it already handled
//! With one big lock:  every worker serializes on every item
//! ```
//!
//! ## The Solution: Double Buffering + Barrier
//!
//! ```text
//! Phase k:
//!   workers drain queue A, enqueue into queue B
//!   BARRIER
//! Coordinator:
//!   SWAP (only succeeds once A is empty)
//! Phase k+1:
//!   workers drain queue B, enqueue into queue A
//! ```

mod barrier;
mod double_buffer;

pub use barrier::{BarrierWait, PhaseBarrier};
pub use double_buffer::{Consumer, DoubleBufferedQueue, Producer, Swapper};
