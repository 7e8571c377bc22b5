//! Concurrency utilities
//!
//! The blocking bounded priority queue that carries streams to the
//! dispatcher and frames to the writer, and the bounded byte pipe that
//! carries request bodies from the reader loop to handlers.

pub mod pipe;
pub mod queue;

pub use pipe::{pipe, PipeReader, PipeWriter};
pub use queue::{BlockingPriorityQueue, Precedence};
