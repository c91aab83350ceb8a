//! Runtime Module - Parallel Workers
//!
//! The old generation does three kinds of bulk work in parallel:
//! - pretouching freshly committed memory
//! - walking the space block by block
//! - sizing the cooperative pretouch horizon (one stride per worker)
//!
//! All of it runs on a `WorkerPool`, which hands out task indices from a
//! shared counter to scoped threads.

pub mod workers;

pub use workers::WorkerPool;
