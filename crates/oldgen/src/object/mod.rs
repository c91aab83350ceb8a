//! Object Module - Object Layout and Start Index
//!
//! This module defines what an object looks like to the old generation
//! (a size word followed by payload) and the block index that maps any
//! address back to the object covering it.

pub mod header;
pub mod start_array;

pub use header::{get_header, write_header, ObjectHeader, ObjectRef};
pub use header::{HEADER_SIZE, MIN_OBJECT_SIZE, MIN_OBJECT_WORDS, OBJECT_ALIGNMENT};

pub use start_array::{ObjectStartArray, ObjectStartIndex, BLOCK_SIZE};
