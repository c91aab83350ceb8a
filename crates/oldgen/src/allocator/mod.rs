//! Allocator Module - Old Generation Object Space
//!
//! - **Bump Space**: lock-free bump allocation over the committed range
//! - **Space Mangler**: poisons memory above `top` for debugging

pub mod bump;
pub mod mangler;

pub use bump::{BumpSpace, PretouchSetup};
pub use mangler::{SpaceMangler, MANGLE_PATTERN};
