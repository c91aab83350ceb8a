//! Barrier Module - Card-Based Remembered Set
//!
//! Old-to-young pointers are tracked at card granularity: the write barrier
//! dirties the card holding an updated field, and the young collector scans
//! only dirty cards of the old generation.
//!
//! The card table must always cover exactly the committed part of the old
//! generation; the generation tells it the new covered range on every
//! resize, before allocators can see the new end.

pub mod card_table;

pub use card_table::{CardTable, RememberedSet, CARD_SIZE};
