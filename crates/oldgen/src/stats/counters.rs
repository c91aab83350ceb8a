//! Performance Counters - Generation and Space Capacity
//!
//! Mirrors the classic jstat-style counters: a generation counter set
//! (name, level, min/max/current capacity) and a space counter set
//! (capacity, used, max). Values are refreshed by `update_all` and can be
//! exported as a serializable snapshot.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// GenerationCounters - capacity bounds of one generation
#[derive(Debug)]
pub struct GenerationCounters {
    name: String,
    level: usize,
    spaces: usize,
    min_capacity: usize,
    max_capacity: usize,
    current_capacity: AtomicUsize,
}

/// Serializable view of `GenerationCounters`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSnapshot {
    pub name: String,
    pub level: usize,
    pub spaces: usize,
    pub min_capacity: usize,
    pub max_capacity: usize,
    pub current_capacity: usize,
}

impl GenerationCounters {
    pub fn new(
        name: &str,
        level: usize,
        spaces: usize,
        min_capacity: usize,
        max_capacity: usize,
        current_capacity: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            level,
            spaces,
            min_capacity,
            max_capacity,
            current_capacity: AtomicUsize::new(current_capacity),
        }
    }

    pub fn update_all(&self, current_capacity: usize) {
        self.current_capacity
            .store(current_capacity, Ordering::Relaxed);
    }

    pub fn current_capacity(&self) -> usize {
        self.current_capacity.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> GenerationSnapshot {
        GenerationSnapshot {
            name: self.name.clone(),
            level: self.level,
            spaces: self.spaces,
            min_capacity: self.min_capacity,
            max_capacity: self.max_capacity,
            current_capacity: self.current_capacity(),
        }
    }
}

/// SpaceCounters - usage of one space
#[derive(Debug)]
pub struct SpaceCounters {
    name: String,
    max_capacity: usize,
    capacity: AtomicUsize,
    used: AtomicUsize,
}

/// Serializable view of `SpaceCounters`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceSnapshot {
    pub name: String,
    pub max_capacity: usize,
    pub capacity: usize,
    pub used: usize,
}

impl SpaceCounters {
    pub fn new(name: &str, max_capacity: usize, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            max_capacity,
            capacity: AtomicUsize::new(capacity),
            used: AtomicUsize::new(0),
        }
    }

    pub fn update_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    pub fn update_used(&self, used: usize) {
        self.used.store(used, Ordering::Relaxed);
    }

    pub fn update_all(&self, capacity: usize, used: usize) {
        self.update_capacity(capacity);
        self.update_used(used);
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SpaceSnapshot {
        SpaceSnapshot {
            name: self.name.clone(),
            max_capacity: self.max_capacity,
            capacity: self.capacity(),
            used: self.used(),
        }
    }
}
