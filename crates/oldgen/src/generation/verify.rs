//! Diagnostics - Verification, Summaries and Counters

use super::OldGen;
use crate::logging::{log_event, GenEvent};
use crate::util::constants::HEAP_WORD_SIZE;
use crate::util::debug::to_kb;
use std::fmt;

impl OldGen {
    /// Check the space is parsable and every side table matches it
    ///
    /// Panics through `guarantee!` on the first violation.
    pub fn verify(&self) {
        self.object_space.verify();

        let space = self.object_space.region();
        crate::guarantee!(
            self.remembered_set.covered_region() == space,
            "card table covers {}, space is {}",
            self.remembered_set.covered_region(),
            space
        );
        crate::guarantee!(
            self.start_index.covered_region() == space,
            "object start index covers {}, space is {}",
            self.start_index.covered_region(),
            space
        );
        crate::guarantee!(
            self.reserved.contains_region(&space),
            "space {} escapes reservation {}",
            space,
            self.reserved
        );
        crate::guarantee!(
            space.byte_size() <= self.max_gen_size,
            "capacity {} above max {}",
            space.byte_size(),
            self.max_gen_size
        );
        crate::guarantee!(
            self.next_pretouch() <= space.end(),
            "pretouch cursor {:#x} past end {:#x}",
            self.next_pretouch(),
            space.end()
        );
    }

    /// Check every object is found from its second word
    pub fn verify_object_start_index(&self) {
        self.object_space.object_iterate(|obj| {
            let addr = obj.addr();
            crate::guarantee!(
                self.start_index.is_block_allocated(addr),
                "block of object {:#x} has no recorded start",
                addr
            );
            // Objects are at least two words, so this stays inside `obj`.
            let interior = addr + HEAP_WORD_SIZE;
            let found = self.start_index.object_start(interior);
            crate::guarantee!(
                found == addr,
                "object start lookup for {:#x} found {:#x}, object is at {:#x}",
                interior,
                found,
                addr
            );
        });
    }

    /// Write the two-line summary
    ///
    /// ```text
    ///  old             total 4096K, used 12K [0x7f.., 0x7f.., 0x7f..)
    ///   object space 4096K, 0% used [0x7f.., 0x7f.., 0x7f..)
    /// ```
    pub fn print_on<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        write!(out, " {:<15}", self.name)?;
        write!(
            out,
            " total {}K, used {}K",
            to_kb(self.capacity_in_bytes()),
            to_kb(self.used_in_bytes())
        )?;
        writeln!(
            out,
            " [{:#x}, {:#x}, {:#x})",
            self.reserved.start(),
            self.object_space.end(),
            self.reserved.end()
        )?;
        writeln!(out, "  object {}", self.object_space.summary())
    }

    /// Log the summary at info level and return it
    pub fn print_summary(&self) -> String {
        let mut text = String::new();
        // Writing to a String cannot fail.
        let _ = self.print_on(&mut text);

        for line in text.lines() {
            log::info!("{}", line);
        }
        log_event(GenEvent::Summary {
            name: self.name.clone(),
            capacity_kb: to_kb(self.capacity_in_bytes()),
            used_kb: to_kb(self.used_in_bytes()),
            low: self.reserved.start(),
            high: self.object_space.end(),
            high_boundary: self.reserved.end(),
        });
        text
    }

    /// Refresh the performance counters
    pub fn update_counters(&self) {
        if self.config.use_perf_data {
            let capacity = self.capacity_in_bytes();
            self.space_counters
                .update_all(capacity, self.used_in_bytes());
            self.gen_counters.update_all(capacity);
        }
    }

    /// Record the current top as the mangling high-water mark
    pub fn record_spaces_top(&self) {
        self.object_space.set_top_for_allocations();
    }
}
