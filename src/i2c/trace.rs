// Licensed under the Apache-2.0 license

//! Per-controller event trace.
//!
//! Each dispatched event leaves a snapshot of status, resulting control word and
//! mode. The ring is owned by the controller instance and dumped through the logger
//! when a transfer fails.

use heapless::HistoryBuffer;

use crate::common::Logger;
use crate::i2c::pxa_i2c::Mode;
use crate::i2c::registers::{Control, Status};

pub const TRACE_DEPTH: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    pub status: Status,
    pub control: Control,
    pub mode: Mode,
}

#[derive(Default)]
pub struct TraceLog {
    ring: HistoryBuffer<TraceEntry, TRACE_DEPTH>,
}

impl TraceLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: TraceEntry) {
        self.ring.write(entry);
    }

    /// Entries oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &TraceEntry> + '_ {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn last(&self) -> Option<&TraceEntry> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }

    pub fn dump<L: Logger>(&self, logger: &mut L) {
        for (i, e) in self.entries().enumerate() {
            logger.debug(format_args!(
                "trace[{}] mode={:?} isr={:?} icr={:?}",
                i, e.mode, e.status, e.control
            ));
        }
    }
}
