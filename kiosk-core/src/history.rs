//! Bounded "go back" ledger of previously shown screens.
//!
//! The ledger only stores asset identifiers in their wire form
//! (`assetID:userID` tokens, comma separated per screen). Going back always
//! re-fetches metadata and imagery because cached payloads may have expired.

use std::collections::VecDeque;

use kiosk_model::{HistoryEntry, ModelResult};

pub const DEFAULT_HISTORY_MAX: usize = 20;

/// Outcome of [`HistoryLedger::previous`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Previous {
    /// The screen to re-render. Both popped entries are gone from the ledger.
    Available(HistoryEntry),
    /// Fewer than two entries; callers should respond with a no-op.
    NotAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLedger {
    max: usize,
    entries: VecDeque<String>,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_MAX)
    }
}

impl HistoryLedger {
    pub fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Rebuilds a ledger from its wire form (most recent last). Blank entries
    /// are dropped and only the newest `max` survive.
    pub fn from_wire<I, S>(entries: I, max: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ledger = Self::new(max);
        for entry in entries {
            ledger.push_raw(entry.into());
        }
        ledger
    }

    pub fn push(&mut self, entry: &HistoryEntry) {
        if entry.is_empty() {
            return;
        }
        self.push_raw(entry.to_string());
    }

    fn push_raw(&mut self, entry: String) {
        if entry.trim().is_empty() {
            return;
        }
        self.entries.push_back(entry);
        while self.entries.len() > self.max {
            self.entries.pop_front();
        }
    }

    /// Pops the two most recent entries and returns the older of the two.
    ///
    /// The top entry is the screen currently displayed; the one beneath it is
    /// the screen to go back to. A malformed target leaves the ledger as it
    /// was.
    pub fn previous(&mut self) -> ModelResult<Previous> {
        let len = self.entries.len();
        if len < 2 {
            return Ok(Previous::NotAvailable);
        }
        let target: HistoryEntry = self.entries[len - 2].parse()?;
        self.entries.truncate(len - 2);
        Ok(Previous::Available(target))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn into_wire(self) -> Vec<String> {
        self.entries.into()
    }
}
