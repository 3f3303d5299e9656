// Suggestion queue - proposed notes highlighted for a while, then committed
//
// One timer at most: the note currently highlighted has a deadline, the rest
// wait in order. Cancelling bumps a generation counter so tokens handed out
// earlier report the cancellation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Note proposed by an external service, already resolved to grid cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestedNote {
    pub instrument: usize,
    pub pitch: usize,
    pub step: usize,
    pub length: u32,
}

/// What the owner of the queue should do now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionAction {
    /// Show the note as pending
    Highlight(SuggestedNote),
    /// Highlight elapsed; write the note into the grid
    Commit(SuggestedNote),
}

/// Handle telling whether a batch of suggestions is still wanted
#[derive(Debug, Clone)]
pub struct CancellationToken {
    generation: Arc<AtomicU64>,
    issued: u64,
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        self.generation.load(Ordering::Acquire) != self.issued
    }
}

/// Suggestion handed back to the caller once queued
#[derive(Debug, Clone)]
pub struct PendingSuggestion {
    pub note: SuggestedNote,
    pub token: CancellationToken,
}

/// Cancellable queue of timed suggestion actions
pub struct SuggestionQueue {
    highlight: Duration,
    pending: VecDeque<SuggestedNote>,
    current: Option<(SuggestedNote, Instant)>,
    generation: Arc<AtomicU64>,
}

impl SuggestionQueue {
    pub fn new(highlight: Duration) -> Self {
        Self {
            highlight,
            pending: VecDeque::new(),
            current: None,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace whatever is outstanding with a new batch
    pub fn enqueue(&mut self, notes: impl IntoIterator<Item = SuggestedNote>) -> CancellationToken {
        self.cancel();
        self.pending.extend(notes);
        self.token()
    }

    /// Token for the batch currently queued
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            generation: Arc::clone(&self.generation),
            issued: self.generation.load(Ordering::Acquire),
        }
    }

    /// Drop every pending action; returns whether anything was outstanding
    pub fn cancel(&mut self) -> bool {
        let outstanding = !self.is_idle();
        self.pending.clear();
        self.current = None;
        self.generation.fetch_add(1, Ordering::AcqRel);
        outstanding
    }

    /// Actions due at `now`, in order
    pub fn poll(&mut self, now: Instant) -> Vec<SuggestionAction> {
        let mut actions = Vec::new();
        loop {
            match self.current {
                Some((note, deadline)) => {
                    if now < deadline {
                        break;
                    }
                    actions.push(SuggestionAction::Commit(note));
                    self.current = None;
                }
                None => match self.pending.pop_front() {
                    Some(note) => {
                        actions.push(SuggestionAction::Highlight(note));
                        self.current = Some((note, now + self.highlight));
                    }
                    None => break,
                },
            }
        }
        actions
    }

    /// Deadline of the single outstanding timer
    pub fn deadline(&self) -> Option<Instant> {
        self.current.map(|(_, deadline)| deadline)
    }

    /// Note currently highlighted
    pub fn highlighted(&self) -> Option<SuggestedNote> {
        self.current.map(|(note, _)| note)
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }
}
