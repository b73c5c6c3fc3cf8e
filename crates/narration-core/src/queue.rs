//! Pending queue of playable entries and the playback state they move through.

use crate::error::NarrationError;
use crate::request::{ErrorHook, Hook, Priority};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Playback state of the narration engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing in flight
    #[default]
    Idle,
    /// Waiting for the synthesis service
    Synthesizing,
    /// Audio is playing
    Playing,
}

impl PlaybackState {
    /// Whether an entry is synthesizing or playing
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Synthesizing => write!(f, "Synthesizing"),
            Self::Playing => write!(f, "Playing"),
        }
    }
}

/// The `on_end` hook of a queue entry
#[derive(Clone)]
pub enum EndHook {
    /// Fires as soon as playback completes
    Immediate(Option<Hook>),
    /// Fires after `pause` has elapsed past playback completion; the next
    /// entry does not start before the pause is over
    Delayed {
        /// Silence between this segment and the next
        pause: Duration,
        /// Caller hook fired once the pause is over
        hook: Option<Hook>,
    },
}

impl EndHook {
    /// Pause that follows playback, if any
    #[must_use]
    pub const fn pause(&self) -> Option<Duration> {
        match self {
            Self::Immediate(_) => None,
            Self::Delayed { pause, .. } => Some(*pause),
        }
    }

    /// The caller's hook, wrapped or not
    #[must_use]
    pub const fn hook(&self) -> Option<&Hook> {
        match self {
            Self::Immediate(hook) | Self::Delayed { hook, .. } => hook.as_ref(),
        }
    }
}

impl fmt::Debug for EndHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(hook) => f.debug_tuple("Immediate").field(&hook.is_some()).finish(),
            Self::Delayed { pause, hook } => f
                .debug_struct("Delayed")
                .field("pause", pause)
                .field("hook", &hook.is_some())
                .finish(),
        }
    }
}

/// Hooks attached to a single queue entry
#[derive(Clone)]
pub struct EntryHooks {
    /// Fired when the entry starts synthesizing
    pub on_start: Option<Hook>,
    /// Fired when the entry finishes playing
    pub on_end: EndHook,
    /// Fired when the entry fails
    pub on_error: Option<ErrorHook>,
}

impl EntryHooks {
    pub(crate) fn notify_start(&self) {
        if let Some(hook) = &self.on_start {
            hook();
        }
    }

    pub(crate) fn notify_error(&self, err: &NarrationError) {
        if let Some(hook) = &self.on_error {
            hook(err);
        }
    }
}

impl fmt::Debug for EntryHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryHooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_end", &self.on_end)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// One atomic, playable unit derived from a narration request
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Request this entry was split from
    pub request_id: Uuid,
    /// Text to synthesize
    pub text: String,
    /// Voice profile, engine default when absent
    pub voice_id: Option<String>,
    /// Queue priority
    pub priority: Priority,
    /// Lifecycle hooks
    pub hooks: EntryHooks,
}

struct Pending {
    sequence: u64,
    entry: QueueEntry,
}

impl Pending {
    fn key(&self) -> (u8, Reverse<u64>) {
        (self.entry.priority.weight(), Reverse(self.sequence))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Priority queue of pending entries.
///
/// Pops the highest weight first; entries of equal weight come out in the
/// order they were pushed.
#[derive(Default)]
pub struct PendingQueue {
    heap: BinaryHeap<Pending>,
    next_sequence: u64,
}

impl PendingQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry behind everything of the same priority
    pub fn push(&mut self, entry: QueueEntry) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Pending { sequence, entry });
    }

    /// Remove the next entry to play
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.heap.pop().map(|pending| pending.entry)
    }

    /// Drop every pending entry, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let discarded = self.heap.len();
        self.heap.clear();
        discarded
    }

    /// Number of pending entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl fmt::Debug for PendingQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingQueue")
            .field("len", &self.heap.len())
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}
