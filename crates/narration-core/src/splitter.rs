//! Splits a narration request on pause markers into ordered queue entries.
//!
//! `"Welcome back. | Here is today's briefing."` becomes two entries. Every
//! segment but the last gets a delayed `on_end`: the caller's hook fires a
//! fixed pause after the segment finishes, and the engine holds the next
//! segment until the pause is over, giving an audible gap between them.

use crate::queue::{EndHook, EntryHooks, QueueEntry};
use crate::request::SpeakOptions;
use std::time::Duration;
use uuid::Uuid;

/// Character marking a pause between spoken segments
pub const PAUSE_DELIMITER: char = '|';

/// Silence inserted between segments
pub const SEGMENT_PAUSE: Duration = Duration::from_millis(1000);

/// Expand `text` into queue entries using the default segment pause.
#[must_use]
pub fn split_request(text: &str, options: &SpeakOptions) -> Vec<QueueEntry> {
    split_request_with_pause(text, options, SEGMENT_PAUSE)
}

/// Expand `text` into queue entries.
///
/// Without a delimiter the result is a single entry carrying the caller's
/// hooks as given. With delimiters, segments are trimmed and empty ones are
/// dropped, so text made only of delimiters and whitespace yields nothing.
#[must_use]
pub fn split_request_with_pause(
    text: &str,
    options: &SpeakOptions,
    pause: Duration,
) -> Vec<QueueEntry> {
    let request_id = Uuid::new_v4();

    if !text.contains(PAUSE_DELIMITER) {
        let hooks = EntryHooks {
            on_start: options.hooks.on_start.clone(),
            on_end: EndHook::Immediate(options.hooks.on_end.clone()),
            on_error: options.hooks.on_error.clone(),
        };
        return vec![make_entry(request_id, text.to_string(), options, hooks)];
    }

    let segments: Vec<&str> = text
        .split(PAUSE_DELIMITER)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();
    let last = segments.len().saturating_sub(1);

    segments
        .into_iter()
        .enumerate()
        .map(|(index, segment)| {
            let on_end = if index < last {
                EndHook::Delayed {
                    pause,
                    hook: options.hooks.on_end.clone(),
                }
            } else {
                EndHook::Immediate(options.hooks.on_end.clone())
            };
            let hooks = EntryHooks {
                on_start: options.hooks.on_start.clone(),
                on_end,
                on_error: options.hooks.on_error.clone(),
            };
            make_entry(request_id, segment.to_string(), options, hooks)
        })
        .collect()
}

fn make_entry(
    request_id: Uuid,
    text: String,
    options: &SpeakOptions,
    hooks: EntryHooks,
) -> QueueEntry {
    QueueEntry {
        request_id,
        text,
        voice_id: options.voice_id.clone(),
        priority: options.priority,
        hooks,
    }
}
