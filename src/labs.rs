//! Lab sessions span several consecutive slots. At save time one selection is
//! expanded into per-slot labels; at read time the flat per-slot entries are
//! folded back into display blocks.
//!
//! Suppression of the trailing slots of a block is always derived from the
//! stored entries. Nothing here is persisted.

use crate::db::TimetableEntry;
use crate::grid::{self, Day};
use serde::Serialize;
use std::collections::HashMap;

/// Longest run folded into one display block.
pub const MAX_BLOCK_SPAN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpanError {
    #[error("unknown time slot: {0}")]
    UnknownSlot(String),
    #[error("span must be in 1..={max}, got {span}")]
    OutOfRange { span: usize, max: usize },
    #[error("cannot combine hours across breaks or end of day")]
    Overrun {
        start: &'static str,
        span: usize,
        /// Offset from `start` of the first position that is a break or past
        /// the end of the day.
        position: usize,
    },
}

/// Labels of the `span` consecutive slots starting at `start`.
///
/// All-or-nothing: if any position is a break or runs past the last slot, no
/// labels are returned.
pub fn expand_span(
    start: &str,
    span: usize,
    max_span: usize,
) -> Result<Vec<&'static str>, SpanError> {
    if span == 0 || span > max_span {
        return Err(SpanError::OutOfRange {
            span,
            max: max_span,
        });
    }
    let start_idx = grid::index_of(start).ok_or_else(|| SpanError::UnknownSlot(start.into()))?;
    let start_label = grid::slots()[start_idx].label;

    let mut out = Vec::with_capacity(span);
    for offset in 0..span {
        match grid::slot_at(start_idx + offset) {
            Some(slot) if !slot.is_break() => out.push(slot.label),
            _ => {
                return Err(SpanError::Overrun {
                    start: start_label,
                    span,
                    position: offset,
                })
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabBlock {
    pub day: Day,
    pub start_slot: &'static str,
    pub span: usize,
    pub subject_code: String,
    pub lecturer_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderedCell<'a> {
    Break {
        slot: &'static str,
    },
    Empty {
        slot: &'static str,
    },
    Entry {
        slot: &'static str,
        span: usize,
        entry: &'a TimetableEntry,
    },
}

fn continues_lab(prev: &TimetableEntry, next: &TimetableEntry) -> bool {
    next.is_lab
        && prev.is_lab
        && next.subject_code == prev.subject_code
        && next.lecturer_name == prev.lecturer_name
}

/// Entries of one day laid out by slot index.
fn day_row<'a>(entries: &'a [TimetableEntry], day: Day) -> Vec<Option<&'a TimetableEntry>> {
    let by_slot: HashMap<&str, &TimetableEntry> = entries
        .iter()
        .filter(|e| Day::parse(&e.day) == Some(day))
        .map(|e| (e.time_slot.as_str(), e))
        .collect();
    grid::slots()
        .iter()
        .map(|s| {
            if s.is_break() {
                None
            } else {
                by_slot.get(s.label).copied()
            }
        })
        .collect()
}

/// Span of the block starting at `idx`: 1 for non-lab entries, otherwise the
/// run of matching lab entries capped at `MAX_BLOCK_SPAN`.
fn block_span(row: &[Option<&TimetableEntry>], idx: usize) -> usize {
    let Some(first) = row[idx] else {
        return 1;
    };
    if !first.is_lab {
        return 1;
    }
    let mut span = 1;
    while span < MAX_BLOCK_SPAN {
        match row.get(idx + span).copied().flatten() {
            Some(next) if continues_lab(first, next) => span += 1,
            _ => break,
        }
    }
    span
}

/// Left-to-right scan of one day. Slots covered by an earlier block are
/// omitted from the output.
pub fn merge_day(entries: &[TimetableEntry], day: Day) -> Vec<RenderedCell<'_>> {
    let row = day_row(entries, day);
    let slots = grid::slots();
    let mut out = Vec::with_capacity(slots.len());
    let mut idx = 0;
    while idx < slots.len() {
        let slot = slots[idx].label;
        if slots[idx].is_break() {
            out.push(RenderedCell::Break { slot });
            idx += 1;
            continue;
        }
        match row[idx] {
            None => {
                out.push(RenderedCell::Empty { slot });
                idx += 1;
            }
            Some(entry) => {
                let span = block_span(&row, idx);
                out.push(RenderedCell::Entry { slot, span, entry });
                idx += span;
            }
        }
    }
    out
}

pub fn lab_blocks(entries: &[TimetableEntry], day: Day) -> Vec<LabBlock> {
    merge_day(entries, day)
        .into_iter()
        .filter_map(|cell| match cell {
            RenderedCell::Entry { slot, span, entry } if entry.is_lab => Some(LabBlock {
                day,
                start_slot: slot,
                span,
                subject_code: entry.subject_code.clone(),
                lecturer_name: entry.lecturer_name.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// Slots that hold an entry but are not rendered on their own because an
/// earlier lab block covers them.
pub fn hidden_slots(entries: &[TimetableEntry], day: Day) -> Vec<&'static str> {
    let mut hidden = Vec::new();
    for block in lab_blocks(entries, day) {
        let Some(start) = grid::index_of(block.start_slot) else {
            continue;
        };
        for offset in 1..block.span {
            if let Some(slot) = grid::slot_at(start + offset) {
                hidden.push(slot.label);
            }
        }
    }
    hidden
}
