use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Assignable,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub label: &'static str,
    pub kind: SlotKind,
}

impl TimeSlot {
    const fn assignable(label: &'static str) -> Self {
        Self {
            label,
            kind: SlotKind::Assignable,
        }
    }

    const fn pause(label: &'static str) -> Self {
        Self {
            label,
            kind: SlotKind::Break,
        }
    }

    pub fn is_break(&self) -> bool {
        self.kind == SlotKind::Break
    }
}

/// The daily slot sequence, in clock order. Index is what lab contiguity is
/// measured against, so breaks stay in the sequence.
const SLOTS: [TimeSlot; 9] = [
    TimeSlot::assignable("9:30-10:30"),
    TimeSlot::assignable("10:30-11:20"),
    TimeSlot::pause("Break"),
    TimeSlot::assignable("11:30-12:30"),
    TimeSlot::assignable("12:30-1:20"),
    TimeSlot::pause("Lunch Break"),
    TimeSlot::assignable("2:20-3:20"),
    TimeSlot::assignable("3:20-4:20"),
    TimeSlot::assignable("4:20-5:05"),
];

pub fn slots() -> &'static [TimeSlot] {
    &SLOTS
}

pub fn assignable_slots() -> impl Iterator<Item = &'static str> {
    SLOTS.iter().filter(|s| !s.is_break()).map(|s| s.label)
}

pub fn index_of(label: &str) -> Option<usize> {
    SLOTS.iter().position(|s| s.label == label)
}

pub fn slot_at(index: usize) -> Option<&'static TimeSlot> {
    SLOTS.get(index)
}

pub fn is_break(label: &str) -> bool {
    SLOTS
        .iter()
        .any(|s| s.label == label && s.kind == SlotKind::Break)
}

/// Resolves a caller-supplied label to the canonical static one.
pub fn canonical_slot(label: &str) -> Option<&'static str> {
    index_of(label.trim()).map(|i| SLOTS[i].label)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub const ALL: [Day; 6] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        }
    }

    /// Case-insensitive; stored rows always use the capitalised form.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Day::ALL
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaks_are_recognised_by_label() {
        assert!(is_break("Break"));
        assert!(is_break("Lunch Break"));
        assert!(!is_break("9:30-10:30"));
        assert!(!is_break("Tea"));
    }

    #[test]
    fn indexes_follow_clock_order() {
        assert_eq!(index_of("9:30-10:30"), Some(0));
        assert_eq!(index_of("Break"), Some(2));
        assert_eq!(index_of("4:20-5:05"), Some(8));
        assert_eq!(index_of("5:05-6:00"), None);
    }

    #[test]
    fn assignable_slots_skip_breaks() {
        let labels: Vec<_> = assignable_slots().collect();
        assert_eq!(labels.len(), 7);
        assert!(!labels.contains(&"Break"));
        assert!(!labels.contains(&"Lunch Break"));
        assert_eq!(labels.first(), Some(&"9:30-10:30"));
    }

    #[test]
    fn day_parse_ignores_case() {
        assert_eq!(Day::parse("monday"), Some(Day::Monday));
        assert_eq!(Day::parse(" SATURDAY "), Some(Day::Saturday));
        assert_eq!(Day::parse("Sunday"), None);
    }
}
