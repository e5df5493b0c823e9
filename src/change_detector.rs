//! # Change Detector
//! Pure function from `(previous watermark, fresh fetch)` to
//! `(new items, next watermark)`. No I/O, no clock reads.
//!
//! The fetch is newest-first. Scanning stops at the first id already in the
//! recency window: everything older than a known id is assumed known too.
//! When no known id shows up at all, every fetched item counts as new; items
//! that scrolled past both the fetch and the window cannot be recovered.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::ingest::types::Item;
use crate::watermark::Watermark;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectOutcome {
    /// Fetch returned nothing; only liveness advances.
    Empty,
    /// First observation; baseline stored, nothing reported.
    ColdStart,
    /// Newest fetched item is already known.
    Unchanged,
    NewItems,
}

#[derive(Debug, Clone)]
pub struct Detection {
    pub outcome: DetectOutcome,
    /// Oldest-first, ready for delivery.
    pub new_items: Vec<Item>,
    /// State to commit. `None` only for an empty fetch of a never-seen source.
    pub watermark: Option<Watermark>,
    /// Set when the scan ran off the end of the fetch without meeting a known id.
    pub overlap_lost: bool,
}

impl Detection {
    fn quiet(outcome: DetectOutcome, watermark: Option<Watermark>) -> Self {
        Self {
            outcome,
            new_items: Vec::new(),
            watermark,
            overlap_lost: false,
        }
    }
}

/// Classify `fetched` against `previous` using a window of `window` ids.
pub fn detect(
    previous: Option<&Watermark>,
    fetched: &[Item],
    window: usize,
    now: DateTime<Utc>,
) -> Detection {
    // 1) No data is not evidence of no news.
    let Some(head) = fetched.first() else {
        return Detection::quiet(
            DetectOutcome::Empty,
            previous.cloned().map(|w| w.checked_at(now)),
        );
    };

    // 2) Cold start: remember everything, report nothing.
    let Some(prev) = previous else {
        let baseline = Watermark::baseline(fetched.iter().map(|it| it.id.as_str()), window, now);
        return Detection::quiet(DetectOutcome::ColdStart, Some(baseline));
    };

    // 3) Head unchanged.
    if prev.latest_id.as_deref() == Some(head.id.as_str()) {
        return Detection::quiet(DetectOutcome::Unchanged, Some(prev.clone().checked_at(now)));
    }

    // 4) Collect the run of unknown ids from the top.
    let mut seen: HashSet<&str> = HashSet::new();
    let mut fresh: Vec<&Item> = Vec::new();
    let mut overlap_found = false;
    for item in fetched {
        if prev.recent_ids.contains(&item.id) {
            overlap_found = true;
            break;
        }
        if seen.insert(item.id.as_str()) {
            fresh.push(item);
        }
    }

    // Head differs from latest_id but is known (e.g. the newest item was
    // deleted upstream): nothing new, keep the stored order.
    if fresh.is_empty() {
        return Detection::quiet(DetectOutcome::Unchanged, Some(prev.clone().checked_at(now)));
    }

    // 5) Commit: new ids go in front, oldest ids fall out.
    let mut next = prev.clone();
    next.recent_ids.set_capacity(window);
    next.recent_ids
        .prepend(fresh.iter().map(|it| it.id.as_str()).collect::<Vec<_>>());
    next.latest_id = next.recent_ids.front().map(str::to_string);
    next.last_checked = Some(now);

    // 6) Oldest-first for delivery.
    let new_items: Vec<Item> = fresh.into_iter().rev().cloned().collect();

    Detection {
        outcome: DetectOutcome::NewItems,
        new_items,
        watermark: Some(next),
        overlap_lost: !overlap_found,
    }
}
