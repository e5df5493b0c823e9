// src/watermark.rs
//! Per-source detection state: newest known id, recency window, liveness time.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::history::RecencyWindow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Equals `recent_ids.front()` whenever the window is non-empty.
    #[serde(default, alias = "latest_tweet_id")]
    pub latest_id: Option<String>,
    #[serde(default, alias = "all_tweet_ids")]
    pub recent_ids: RecencyWindow,
    /// Last detection pass, whether or not it found anything.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_checked: Option<DateTime<Utc>>,
}

impl Watermark {
    /// First observation of a source: every fetched id is known, nothing is new.
    pub fn baseline<I, S>(newest_first: I, cap: usize, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let recent_ids = RecencyWindow::from_newest_first(newest_first, cap);
        Self {
            latest_id: recent_ids.front().map(str::to_string),
            recent_ids,
            last_checked: Some(now),
        }
    }

    pub fn checked_at(mut self, now: DateTime<Utc>) -> Self {
        self.last_checked = Some(now);
        self
    }

    pub fn invariants_hold(&self) -> bool {
        if !self.recent_ids.is_consistent() {
            return false;
        }
        match self.recent_ids.front() {
            Some(front) => self.latest_id.as_deref() == Some(front),
            None => true,
        }
    }

    /// Bring a loaded watermark back in line with the invariants under
    /// window size `cap`.
    pub fn repair(&mut self, cap: usize) {
        self.recent_ids.set_capacity(cap);
        match self.recent_ids.front().map(str::to_string) {
            Some(front) => {
                if self.latest_id.as_deref() != Some(front.as_str()) {
                    self.latest_id = Some(front);
                }
            }
            None => {
                if let Some(latest) = self.latest_id.clone() {
                    self.recent_ids.prepend([latest]);
                }
            }
        }
    }
}

/// Accepts RFC 3339 or a naive ISO timestamp (taken as UTC); anything else
/// reads as "never checked" instead of failing the whole state file.
fn lenient_timestamp<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|n| n.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn baseline_points_latest_at_front() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let w = Watermark::baseline(["3", "2", "2", "1"], 100, now);
        assert_eq!(w.latest_id.as_deref(), Some("3"));
        assert_eq!(w.recent_ids.len(), 3);
        assert!(w.invariants_hold());
    }

    #[test]
    fn parses_legacy_layout() {
        let raw = r#"{
            "latest_tweet_id": "19",
            "all_tweet_ids": ["19", "18", "18", "17"],
            "last_checked": "2025-01-05T10:11:12.345678"
        }"#;
        let w: Watermark = serde_json::from_str(raw).unwrap();
        assert_eq!(w.latest_id.as_deref(), Some("19"));
        assert_eq!(
            w.recent_ids.iter().collect::<Vec<_>>(),
            vec!["19", "18", "17"]
        );
        let expected = Utc.with_ymd_and_hms(2025, 1, 5, 10, 11, 12).unwrap()
            + chrono::Duration::microseconds(345_678);
        assert_eq!(w.last_checked, Some(expected));
    }

    #[test]
    fn garbage_timestamp_reads_as_unchecked() {
        let raw = r#"{"latest_id": "1", "recent_ids": ["1"], "last_checked": "yesterday"}"#;
        let w: Watermark = serde_json::from_str(raw).unwrap();
        assert!(w.last_checked.is_none());
    }

    #[test]
    fn repair_restores_invariants() {
        let mut w = Watermark {
            latest_id: Some("old".into()),
            recent_ids: RecencyWindow::from_newest_first(["new", "old", "older"], 10),
            last_checked: None,
        };
        assert!(!w.invariants_hold());
        w.repair(2);
        assert!(w.invariants_hold());
        assert_eq!(w.latest_id.as_deref(), Some("new"));
        assert_eq!(w.recent_ids.len(), 2);

        let mut only_latest = Watermark {
            latest_id: Some("7".into()),
            recent_ids: RecencyWindow::default(),
            last_checked: None,
        };
        only_latest.repair(100);
        assert_eq!(only_latest.recent_ids.front(), Some("7"));
    }
}
