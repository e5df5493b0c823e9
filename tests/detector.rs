// tests/detector.rs
use chrono::{DateTime, TimeZone, Utc};
use feedwatch::{detect, DetectOutcome, Item, Watermark};

fn items(ids: &[&str]) -> Vec<Item> {
    ids.iter().map(|id| Item::with_id(*id)).collect()
}

fn ids(v: &[Item]) -> Vec<&str> {
    v.iter().map(|i| i.id.as_str()).collect()
}

fn window(wm: &Watermark) -> Vec<&str> {
    wm.recent_ids.iter().collect()
}

fn at(min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, min, 0).unwrap()
}

#[test]
fn cold_start_reports_nothing_and_remembers_everything() {
    let d = detect(None, &items(&["c", "b", "a"]), 100, at(0));
    assert_eq!(d.outcome, DetectOutcome::ColdStart);
    assert!(d.new_items.is_empty());

    let wm = d.watermark.expect("baseline committed");
    assert_eq!(wm.latest_id.as_deref(), Some("c"));
    assert_eq!(window(&wm), vec!["c", "b", "a"]);
    assert_eq!(wm.last_checked, Some(at(0)));
}

#[test]
fn same_fetch_twice_is_a_no_op() {
    let fetch = items(&["c", "b", "a"]);
    let first = detect(None, &fetch, 100, at(0)).watermark.unwrap();
    let d = detect(Some(&first), &fetch, 100, at(1));

    assert_eq!(d.outcome, DetectOutcome::Unchanged);
    assert!(d.new_items.is_empty());
    let wm = d.watermark.unwrap();
    assert_eq!(wm.latest_id, first.latest_id);
    assert_eq!(wm.recent_ids, first.recent_ids);
    assert_eq!(wm.last_checked, Some(at(1)));
}

#[test]
fn single_new_item_on_top() {
    let prev = Watermark::baseline(["b", "a"], 100, at(0));
    let d = detect(Some(&prev), &items(&["c", "b", "a"]), 100, at(1));

    assert_eq!(d.outcome, DetectOutcome::NewItems);
    assert_eq!(ids(&d.new_items), vec!["c"]);
    let wm = d.watermark.unwrap();
    assert_eq!(wm.latest_id.as_deref(), Some("c"));
    assert_eq!(window(&wm), vec!["c", "b", "a"]);
    assert!(!d.overlap_lost);
}

#[test]
fn several_new_items_are_returned_oldest_first() {
    let prev = Watermark::baseline(["c", "d"], 100, at(0));
    let d = detect(Some(&prev), &items(&["a", "b", "c"]), 100, at(1));

    assert_eq!(ids(&d.new_items), vec!["b", "a"]);
    let wm = d.watermark.unwrap();
    assert_eq!(wm.latest_id.as_deref(), Some("a"));
    assert_eq!(window(&wm), vec!["a", "b", "c", "d"]);
}

#[test]
fn window_is_bounded_and_drops_the_oldest() {
    let old: Vec<String> = (0..100).map(|i| format!("old{i:03}")).collect();
    let prev = Watermark::baseline(old.iter().map(String::as_str), 100, at(0));
    assert_eq!(prev.recent_ids.len(), 100);

    let d = detect(
        Some(&prev),
        &items(&["new2", "new1", "old000", "old001"]),
        100,
        at(1),
    );
    assert_eq!(ids(&d.new_items), vec!["new1", "new2"]);

    let wm = d.watermark.unwrap();
    assert_eq!(wm.recent_ids.len(), 100);
    let w = window(&wm);
    assert_eq!(&w[..3], &["new2", "new1", "old000"]);
    assert!(!wm.recent_ids.contains("old099"));
    assert!(!wm.recent_ids.contains("old098"));
    assert!(wm.recent_ids.contains("old097"));
}

#[test]
fn replaying_the_same_fetch_after_commit_yields_nothing() {
    let prev = Watermark::baseline(["a"], 100, at(0));
    let fetch = items(&["c", "b", "a"]);

    let first = detect(Some(&prev), &fetch, 100, at(1));
    assert_eq!(ids(&first.new_items), vec!["b", "c"]);

    let committed = first.watermark.unwrap();
    let again = detect(Some(&committed), &fetch, 100, at(2));
    assert_eq!(again.outcome, DetectOutcome::Unchanged);
    assert!(again.new_items.is_empty());
}

#[test]
fn no_overlap_reports_all_fetched_and_flags_it() {
    let prev = Watermark::baseline(["x", "y"], 100, at(0));
    let d = detect(Some(&prev), &items(&["c", "b", "a"]), 100, at(1));

    assert_eq!(ids(&d.new_items), vec!["a", "b", "c"]);
    assert!(d.overlap_lost);
    assert_eq!(window(d.watermark.as_ref().unwrap()), vec!["c", "b", "a", "x", "y"]);
}

#[test]
fn duplicate_ids_in_one_fetch_are_reported_once() {
    let prev = Watermark::baseline(["a"], 100, at(0));
    let d = detect(Some(&prev), &items(&["c", "b", "c", "a"]), 100, at(1));

    assert_eq!(ids(&d.new_items), vec!["b", "c"]);
    let wm = d.watermark.unwrap();
    assert_eq!(window(&wm), vec!["c", "b", "a"]);
}

#[test]
fn known_head_that_is_not_latest_changes_nothing() {
    // Newest post deleted upstream: the feed now starts at an older known id.
    let prev = Watermark::baseline(["c", "b", "a"], 100, at(0));
    let d = detect(Some(&prev), &items(&["b", "a"]), 100, at(1));

    assert_eq!(d.outcome, DetectOutcome::Unchanged);
    let wm = d.watermark.unwrap();
    assert_eq!(wm.latest_id.as_deref(), Some("c"));
    assert_eq!(window(&wm), vec!["c", "b", "a"]);
}

#[test]
fn every_committed_watermark_satisfies_the_invariants() {
    let fetches: Vec<Vec<Item>> = vec![
        items(&["b", "a"]),
        items(&["d", "c", "b"]),
        items(&[]),
        items(&["d", "c"]),
        items(&["f", "e", "e", "d"]),
        items(&["z"]),
    ];

    let mut state: Option<Watermark> = None;
    for (i, fetch) in fetches.iter().enumerate() {
        let d = detect(state.as_ref(), fetch, 4, at(i as u32));
        if let Some(wm) = d.watermark {
            assert!(wm.invariants_hold(), "step {i}: {wm:?}");
            assert!(wm.recent_ids.len() <= 4, "step {i}: window over capacity");
            state = Some(wm);
        }
    }
    assert_eq!(state.unwrap().latest_id.as_deref(), Some("z"));
}

#[test]
fn hundred_brand_new_ids_push_the_old_window_out() {
    let prev = Watermark::baseline(["z"], 100, at(0));
    let fresh: Vec<String> = (0..100).rev().map(|i| format!("n{i:03}")).collect();
    let fetch: Vec<Item> = fresh.iter().map(|id| Item::with_id(id.as_str())).collect();

    let d = detect(Some(&prev), &fetch, 100, at(1));
    assert_eq!(d.new_items.len(), 100);
    assert_eq!(d.new_items[0].id, "n000");
    assert_eq!(d.new_items[99].id, "n099");
    assert!(d.overlap_lost);

    let wm = d.watermark.unwrap();
    assert_eq!(wm.recent_ids.len(), 100);
    assert!(!wm.recent_ids.contains("z"));
    assert_eq!(wm.latest_id.as_deref(), Some("n099"));
}

#[test]
fn new_item_ahead_of_a_longer_window() {
    let prev = Watermark::baseline(["b", "c", "d"], 100, at(0));
    let d = detect(Some(&prev), &items(&["a", "b", "c"]), 100, at(1));

    assert_eq!(ids(&d.new_items), vec!["a"]);
    let wm = d.watermark.unwrap();
    assert_eq!(wm.latest_id.as_deref(), Some("a"));
    assert_eq!(window(&wm), vec!["a", "b", "c", "d"]);
}

#[test]
fn id_evicted_from_the_window_is_new_again() {
    let prev = Watermark::baseline(["c", "b"], 2, at(0));

    let d = detect(Some(&prev), &items(&["d", "c"]), 2, at(1));
    assert_eq!(ids(&d.new_items), vec!["d"]);
    let wm = d.watermark.unwrap();
    assert_eq!(window(&wm), vec!["d", "c"]);
    assert!(!wm.recent_ids.contains("b"));

    // "b" resurfaces at the head (e.g. re-pinned) after it left the window.
    let again = detect(Some(&wm), &items(&["b", "d"]), 2, at(2));
    assert_eq!(again.outcome, DetectOutcome::NewItems);
    assert_eq!(ids(&again.new_items), vec!["b"]);
    assert_eq!(window(again.watermark.as_ref().unwrap()), vec!["b", "d"]);
}
