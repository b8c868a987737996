//! Behavioral tests for the status tree
//!
//! Covers the write contracts, revision propagation, wildcard expansion and
//! watch delivery semantics that rules, adapters and HTTP handlers rely on.

use hub_core::{Entry, Matches, Revision, StatusError};
use hub_status::Status;
use serde_json::json;

fn tree() -> Status {
    Status::with_scheme("root")
}

/// Snapshot of every node's value and revision
fn snapshot(status: &Status) -> Vec<(String, Entry)> {
    let mut nodes = Vec::new();
    let mut pending = vec!["root://".to_string()];
    while let Some(url) = pending.pop() {
        let entry = status.get(&url).unwrap();
        if let Some(children) = entry.value.as_object() {
            for name in children.keys() {
                let child = if url.ends_with("://") {
                    format!("{}{}", url, name)
                } else {
                    format!("{}/{}", url, name)
                };
                pending.push(child);
            }
        }
        nodes.push((url, entry));
    }
    nodes.sort_by(|a, b| a.0.cmp(&b.0));
    nodes
}

// ============================================================================
// Example scenarios
// ============================================================================

#[test]
fn test_set_on_empty_tree() {
    let status = tree();
    let rev = status.set("root://foo", json!(5), Revision::Exact(0)).unwrap();
    assert_eq!(rev, 1);
    assert_eq!(status.get("root://foo").unwrap(), Entry::new(1, json!(5)));
}

#[test]
fn test_stale_revision_rejected() {
    let status = tree();
    status.set("root://foo", json!(5), Revision::Exact(0)).unwrap();

    let err = status
        .set("root://foo", json!(6), Revision::Exact(0))
        .unwrap_err();
    assert!(matches!(
        err,
        StatusError::RevisionMismatch {
            expected: 0,
            actual: 1,
            ..
        }
    ));
    assert_eq!(status.get("root://foo").unwrap(), Entry::new(1, json!(5)));

    // Matching revision succeeds
    let rev = status.set("root://foo", json!(6), Revision::Exact(1)).unwrap();
    assert_eq!(rev, 2);
}

#[test]
fn test_wildcard_expansion() {
    let status = tree();
    status
        .set("root://", json!({"a": {"x": 1}, "b": {"x": 2}}), Revision::Unchecked)
        .unwrap();

    let matches = status.expand("root://*/x").unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches["root://a/x"].value, json!(1));
    assert_eq!(matches["root://b/x"].value, json!(2));
}

#[test]
fn test_watch_sees_write() {
    let status = tree();
    status
        .set("root://", json!({"a": {"x": 1}, "b": {"x": 2}}), Revision::Unchecked)
        .unwrap();
    let b_rev = status.get("root://b/x").unwrap().revision;

    let mut rx = status.watch("root://*/x").unwrap();
    assert_eq!(rx.try_recv().unwrap().len(), 2);

    let rev = status.set("root://a/x", json!(9), Revision::Unchecked).unwrap();
    let matches = rx.try_recv().unwrap();
    assert_eq!(matches["root://a/x"], Entry::new(rev, json!(9)));
    assert_eq!(matches["root://b/x"], Entry::new(b_rev, json!(2)));
}

#[test]
fn test_remove_then_expand() {
    let status = tree();
    status
        .set("root://", json!({"a": {"x": 1}, "b": {"x": 2}}), Revision::Unchecked)
        .unwrap();

    let a_rev = status.get("root://a").unwrap().revision;
    status.remove("root://a", Revision::Exact(a_rev)).unwrap();

    let matches = status.expand("root://*/x").unwrap();
    assert_eq!(matches.keys().collect::<Vec<_>>(), ["root://b/x"]);
}

// ============================================================================
// Atomicity
// ============================================================================

#[test]
fn test_failed_writes_leave_tree_identical() {
    let status = tree();
    status
        .set("root://", json!({"a": {"x": 1}, "s": "scalar"}), Revision::Unchecked)
        .unwrap();
    status.set("root://a/y", json!([1, 2]), Revision::Unchecked).unwrap();
    let before = snapshot(&status);

    // Bad revision on a new deep path
    assert!(status
        .set("root://n/e/w", json!(1), Revision::Exact(7))
        .unwrap_err()
        .is_conflict());
    // Bad revision on an existing node
    assert!(status
        .set("root://a/x", json!(2), Revision::Exact(5))
        .unwrap_err()
        .is_conflict());
    // Create-only on an existing node
    assert!(status
        .set("root://a/x", json!(2), Revision::MustNotExist)
        .unwrap_err()
        .is_conflict());
    // Bad type
    assert!(matches!(
        status
            .set("root://q/r", json!({"list": [{"nested": 1}]}), Revision::Unchecked)
            .unwrap_err(),
        StatusError::UnsupportedValue { .. }
    ));
    // Scalar where a container is required
    assert!(matches!(
        status
            .set("root://s/child", json!(1), Revision::Unchecked)
            .unwrap_err(),
        StatusError::NotContainer { .. }
    ));
    // Removals
    assert!(status
        .remove("root://a/missing", Revision::Unchecked)
        .unwrap_err()
        .is_not_found());
    assert!(status
        .remove("root://a", Revision::Exact(1))
        .unwrap_err()
        .is_conflict());

    assert_eq!(snapshot(&status), before);
}

#[test]
fn test_failed_write_does_not_notify() {
    let status = tree();
    status.set("root://a", json!(1), Revision::Unchecked).unwrap();
    let mut rx = status.watch("root://").unwrap();
    rx.try_recv().unwrap();

    let _ = status.set("root://a", json!(2), Revision::Exact(99));
    let _ = status.set("root://a/b", json!(2), Revision::Unchecked);
    assert_eq!(rx.try_recv(), None);
}

// ============================================================================
// Revisions
// ============================================================================

#[test]
fn test_revision_monotonicity() {
    let status = tree();
    status
        .set("root://", json!({"a": {"x": 1}, "b": {"y": 2}}), Revision::Unchecked)
        .unwrap();
    let b_before = status.get("root://b").unwrap().revision;
    let by_before = status.get("root://b/y").unwrap().revision;

    let mut last = status.revision();
    for i in 0..5 {
        let rev = status.set("root://a/x", json!(i), Revision::Unchecked).unwrap();
        assert_eq!(rev, last + 1);
        assert_eq!(status.revision(), rev);
        assert_eq!(status.get("root://a").unwrap().revision, rev);
        assert_eq!(status.get("root://a/x").unwrap(), Entry::new(rev, json!(i)));
        last = rev;
    }

    // Untouched sibling subtree keeps its revisions
    assert_eq!(status.get("root://b").unwrap().revision, b_before);
    assert_eq!(status.get("root://b/y").unwrap().revision, by_before);

    // Removal bumps the path to the parent
    let rev = status.remove("root://a/x", Revision::Unchecked).unwrap();
    assert_eq!(rev, last + 1);
    assert_eq!(status.get("root://a").unwrap(), Entry::new(rev, json!({})));
}

#[test]
fn test_read_your_write() {
    let status = tree();
    let rev = status
        .set("root://lights/porch", json!({"on": true, "level": 80}), Revision::MustNotExist)
        .unwrap();
    assert_eq!(
        status.get("root://lights/porch").unwrap(),
        Entry::new(rev, json!({"on": true, "level": 80}))
    );
    assert_eq!(status.get("root://lights/porch/on").unwrap(), Entry::new(rev, json!(true)));
}

#[test]
fn test_one_shot_command_cleared_with_observed_revision() {
    let status = tree();
    let mut rx = status.watch("root://cmd/reboot").unwrap();
    assert!(rx.try_recv().unwrap().is_empty());

    status
        .set("root://cmd/reboot", json!(true), Revision::MustNotExist)
        .unwrap();
    let observed = rx.try_recv().unwrap()["root://cmd/reboot"].revision;

    // A newer command arrives before the adapter clears the old one
    status
        .set("root://cmd/reboot", json!(true), Revision::Unchecked)
        .unwrap();
    let err = status
        .remove("root://cmd/reboot", Revision::Exact(observed))
        .unwrap_err();
    assert!(err.is_conflict());

    let latest = rx.try_recv().unwrap()["root://cmd/reboot"].revision;
    status
        .remove("root://cmd/reboot", Revision::Exact(latest))
        .unwrap();
    assert!(status.get("root://cmd/reboot").unwrap_err().is_not_found());
}

// ============================================================================
// Lookup errors
// ============================================================================

#[test]
fn test_get_errors() {
    let status = tree();
    status.set("root://a", json!("text"), Revision::Unchecked).unwrap();

    assert!(matches!(
        status.get("root://missing/x").unwrap_err(),
        StatusError::NotFound { ref url } if url == "root://missing"
    ));
    assert!(matches!(
        status.get("root://a/x").unwrap_err(),
        StatusError::NotContainer { ref url } if url == "root://a"
    ));
    assert!(status.get("root:/a").unwrap_err().is_invalid_url());
    assert!(status.get("root://a//b").unwrap_err().is_invalid_url());
}

// ============================================================================
// Wildcard completeness
// ============================================================================

#[test]
fn test_wildcard_completeness() {
    let status = tree();
    status
        .set(
            "root://",
            json!({
                "kitchen": {"light": {"on": true}, "sensor": {"on": false}},
                "hall": {"light": {"on": false}, "fan": 3},
                "garage": "offline"
            }),
            Revision::Unchecked,
        )
        .unwrap();

    let matches = status.expand("root://*/*/on").unwrap();
    assert_eq!(
        matches.keys().collect::<Vec<_>>(),
        [
            "root://hall/light/on",
            "root://kitchen/light/on",
            "root://kitchen/sensor/on"
        ]
    );

    let matches = status.expand("root://*/light").unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches["root://hall/light"].value, json!({"on": false}));

    let matches = status.expand("root://kitchen/*").unwrap();
    assert_eq!(
        matches.keys().collect::<Vec<_>>(),
        ["root://kitchen/light", "root://kitchen/sensor"]
    );

    assert!(status.expand("root://attic/*").unwrap().is_empty());
    assert!(status.expand("root://nothing").unwrap().is_empty());
    assert!(status.expand("root:/*").is_err());
}

// ============================================================================
// Watch delivery
// ============================================================================

#[test]
fn test_watch_coalescing() {
    let status = tree();
    let mut rx = status.watch("root://").unwrap();
    let initial = rx.try_recv().unwrap();
    assert_eq!(initial["root://"], Entry::new(0, json!({})));

    status.set("root://a", json!(1), Revision::Unchecked).unwrap();
    status.set("root://b", json!(2), Revision::Unchecked).unwrap();
    let rev = status.set("root://a", json!(3), Revision::Unchecked).unwrap();

    let matches = rx.try_recv().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches["root://"], Entry::new(rev, json!({"a": 3, "b": 2})));
    assert_eq!(rx.try_recv(), None);
}

#[test]
fn test_unrelated_writes_do_not_deliver() {
    let status = tree();
    status.set("root://a/x", json!(1), Revision::Unchecked).unwrap();
    let mut rx = status.watch("root://*/x").unwrap();
    rx.try_recv().unwrap();

    status.set("root://a/y", json!(1), Revision::Unchecked).unwrap();
    status.set("root://b/z", json!(1), Revision::Unchecked).unwrap();
    assert_eq!(rx.try_recv(), None);

    // A new match appearing is a change
    status.set("root://b/x", json!(5), Revision::Unchecked).unwrap();
    assert_eq!(rx.try_recv().unwrap().len(), 2);

    // A match disappearing is a change
    status.remove("root://b", Revision::Unchecked).unwrap();
    let matches: Matches = rx.try_recv().unwrap();
    assert_eq!(matches.keys().collect::<Vec<_>>(), ["root://a/x"]);
}

#[test]
fn test_independent_watchers() {
    let status = tree();
    let mut lights = status.watch("root://lights/*").unwrap();
    let mut doors = status.watch("root://doors/*").unwrap();
    lights.try_recv().unwrap();
    doors.try_recv().unwrap();

    status.set("root://lights/porch", json!(true), Revision::Unchecked).unwrap();
    assert!(lights.try_recv().is_some());
    assert!(doors.try_recv().is_none());

    status.release(&lights);
    status.set("root://lights/porch", json!(false), Revision::Unchecked).unwrap();
    assert!(lights.try_recv().is_none());
    assert_eq!(status.watcher_count(), 1);
}

#[tokio::test]
async fn test_slow_consumer_sees_latest_state() {
    let status = tree();
    let mut rx = status.watch("root://counter").unwrap();
    rx.recv().await.unwrap();

    let writer = status.clone();
    tokio::spawn(async move {
        for i in 0..100 {
            writer
                .set("root://counter", json!(i), Revision::Unchecked)
                .unwrap();
        }
    })
    .await
    .unwrap();

    let matches = rx.recv().await.unwrap();
    assert_eq!(matches["root://counter"].value, json!(99));
    assert_eq!(rx.try_recv(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_are_totally_ordered() {
    let status = tree();
    let mut handles = Vec::new();
    for writer in 0..8 {
        let status = status.clone();
        handles.push(tokio::spawn(async move {
            let mut revisions = Vec::new();
            for i in 0..50 {
                let url = format!("root://writers/w{}", writer);
                revisions.push(status.set(&url, json!(i), Revision::Unchecked).unwrap());
            }
            revisions
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        let revisions = handle.await.unwrap();
        assert!(revisions.windows(2).all(|w| w[0] < w[1]));
        all.extend(revisions);
    }

    all.sort_unstable();
    assert_eq!(all, (1..=400).collect::<Vec<u64>>());
    assert_eq!(status.revision(), 400);
}
