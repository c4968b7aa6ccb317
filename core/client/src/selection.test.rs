use pretty_assertions::assert_eq;

use super::*;

fn server(host: &str, total: u16, running: u16, queued: u16) -> ToolServerInfo {
    ToolServerInfo {
        host: host.to_string(),
        port: 7767,
        total_threads: total,
        running_tasks: running,
        queued_tasks: queued,
        tool_ids: vec!["gcc9".to_string()],
        tool_versions: BTreeMap::from([("gcc9".to_string(), "9.3.0".to_string())]),
        connected_clients: Vec::new(),
    }
}

fn expected() -> BTreeMap<String, String> {
    BTreeMap::from([("gcc9".to_string(), "9.3.0".to_string())])
}

fn no_exclusions() -> HashSet<(String, u16)> {
    HashSet::new()
}

#[test]
fn test_most_free_slots_wins() {
    let workers = vec![
        server("busy", 8, 7, 0),
        server("idle", 8, 1, 0),
        server("half", 8, 4, 0),
    ];
    let outcome = select_worker(&workers, "gcc9", &expected(), &no_exclusions(), 10);
    match outcome {
        SelectionOutcome::Dispatch(worker) => assert_eq!(worker.host, "idle"),
        other => panic!("expected dispatch, got {other:?}"),
    }
}

#[test]
fn test_tie_broken_by_smallest_backlog() {
    // Same free threads; the one with less total work wins.
    let workers = vec![server("loaded", 8, 4, 6), server("lighter", 8, 4, 1)];
    let outcome = select_worker(&workers, "gcc9", &expected(), &no_exclusions(), 10);
    match outcome {
        SelectionOutcome::Dispatch(worker) => assert_eq!(worker.host, "lighter"),
        other => panic!("expected dispatch, got {other:?}"),
    }
}

#[test]
fn test_tool_filter() {
    let mut other_tool = server("other", 8, 0, 0);
    other_tool.tool_ids = vec!["clang12".to_string()];
    let workers = vec![other_tool];
    assert_eq!(
        select_worker(&workers, "gcc9", &expected(), &no_exclusions(), 10),
        SelectionOutcome::NoEligible
    );
}

#[test]
fn test_version_mismatch_excludes_worker() {
    let mut stale = server("stale", 8, 0, 0);
    stale
        .tool_versions
        .insert("gcc9".to_string(), "9.4.0".to_string());
    let workers = vec![stale];
    assert_eq!(
        select_worker(&workers, "gcc9", &expected(), &no_exclusions(), 10),
        SelectionOutcome::NoEligible
    );
}

#[test]
fn test_both_versions_absent_match() {
    let mut bare = server("bare", 8, 0, 0);
    bare.tool_versions.clear();
    let workers = vec![bare];
    let outcome = select_worker(&workers, "gcc9", &BTreeMap::new(), &no_exclusions(), 10);
    assert!(matches!(outcome, SelectionOutcome::Dispatch(_)));
}

#[test]
fn test_excluded_worker_not_reselected() {
    let workers = vec![server("only", 8, 0, 0)];
    let excluded = HashSet::from([("only".to_string(), 7767)]);
    assert_eq!(
        select_worker(&workers, "gcc9", &expected(), &excluded, 10),
        SelectionOutcome::NoEligible
    );
}

#[test]
fn test_saturated_below_threshold_holds() {
    let workers = vec![server("full-a", 4, 4, 2), server("full-b", 4, 4, 1)];
    assert_eq!(
        select_worker(&workers, "gcc9", &expected(), &no_exclusions(), 100),
        SelectionOutcome::Saturated
    );
}

#[test]
fn test_saturated_above_threshold_enqueues_least_loaded() {
    let workers = vec![server("full-a", 4, 4, 9), server("full-b", 4, 4, 3)];
    let outcome = select_worker(&workers, "gcc9", &expected(), &no_exclusions(), 10);
    match outcome {
        SelectionOutcome::Enqueue(worker) => assert_eq!(worker.host, "full-b"),
        other => panic!("expected enqueue, got {other:?}"),
    }
}

#[test]
fn test_empty_snapshot_has_no_candidates() {
    assert_eq!(
        select_worker(&[], "gcc9", &expected(), &no_exclusions(), 10),
        SelectionOutcome::NoEligible
    );
}
