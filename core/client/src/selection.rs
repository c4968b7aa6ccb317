//! Worker selection policy.

use std::collections::BTreeMap;
use std::collections::HashSet;

use distbuild_protocol::ToolServerInfo;

/// What the policy decided for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Dispatch to this worker now.
    Dispatch(ToolServerInfo),
    /// Every eligible worker is saturated and the grid holds enough queued
    /// work to be worth joining; enqueue at this worker.
    Enqueue(ToolServerInfo),
    /// Eligible workers exist but the grid is saturated below the
    /// remote-queueing threshold; hold the request and try again on the
    /// next snapshot.
    Saturated,
    /// No worker advertises this tool at a matching version.
    NoEligible,
}

/// A worker is eligible when it advertises the tool and its probed version
/// equals ours — both absent counts as a match, anything else does not.
fn version_matches(
    worker: &ToolServerInfo,
    tool_id: &str,
    expected: &BTreeMap<String, String>,
) -> bool {
    let ours = expected.get(tool_id).map(String::as_str).unwrap_or("");
    let theirs = worker
        .tool_versions
        .get(tool_id)
        .map(String::as_str)
        .unwrap_or("");
    ours == theirs
}

/// Run the policy over the current snapshot.
///
/// * `excluded` removes workers that already failed this invocation.
/// * Free capacity wins: most free threads, ties broken by the smaller
///   running + queued total.
/// * With no free capacity anywhere, the invocation only joins a remote
///   queue when the grid already holds at least `minimal_remote_tasks`
///   queued entries; a near-idle grid is not worth waiting on.
pub fn select_worker(
    workers: &[ToolServerInfo],
    tool_id: &str,
    expected_versions: &BTreeMap<String, String>,
    excluded: &HashSet<(String, u16)>,
    minimal_remote_tasks: usize,
) -> SelectionOutcome {
    let candidates: Vec<&ToolServerInfo> = workers
        .iter()
        .filter(|worker| !excluded.contains(&worker.key()))
        .filter(|worker| worker.tool_ids.iter().any(|id| id == tool_id))
        .filter(|worker| version_matches(worker, tool_id, expected_versions))
        .collect();

    if candidates.is_empty() {
        return SelectionOutcome::NoEligible;
    }

    let best = candidates
        .iter()
        .max_by_key(|worker| {
            (
                worker.free_threads(),
                std::cmp::Reverse(worker.running_tasks as u32 + worker.queued_tasks as u32),
            )
        })
        .copied();

    if let Some(best) = best {
        if best.free_threads() > 0 {
            return SelectionOutcome::Dispatch(best.clone());
        }
    }

    let total_queued: usize = candidates
        .iter()
        .map(|worker| worker.queued_tasks as usize)
        .sum();
    if total_queued < minimal_remote_tasks {
        return SelectionOutcome::Saturated;
    }

    let least_queued = candidates
        .iter()
        .min_by_key(|worker| worker.queued_tasks)
        .copied();
    match least_queued {
        Some(worker) => SelectionOutcome::Enqueue(worker.clone()),
        None => SelectionOutcome::NoEligible,
    }
}

#[cfg(test)]
#[path = "selection.test.rs"]
mod tests;
