use chrono::{DateTime, Utc};
use stepscope_types::{ParallelGroup, SubagentProcess};

/// Group start times by distance from each group's anchor.
///
/// `starts` must be ascending. A start joins the open group while
/// `start - anchor <= window_ms`; otherwise it anchors a new group. The rule
/// is anchor-relative, so a chain of near neighbours does not extend a group.
pub fn group_by_anchor(starts: &[DateTime<Utc>], window_ms: i64) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut anchor: Option<DateTime<Utc>> = None;

    for (idx, start) in starts.iter().enumerate() {
        match (anchor, groups.last_mut()) {
            (Some(a), Some(group)) if (*start - a).num_milliseconds() <= window_ms => {
                group.push(idx);
            }
            _ => {
                anchor = Some(*start);
                groups.push(vec![idx]);
            }
        }
    }

    groups
}

/// Sweep processes (sorted by start) into anchor groups and mark members of
/// groups with two or more processes as parallel.
///
/// Group ids are `group-<n>` in sweep order. Every group is returned,
/// singletons included; only parallel groups are written onto processes.
pub fn detect_parallel_groups(
    processes: &mut [SubagentProcess],
    window_ms: i64,
) -> Vec<ParallelGroup> {
    let starts: Vec<DateTime<Utc>> = processes.iter().map(|p| p.start).collect();

    let groups: Vec<ParallelGroup> = group_by_anchor(&starts, window_ms)
        .into_iter()
        .enumerate()
        .map(|(n, members)| {
            let group = ParallelGroup {
                id: format!("group-{}", n),
                anchor_start: starts[members[0]],
                members: members.iter().map(|i| processes[*i].id.clone()).collect(),
            };
            if group.is_parallel() {
                for i in &members {
                    processes[*i].is_parallel = true;
                    processes[*i].group_id = Some(group.id.clone());
                }
            }
            group
        })
        .collect();

    tracing::debug!(
        groups = groups.len(),
        parallel = groups.iter().filter(|g| g.is_parallel()).count(),
        "parallel groups detected"
    );

    groups
}
