use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::task::{GroupId, Priority, TagId, Task, TaskId};

/// Grouping key for "similar-looking" tasks: same priority, same group,
/// same tag set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimilarityKey {
    pub priority: Priority,
    pub group_id: Option<GroupId>,
    /// Sorted, so tag order never affects grouping
    pub tags: Vec<TagId>,
}

impl SimilarityKey {
    pub fn of(task: &Task) -> Self {
        let mut tags: Vec<TagId> = task.tags.iter().cloned().collect();
        tags.sort();
        SimilarityKey {
            priority: task.priority,
            group_id: task.group_id.clone(),
            tags,
        }
    }
}

impl fmt::Display for SimilarityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.priority,
            self.group_id.as_deref().unwrap_or("none"),
            self.tags.join(",")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarCluster {
    pub key: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    pub tags: Vec<TagId>,
    pub task_ids: Vec<TaskId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityReport {
    /// Keys shared by more than one task
    pub clusters: Vec<SimilarCluster>,
    /// Tasks whose key nobody else shares
    pub unique: Vec<TaskId>,
}

/// Partition top-level tasks by [`SimilarityKey`]. Subtasks are skipped.
/// Clusters and unique tasks keep first-seen order.
pub fn group_similar(tasks: &[Task]) -> SimilarityReport {
    let mut buckets: IndexMap<SimilarityKey, Vec<TaskId>> = IndexMap::new();
    for task in tasks.iter().filter(|t| !t.is_subtask()) {
        buckets
            .entry(SimilarityKey::of(task))
            .or_default()
            .push(task.id.clone());
    }

    let mut report = SimilarityReport::default();
    for (key, ids) in buckets {
        if ids.len() > 1 {
            report.clusters.push(SimilarCluster {
                key: key.to_string(),
                priority: key.priority,
                group_id: key.group_id,
                tags: key.tags,
                task_ids: ids,
            });
        } else {
            report.unique.extend(ids);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, priority: Priority, group: Option<&str>, tags: &[&str]) -> Task {
        let mut t = Task::new(id, id);
        t.priority = priority;
        t.group_id = group.map(|g| g.to_string());
        t.tags = tags.iter().map(|s| s.to_string()).collect();
        t
    }

    #[test]
    fn test_clusters_and_uniques() {
        let tasks = vec![
            task("a", Priority::High, None, &["x", "y"]),
            task("b", Priority::Low, None, &[]),
            task("c", Priority::High, None, &["y", "x"]),
            task("d", Priority::High, Some("home"), &["x", "y"]),
        ];
        let report = group_similar(&tasks);
        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].task_ids, vec!["a".to_string(), "c".into()]);
        assert_eq!(report.clusters[0].key, "HIGH|none|x,y");
        assert_eq!(report.unique, vec!["b".to_string(), "d".into()]);
    }

    #[test]
    fn test_subtasks_are_not_grouped() {
        let mut sub = task("a.1", Priority::High, None, &[]);
        sub.parent_id = Some("a".into());
        let tasks = vec![task("a", Priority::High, None, &[]), sub];
        let report = group_similar(&tasks);
        assert!(report.clusters.is_empty());
        assert_eq!(report.unique, vec!["a".to_string()]);
    }

    #[test]
    fn test_key_includes_group() {
        let key = SimilarityKey::of(&task("a", Priority::Medium, Some("work"), &["b", "a"]));
        assert_eq!(key.to_string(), "MEDIUM|work|a,b");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(group_similar(&[]), SimilarityReport::default());
    }
}
