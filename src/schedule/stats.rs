//! Rollup statistics over a task set.

use serde::{Deserialize, Serialize};

use crate::types::Task;

/// Aggregate statistics for the visible task set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Tasks that are not phases.
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    /// Critical-priority tasks, regardless of completion.
    pub critical: usize,
    pub overall_progress_percent: u32,
}

/// Compute statistics over `tasks`. Phase rows are skipped entirely.
pub fn compute_statistics<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Stats {
    let mut stats = Stats::default();
    let mut progress_sum = 0.0;

    for task in tasks.into_iter().filter(|t| !t.is_phase()) {
        stats.total += 1;
        progress_sum += task.progress;

        if task.progress >= 1.0 {
            stats.completed += 1;
        } else if task.progress > 0.0 {
            stats.in_progress += 1;
        }

        if task.priority.is_critical() {
            stats.critical += 1;
        }
    }

    if stats.total > 0 {
        stats.overall_progress_percent =
            (progress_sum / stats.total as f64 * 100.0).round() as u32;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, TaskId};
    use chrono::NaiveDate;

    fn task(id: &str, progress: f64) -> Task {
        Task {
            id: TaskId::from(id),
            text: id.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            duration: 1,
            progress,
            priority: Priority::Normal,
            parent: None,
            notes: None,
            task_type: None,
        }
    }

    #[test]
    fn test_mixed_progress() {
        let tasks = vec![task("a", 0.2), task("b", 0.6), task("c", 1.0)];
        let stats = compute_statistics(&tasks);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_progress, 2);
        assert_eq!(stats.overall_progress_percent, 60);
    }

    #[test]
    fn test_empty_set_is_zero_percent() {
        let stats = compute_statistics(&Vec::<Task>::new());
        assert_eq!(stats, Stats::default());
    }

    #[test]
    fn test_phases_excluded_untyped_counted() {
        let mut phase = task("p", 1.0);
        phase.task_type = Some("phase".to_string());
        let mut milestone = task("m", 0.0);
        milestone.task_type = Some("milestone".to_string());
        let tasks = vec![phase, milestone, task("t", 0.0)];

        let stats = compute_statistics(&tasks);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.overall_progress_percent, 0);
    }

    #[test]
    fn test_critical_counted_independently() {
        let mut done = task("a", 1.0);
        done.priority = Priority::Critical;
        let mut idle = task("b", 0.0);
        idle.priority = Priority::Critical;
        let stats = compute_statistics(&[done, idle]);
        assert_eq!(stats.critical, 2);
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn test_buckets_partition_total() {
        let tasks = vec![
            task("a", 0.0),
            task("b", 0.0),
            task("c", 0.3),
            task("d", 1.0),
        ];
        let stats = compute_statistics(&tasks);
        let not_started = tasks.iter().filter(|t| t.progress == 0.0).count();
        assert_eq!(stats.total, stats.completed + stats.in_progress + not_started);
    }
}
