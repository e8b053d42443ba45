//! In-memory schedule model.
//!
//! A `ScheduleModel` is built once from a validated task collection and is
//! immutable afterwards. Reloads replace it wholesale.
//!
//! Two traversal orders are exposed on purpose:
//! - [`ScheduleModel::each_task`] walks storage order and feeds aggregation
//!   and year classification.
//! - [`ScheduleModel::preorder`] walks the hierarchy depth-first and feeds
//!   the exporter.

pub mod stats;
pub mod years;

use std::collections::HashMap;

use crate::error::{ScheduleError, ScheduleResult};
use crate::types::{Link, Task, TaskId, TaskRecord, ValidationPolicy};

/// Navigable task hierarchy.
#[derive(Debug, Clone, Default)]
pub struct ScheduleModel {
    /// Tasks in storage order.
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
    /// Child indices per task, in storage order.
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    levels: Vec<usize>,
    links: Vec<Link>,
}

impl ScheduleModel {
    /// Validate raw records and build the hierarchy.
    pub fn build(
        records: &[TaskRecord],
        links: Vec<Link>,
        policy: ValidationPolicy,
    ) -> ScheduleResult<Self> {
        let tasks = records
            .iter()
            .map(|r| r.validate(policy))
            .collect::<ScheduleResult<Vec<_>>>()?;
        Self::from_tasks(tasks, links)
    }

    /// Build the hierarchy from already validated tasks.
    ///
    /// Fails with `DuplicateId`, `DanglingParent` or `Cycle`.
    pub fn from_tasks(tasks: Vec<Task>, links: Vec<Link>) -> ScheduleResult<Self> {
        let mut index = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.id.clone(), i).is_some() {
                return Err(ScheduleError::DuplicateId(task.id.clone()));
            }
        }

        let mut parents: Vec<Option<usize>> = Vec::with_capacity(tasks.len());
        for task in &tasks {
            let parent = match &task.parent {
                None => None,
                Some(pid) => Some(*index.get(pid).ok_or_else(|| {
                    ScheduleError::DanglingParent {
                        task: task.id.clone(),
                        parent: pid.clone(),
                    }
                })?),
            };
            parents.push(parent);
        }

        // A chain longer than |tasks| hops must revisit a task.
        let limit = tasks.len();
        let mut levels = Vec::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            let mut hops = 0;
            let mut cursor = parents[i];
            while let Some(p) = cursor {
                hops += 1;
                if hops > limit {
                    return Err(ScheduleError::Cycle {
                        task: task.id.clone(),
                    });
                }
                cursor = parents[p];
            }
            levels.push(hops);
        }

        let mut children = vec![Vec::new(); tasks.len()];
        let mut roots = Vec::new();
        for (i, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(i),
                None => roots.push(i),
            }
        }

        Ok(Self {
            tasks,
            index,
            children,
            roots,
            levels,
            links,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn position(&self, id: &TaskId) -> ScheduleResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| ScheduleError::NotFound(id.clone()))
    }

    /// Look up a task by id.
    pub fn get(&self, id: &TaskId) -> ScheduleResult<&Task> {
        self.position(id).map(|i| &self.tasks[i])
    }

    /// Number of parent hops to a root.
    pub fn level(&self, id: &TaskId) -> ScheduleResult<usize> {
        self.position(id).map(|i| self.levels[i])
    }

    /// Direct children in insertion order.
    pub fn children(&self, id: &TaskId) -> ScheduleResult<Vec<&Task>> {
        let i = self.position(id)?;
        Ok(self.children[i].iter().map(|&c| &self.tasks[c]).collect())
    }

    /// The parent task, or `None` for roots.
    pub fn parent_of(&self, id: &TaskId) -> ScheduleResult<Option<&Task>> {
        let task = self.get(id)?;
        match &task.parent {
            None => Ok(None),
            Some(pid) => self.get(pid).map(Some),
        }
    }

    /// Root tasks in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = &Task> {
        self.roots.iter().map(|&i| &self.tasks[i])
    }

    /// Storage-order traversal.
    pub fn each_task(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    /// Depth-first, parent-before-children traversal yielding `(level, task)`.
    /// Each call starts a fresh walk.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            model: self,
            stack: self.roots.iter().rev().map(|&i| (0, i)).collect(),
        }
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }
}

/// Lazy pre-order iterator over a [`ScheduleModel`].
pub struct Preorder<'a> {
    model: &'a ScheduleModel,
    stack: Vec<(usize, usize)>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (usize, &'a Task);

    fn next(&mut self) -> Option<Self::Item> {
        let (level, i) = self.stack.pop()?;
        self.stack
            .extend(self.model.children[i].iter().rev().map(|&c| (level + 1, c)));
        Some((level, &self.model.tasks[i]))
    }
}
