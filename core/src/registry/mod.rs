//! Expression/task registry
//!
//! Shared in-memory store for every submitted expression and its tasks. One
//! `parking_lot::Mutex` guards the whole state: every read and write goes
//! through it, and no `.await` ever happens while it is held.
//!
//! Besides the expressions themselves the state keeps two indexes:
//! - task id -> owning expression, for completions
//! - the ordered set of pending task ids, for claims (lowest id first, which
//!   is submission order)
//!
//! The lifecycle rules (claim, complete, recover, evict) live in
//! [`crate::executions`]; this module only keeps the indexes consistent.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::Mutex;

use crate::types::{Expression, ExpressionSummary, TaskId, TaskStatus};

#[cfg(test)]
mod tests;

#[derive(Debug, Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the state.
    ///
    /// Everything `f` does is atomic with respect to every other registry
    /// operation.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut RegistryState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    /// Snapshot of one expression, tasks included
    pub fn get(&self, id: &str) -> Option<Expression> {
        self.state.lock().get(id).cloned()
    }

    /// Id, status and result of every expression in submission order
    pub fn list(&self) -> Vec<ExpressionSummary> {
        self.state
            .lock()
            .iter()
            .map(Expression::summary)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tasks waiting to be claimed by a worker
    pub fn pending_tasks(&self) -> usize {
        self.state.lock().pending.len()
    }
}

#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    /// Keyed by submission sequence number
    expressions: BTreeMap<u64, Expression>,
    ids: HashMap<String, u64>,
    task_owner: HashMap<TaskId, u64>,
    pending: BTreeSet<TaskId>,
    next_seq: u64,
    next_task_id: TaskId,
    next_token: u64,
}

impl RegistryState {
    pub(crate) fn len(&self) -> usize {
        self.expressions.len()
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Task ids start at 1 and are never reused, even after eviction
    pub(crate) fn allocate_task_id(&mut self) -> TaskId {
        self.next_task_id += 1;
        self.next_task_id
    }

    /// Fencing tokens start at 1 and are never reused
    pub(crate) fn allocate_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Insert a new expression and index its tasks.
    ///
    /// Pending tasks are offered to workers only if `offer` is set; otherwise
    /// they are reserved for the in-process evaluator. Returns `false`
    /// without touching anything if the id is taken.
    pub(crate) fn insert(&mut self, expression: Expression, offer: bool) -> bool {
        if self.contains(&expression.id) {
            return false;
        }

        self.next_seq += 1;
        let seq = self.next_seq;

        for task in &expression.tasks {
            self.task_owner.insert(task.id, seq);
            if offer && task.status == TaskStatus::Pending {
                self.pending.insert(task.id);
            }
        }

        self.ids.insert(expression.id.clone(), seq);
        self.expressions.insert(seq, expression);
        true
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Expression> {
        let seq = self.ids.get(id)?;
        self.expressions.get(seq)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Expression> {
        let seq = self.ids.get(id)?;
        self.expressions.get_mut(seq)
    }

    /// Owning expression of a task and the task's index within it
    pub(crate) fn find_task_mut(&mut self, task_id: TaskId) -> Option<(&mut Expression, usize)> {
        let seq = self.task_owner.get(&task_id)?;
        let expression = self.expressions.get_mut(seq)?;
        let index = expression.tasks.iter().position(|t| t.id == task_id)?;
        Some((expression, index))
    }

    /// Remove and return the oldest task id offered to workers
    pub(crate) fn take_oldest_pending(&mut self) -> Option<TaskId> {
        self.pending.pop_first()
    }

    pub(crate) fn offer(&mut self, task_id: TaskId) {
        self.pending.insert(task_id);
    }

    pub(crate) fn withdraw(&mut self, task_id: TaskId) {
        self.pending.remove(&task_id);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Expression> {
        self.expressions.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Expression> {
        self.expressions.values_mut()
    }

    /// Remove an expression together with its index entries
    pub(crate) fn remove(&mut self, id: &str) -> Option<Expression> {
        let seq = self.ids.remove(id)?;
        let expression = self.expressions.remove(&seq)?;
        for task in &expression.tasks {
            self.task_owner.remove(&task.id);
            self.pending.remove(&task.id);
        }
        Some(expression)
    }
}
