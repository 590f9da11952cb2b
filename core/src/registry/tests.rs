use chrono::Utc;

use super::*;
use crate::types::{ExpressionStatus, Operator, Task};

fn expression(state: &mut RegistryState, id: &str) -> Expression {
    let task_id = state.allocate_task_id();
    Expression {
        id: id.to_string(),
        expression: "1+2".to_string(),
        status: ExpressionStatus::Pending,
        result: None,
        error: None,
        created_at: Utc::now(),
        finished_at: None,
        tasks: vec![Task {
            id: task_id,
            arg1: "1".to_string(),
            arg2: "2".to_string(),
            operation: Operator::Add,
            operation_time: 0,
            status: TaskStatus::Pending,
            result: None,
            lease: None,
        }],
    }
}

#[test]
fn test_insert_and_get() {
    let registry = Registry::new();
    registry.with_state(|state| {
        let expr = expression(state, "a");
        assert!(state.insert(expr, true));
    });

    let expr = registry.get("a").unwrap();
    assert_eq!(expr.id, "a");
    assert_eq!(expr.tasks.len(), 1);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.pending_tasks(), 1);
    assert!(registry.get("missing").is_none());
}

#[test]
fn test_duplicate_id_is_rejected() {
    let registry = Registry::new();
    registry.with_state(|state| {
        let first = expression(state, "dup");
        let second = expression(state, "dup");
        assert!(state.insert(first, true));
        assert!(!state.insert(second, true));
    });
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.pending_tasks(), 1);
}

#[test]
fn test_list_keeps_submission_order() {
    let registry = Registry::new();
    registry.with_state(|state| {
        for id in ["z", "a", "m"] {
            let expr = expression(state, id);
            state.insert(expr, true);
        }
    });

    let ids: Vec<_> = registry.list().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["z", "a", "m"]);
}

#[test]
fn test_reserved_tasks_are_not_offered() {
    let registry = Registry::new();
    registry.with_state(|state| {
        let expr = expression(state, "local");
        state.insert(expr, false);
        assert_eq!(state.take_oldest_pending(), None);
    });
    assert_eq!(registry.pending_tasks(), 0);
}

#[test]
fn test_task_ids_are_global_and_monotonic() {
    let registry = Registry::new();
    let ids = registry.with_state(|state| {
        let a = expression(state, "a");
        let b = expression(state, "b");
        let ids = (a.tasks[0].id, b.tasks[0].id);
        state.insert(a, true);
        state.insert(b, true);
        ids
    });
    assert_eq!(ids, (1, 2));

    registry.with_state(|state| {
        assert_eq!(state.take_oldest_pending(), Some(1));
        assert_eq!(state.take_oldest_pending(), Some(2));
        assert_eq!(state.take_oldest_pending(), None);
    });
}

#[test]
fn test_remove_cleans_indexes() {
    let registry = Registry::new();
    registry.with_state(|state| {
        let expr = expression(state, "gone");
        let task_id = expr.tasks[0].id;
        state.insert(expr, true);

        assert!(state.remove("gone").is_some());
        assert!(state.find_task_mut(task_id).is_none());
        assert_eq!(state.take_oldest_pending(), None);
        assert!(state.remove("gone").is_none());

        // Ids are not reused after removal
        assert_eq!(state.allocate_task_id(), task_id + 1);
    });
    assert!(registry.is_empty());
}
