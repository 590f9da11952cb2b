use std::collections::HashSet;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::{Config, ExecutionMode, OperationTimes};
use crate::error::{CalcError, TaskError};
use crate::types::*;

fn service(mode: ExecutionMode, op_ms: u64) -> CalcService {
    let mut config = Config::default();
    config.engine.mode = mode;
    config.operations = OperationTimes::uniform(op_ms);
    CalcService::new(config)
}

const POLL: Duration = Duration::from_millis(5);

#[tokio::test]
async fn test_submit_rejects_structural_errors() {
    let service = service(ExecutionMode::Distributed, 0);

    for source in ["", "1+1*", "(1+1", "abc"] {
        assert_eq!(service.submit(source), Err(CalcError::ExpressionNotValid));
    }
    // Nothing to compute
    assert_eq!(service.submit("42"), Err(CalcError::ExpressionNotValid));
    assert_eq!(service.submit("(7)"), Err(CalcError::ExpressionNotValid));
    assert_eq!(service.submit("-5"), Err(CalcError::ExpressionNotValid));
    assert_eq!(service.submit("(-5)"), Err(CalcError::ExpressionNotValid));
    assert_eq!(service.submit("--5"), Err(CalcError::ExpressionNotValid));

    // Too deep to parse safely
    let deep = format!("{}1+1{}", "(".repeat(50_000), ")".repeat(50_000));
    assert_eq!(service.submit(&deep), Err(CalcError::ExpressionNotValid));

    assert!(service.registry().is_empty());
}

#[tokio::test]
async fn test_semantic_error_is_recorded() {
    let service = service(ExecutionMode::Distributed, 0);

    let id = assert_ok!(service.submit("1/0")).id;
    let expression = service.get(&id).unwrap();
    assert_eq!(expression.status, ExpressionStatus::Error);
    assert_eq!(expression.error.as_deref(), Some("Division by zero"));
    assert!(service.pull().is_none());
}

#[tokio::test]
async fn test_overflow_is_recorded_as_error() {
    let overflow = format!("{}*10", "9".repeat(400));

    for mode in [ExecutionMode::Distributed, ExecutionMode::InProcess] {
        let service = service(mode, 0);
        let id = assert_ok!(service.submit(&overflow)).id;

        let expression = service.wait_for(&id, POLL).await.unwrap();
        assert_eq!(expression.status, ExpressionStatus::Error);
        assert_eq!(expression.error.as_deref(), Some("Not correct input"));
        assert_eq!(expression.result, None);
        assert!(expression.tasks.is_empty());
        assert!(service.pull().is_none());
    }
}

#[tokio::test]
async fn test_negated_group_is_still_computed() {
    let service = service(ExecutionMode::Distributed, 0);
    let id = service.submit("-(2+3)").unwrap().id;

    let task = service.pull().unwrap();
    assert_eq!((task.arg1.as_str(), task.operation, task.arg2.as_str()), ("0", Operator::Sub, "5"));
    service
        .push(TaskResult {
            id: task.id,
            result: -5.0,
            token: Some(task.token),
        })
        .unwrap();
    assert_eq!(service.get(&id).unwrap().result, Some(-5.0));
}

#[tokio::test]
async fn test_distributed_round_trip() {
    let service = service(ExecutionMode::Distributed, 25);

    let id = service.submit("2+2*2").unwrap().id;
    assert_eq!(service.get(&id).unwrap().status, ExpressionStatus::Pending);

    let task = service.pull().unwrap();
    assert_eq!(task.arg1, "2");
    assert_eq!(task.arg2, "4");
    assert_eq!(task.operation, Operator::Add);
    assert_eq!(task.operation_time, 25);
    assert!(service.pull().is_none());

    let outcome = assert_ok!(service.push(TaskResult {
        id: task.id,
        result: 6.0,
        token: Some(task.token),
    }));
    assert_eq!(outcome.expression_id, id);
    assert_eq!(outcome.expression_result, Some(6.0));

    let expression = service.get(&id).unwrap();
    assert_eq!(expression.status, ExpressionStatus::Completed);
    assert_eq!(expression.result, Some(6.0));

    let list = service.list();
    assert_eq!(list.expressions.len(), 1);
    assert_eq!(list.expressions[0].result, Some(6.0));
}

#[tokio::test]
async fn test_push_unknown_task() {
    let service = service(ExecutionMode::Distributed, 0);
    let err = assert_err!(service.push(TaskResult {
        id: 7,
        result: 1.0,
        token: None,
    }));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_get_unknown_expression() {
    let service = service(ExecutionMode::Distributed, 0);
    assert_eq!(
        service.get("missing"),
        Err(TaskError::ExpressionNotFound {
            id: "missing".to_string()
        })
    );
}

#[tokio::test]
async fn test_evaluate_does_not_register() {
    let service = service(ExecutionMode::Distributed, 0);
    assert_eq!(service.evaluate("-3*(2+4)/2"), Ok(-9.0));
    assert_eq!(service.evaluate("1/0"), Err(CalcError::DivisionByZero));
    assert!(service.registry().is_empty());
}

#[tokio::test]
async fn test_in_process_returns_before_evaluation() {
    let service = service(ExecutionMode::InProcess, 50);

    let id = service.submit("(2+2)*2").unwrap().id;
    let expression = service.get(&id).unwrap();
    assert!(!expression.status.is_terminal());
    assert_eq!(expression.result, None);

    // Reserved for the evaluator, never offered to workers
    assert!(service.pull().is_none());

    let expression = service.wait_for(&id, POLL).await.unwrap();
    assert_eq!(expression.status, ExpressionStatus::Completed);
    assert_eq!(expression.result, Some(8.0));
    assert!(expression
        .tasks
        .iter()
        .all(|t| t.status == TaskStatus::Completed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_process_evaluations_overlap() {
    let service = service(ExecutionMode::InProcess, 200);

    let started = std::time::Instant::now();
    let ids: Vec<String> = (1..=5)
        .map(|i| service.submit(&format!("{}*2", i)).unwrap().id)
        .collect();

    for (i, id) in ids.iter().enumerate() {
        let expression = service.wait_for(id, POLL).await.unwrap();
        assert_eq!(expression.result, Some((i as f64 + 1.0) * 2.0));
    }

    // Delays run outside the registry lock, so five evaluations take about
    // one delay rather than five
    assert!(started.elapsed() < Duration::from_millis(900));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pulls_are_unique() {
    let service = service(ExecutionMode::Distributed, 0);
    for i in 0..40 {
        service.submit(&format!("{}+1", i)).unwrap();
    }

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                let mut ids = Vec::new();
                while let Some(task) = service.pull() {
                    ids.push(task.id);
                    tokio::task::yield_now().await;
                }
                ids
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "task {} claimed twice", id);
        }
    }
    assert_eq!(seen.len(), 40);
}

#[tokio::test]
async fn test_maintenance_evicts_finished() {
    let mut config = Config::default();
    config.operations = OperationTimes::uniform(0);
    config.registry.retention_secs = 0;
    let service = CalcService::new(config);

    let done = service.submit("1+1").unwrap().id;
    let open = service.submit("2+2").unwrap().id;
    let task = service.pull().unwrap();
    service
        .push(TaskResult {
            id: task.id,
            result: 2.0,
            token: Some(task.token),
        })
        .unwrap();

    let (recovered, evicted) = service.run_maintenance_once();
    assert_eq!(recovered, 0);
    assert_eq!(evicted, 1);
    assert!(service.get(&done).is_err());
    assert!(service.get(&open).is_ok());
}

#[tokio::test]
async fn test_spawn_maintenance_stops_on_cancel() {
    let mut config = Config::default();
    config.registry.retention_secs = 0;
    config.registry.sweep_interval_ms = 10;
    let service = CalcService::new(config);

    let id = service.submit("1/0").unwrap().id;

    let shutdown = CancellationToken::new();
    let handle = service.spawn_maintenance(shutdown.clone());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while service.get(&id).is_ok() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(POLL).await;
    }
    assert!(service.get(&id).is_err());

    shutdown.cancel();
    assert_ok!(handle.await);
}
