/*!
 * Named Task Tests
 * Invocations shipped to a child as data
 */

use pretty_assertions::assert_eq;
use procthread::{Invocation, Outcome, TaskRegistry, ThreadBuilder, Value};
use serial_test::serial;

fn sum(args: Value) -> Result<Value, String> {
    let items = args.as_seq().ok_or("expected a sequence")?;
    items
        .iter()
        .map(|v| v.as_int().ok_or_else(|| format!("not an int: {}", v.kind())))
        .sum::<Result<i64, String>>()
        .map(Value::Int)
}

fn registry() -> TaskRegistry {
    let registry = TaskRegistry::new();
    registry.register("sum", sum);
    registry
}

#[test]
#[serial]
fn test_invocation_runs_in_child() {
    let registry = registry();
    let invocation = Invocation::new("sum", vec![1i64, 2, 3]);

    let mut worker = ThreadBuilder::new()
        .spawn_invocation(&registry, &invocation)
        .unwrap();
    worker.join().unwrap();

    assert_eq!(worker.exit_status().unwrap(), 0);
    assert_eq!(worker.result().unwrap(), Some(&Value::Int(6)));
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_task_error_is_failure() {
    let registry = registry();
    let invocation = Invocation::new("sum", vec![Value::Int(1), Value::from("two")]);

    let mut worker = ThreadBuilder::new()
        .spawn_invocation(&registry, &invocation)
        .unwrap();
    worker.join().unwrap();

    assert_eq!(worker.exit_status().unwrap(), 1);
    assert_eq!(
        worker.outcome().unwrap(),
        &Outcome::Failed("not an int: str".to_string())
    );
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_unknown_task() {
    let registry = registry();
    let mut worker = ThreadBuilder::new()
        .spawn_invocation(&registry, &Invocation::new("nope", ()))
        .unwrap();
    worker.join().unwrap();

    assert_eq!(worker.exit_status().unwrap(), 1);
    assert_eq!(worker.result().unwrap(), None);
    assert_eq!(
        worker.outcome().unwrap(),
        &Outcome::Failed("unknown task 'nope'".to_string())
    );
    worker.dispose().unwrap();
}
