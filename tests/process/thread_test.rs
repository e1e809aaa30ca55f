/*!
 * Thread Tests
 * Spawn, join, exit status, result and disposal of forked children
 */

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use pretty_assertions::assert_eq;
use procthread::{spawn, spawn_with, Config, Error, Json, Outcome, ThreadBuilder};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static TOUCHED: AtomicUsize = AtomicUsize::new(0);

#[test]
#[serial]
fn test_join_collects_return_value() {
    let mut worker = spawn(|| vec![1u32, 2, 3]).unwrap();
    worker.join().unwrap();

    assert!(worker.is_exited());
    assert_eq!(worker.exit_status().unwrap(), 0);
    assert_eq!(worker.result().unwrap(), Some(&vec![1, 2, 3]));
    assert!(worker.outcome().unwrap().is_success());
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_spawn_with_arguments() {
    let mut worker = spawn_with(|(a, b): (u64, u64)| a * b, (6, 7)).unwrap();
    worker.join().unwrap();
    assert_eq!(worker.result().unwrap(), Some(&42));
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_child_runs_in_separate_process() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("child.pid");
    let path = marker.clone();

    let mut worker = spawn(move || {
        TOUCHED.fetch_add(1, Ordering::SeqCst);
        std::fs::write(&path, std::process::id().to_string()).unwrap();
        std::process::id()
    })
    .unwrap();
    worker.join().unwrap();

    let child_pid = *worker.result().unwrap().unwrap();
    assert_eq!(child_pid, worker.pid() as u32);
    assert_ne!(child_pid, std::process::id());
    assert_eq!(
        std::fs::read_to_string(&marker).unwrap(),
        child_pid.to_string()
    );
    // The child's memory writes stay in the child
    assert_eq!(TOUCHED.load(Ordering::SeqCst), 0);
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_error_return_is_failure() {
    let mut worker = ThreadBuilder::new()
        .name("fallible")
        .spawn_fallible(|| Err::<u8, _>("boom"))
        .unwrap();
    worker.join().unwrap();

    assert_eq!(worker.name(), Some("fallible"));
    assert_eq!(worker.exit_status().unwrap(), 1);
    assert_eq!(worker.result().unwrap(), None);
    assert_eq!(worker.outcome().unwrap(), &Outcome::Failed("boom".to_string()));
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_panic_is_failure() {
    let mut worker = spawn(|| -> u8 { panic!("kaboom") }).unwrap();
    worker.join().unwrap();

    assert_eq!(worker.exit_status().unwrap(), 101);
    assert_eq!(worker.result().unwrap(), None);
    assert_eq!(
        worker.outcome().unwrap(),
        &Outcome::Panicked("kaboom".to_string())
    );
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_killed_child_has_no_result() {
    let mut worker = spawn(|| {
        std::thread::sleep(Duration::from_secs(30));
        7u8
    })
    .unwrap();
    kill(Pid::from_raw(worker.pid()), Signal::SIGKILL).unwrap();
    worker.join().unwrap();

    assert_eq!(worker.exit_status().unwrap(), 128 + 9);
    assert_eq!(worker.result().unwrap(), None);
    assert_eq!(worker.outcome().unwrap(), &Outcome::Terminated);
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_status_before_exit_is_usage_error() {
    let mut worker = spawn(|| {
        std::thread::sleep(Duration::from_millis(200));
        0u8
    })
    .unwrap();

    assert!(worker.exit_status().unwrap_err().is_usage());
    assert!(worker.result().unwrap_err().is_usage());
    worker.dispose().unwrap();
    assert!(worker.is_disposed());
}

#[test]
#[serial]
fn test_try_join_is_idempotent() {
    let mut worker = spawn(|| "done".to_string()).unwrap();
    while !worker.try_join().unwrap() {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(worker.try_join().unwrap());
    worker.join().unwrap();
    assert_eq!(worker.exit_status().unwrap(), 0);
    assert_eq!(worker.result().unwrap().map(String::as_str), Some("done"));
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_use_after_dispose() {
    let mut worker = spawn(|| 1u8).unwrap();
    worker.dispose().unwrap();

    assert!(matches!(worker.dispose(), Err(Error::Usage(_))));
    assert!(worker.try_join().unwrap_err().is_usage());
    assert!(worker.join().unwrap_err().is_usage());
    assert!(worker.exit_status().unwrap_err().is_usage());
}

#[test]
#[serial]
fn test_large_result_while_polling() {
    let mut worker = spawn(|| vec![7u8; 4 * 1024 * 1024]).unwrap();
    while !worker.try_join().unwrap() {
        std::thread::sleep(Duration::from_millis(2));
    }
    let value = worker.result().unwrap().unwrap();
    assert_eq!(value.len(), 4 * 1024 * 1024);
    assert!(value.iter().all(|&b| b == 7));
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_json_codec() {
    let mut worker = ThreadBuilder::new()
        .codec(Json)
        .spawn(|| ("json".to_string(), 3i64))
        .unwrap();
    worker.join().unwrap();
    assert_eq!(worker.result().unwrap(), Some(&("json".to_string(), 3)));
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_oversized_result_is_undelivered() {
    let mut worker = ThreadBuilder::new()
        .config(Config::testing().with_max_frame_bytes(1024))
        .spawn(|| vec![0u8; 4096])
        .unwrap();
    worker.join().unwrap();

    assert_eq!(worker.exit_status().unwrap(), 70);
    assert_eq!(worker.result().unwrap(), None);
    let reason = worker.outcome().unwrap().failure_reason().unwrap();
    assert!(reason.contains("could not be delivered"), "{}", reason);
    worker.dispose().unwrap();
}

#[test]
#[serial]
fn test_join_result() {
    let worker = spawn(|| 99u16).unwrap();
    assert_eq!(worker.join_result().unwrap(), 99);

    let worker = ThreadBuilder::new()
        .spawn_fallible(|| Err::<u16, _>("no value"))
        .unwrap();
    match worker.join_result() {
        Err(Error::Child(failure)) => {
            assert_eq!(failure.status, 1);
            assert_eq!(failure.reason, "no value");
        }
        other => panic!("expected child failure, got {:?}", other),
    }
}
