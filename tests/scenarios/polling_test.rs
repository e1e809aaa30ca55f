/*!
 * Polling Scenario
 * A parent polls a slow child until its result is available
 */

use pretty_assertions::assert_eq;
use procthread::spawn;
use serial_test::serial;
use std::time::{Duration, Instant};

#[test]
#[serial]
fn test_poll_until_result() {
    let started = Instant::now();
    let mut worker = spawn(|| {
        std::thread::sleep(Duration::from_millis(500));
        (0..200u64).map(|i| i * 3).collect::<Vec<_>>()
    })
    .unwrap();

    let mut polls = 0u32;
    while !worker.try_join().unwrap() {
        polls += 1;
        std::thread::sleep(Duration::from_millis(100));
    }

    assert!(polls > 0, "child finished before the first poll");
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(worker.exit_status().unwrap(), 0);

    let values = worker.result().unwrap().unwrap();
    assert_eq!(values.len(), 200);
    assert_eq!(values[199], 597);
    worker.dispose().unwrap();
}
