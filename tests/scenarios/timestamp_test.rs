/*!
 * Timestamp Ordering Scenario
 * Two senders stamp messages in separate processes; a third process
 * collects them and the stamps reflect the order they were taken in.
 */

use pretty_assertions::assert_eq;
use procthread::{spawn, timestamp, Channel, Timestamp};
use serial_test::serial;
use std::time::Duration;

#[test]
#[serial]
fn test_cross_process_timestamps_order_events() {
    let mut channel: Channel<(String, Timestamp)> = Channel::new().unwrap();
    let ch = &channel;
    let before = timestamp();

    let mut receiver = spawn(move || {
        let mut events: Vec<(String, Timestamp)> =
            (0..2).map(|_| ch.receive_blocking().unwrap()).collect();
        events.sort_by_key(|(_, stamp)| *stamp);
        (events[0].0.clone(), events)
    })
    .unwrap();

    let mut late = spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        ch.send(&("late".to_string(), timestamp())).unwrap();
    })
    .unwrap();

    let mut early = spawn(move || {
        ch.send(&("early".to_string(), timestamp())).unwrap();
    })
    .unwrap();

    for worker in [&mut early, &mut late] {
        worker.join().unwrap();
        assert_eq!(worker.exit_status().unwrap(), 0);
    }
    receiver.join().unwrap();
    assert_eq!(receiver.exit_status().unwrap(), 0);

    let (earlier, events) = receiver.result().unwrap().unwrap();
    assert_eq!(earlier, "early");
    let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["early", "late"]);

    let (early_stamp, late_stamp) = (events[0].1, events[1].1);
    assert_eq!(early_stamp.origin(), early.pid() as u32);
    assert_eq!(late_stamp.origin(), late.pid() as u32);
    assert!(early_stamp > before);
    assert!(late_stamp.saturating_since(&early_stamp) >= Duration::from_millis(150));

    early.dispose().unwrap();
    late.dispose().unwrap();
    receiver.dispose().unwrap();
}
