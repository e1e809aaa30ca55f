/*!
 * Channel Tests
 * Channels shared between a parent and its forked children
 */

use pretty_assertions::assert_eq;
use procthread::{spawn, Channel, Config, Json};
use serial_test::serial;
use std::time::Duration;

#[test]
#[serial]
fn test_child_to_parent_fifo() {
    let mut channel: Channel<u32> = Channel::new().unwrap();
    let tx = &channel;
    let mut producer = spawn(move || {
        for i in 0..100u32 {
            tx.send(&i).unwrap();
        }
    })
    .unwrap();

    let received: Vec<u32> = (0..100)
        .map(|_| channel.receive_blocking().unwrap())
        .collect();
    assert_eq!(received, (0..100).collect::<Vec<_>>());

    producer.join().unwrap();
    assert_eq!(producer.exit_status().unwrap(), 0);
    producer.dispose().unwrap();
    channel.dispose().unwrap();
}

#[test]
#[serial]
fn test_parent_to_child() {
    let mut channel: Channel<String, Json> =
        Channel::with_codec(&Config::testing(), Json).unwrap();
    let rx = &channel;
    let mut consumer = spawn(move || {
        let mut words = Vec::new();
        loop {
            let word = rx.receive_blocking().unwrap();
            if word.is_empty() {
                return words;
            }
            words.push(word);
        }
    })
    .unwrap();

    for word in ["alpha", "beta", "gamma", ""] {
        channel.send(&word.to_string()).unwrap();
    }
    consumer.join().unwrap();
    assert_eq!(
        consumer.result().unwrap(),
        Some(&vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()])
    );
    consumer.dispose().unwrap();
    channel.dispose().unwrap();
}

#[test]
#[serial]
fn test_concurrent_producers_keep_per_sender_order() {
    let mut channel: Channel<(u8, u32)> = Channel::new().unwrap();
    let tx = &channel;
    let mut producers: Vec<_> = (0..2u8)
        .map(|id| {
            spawn(move || {
                for seq in 0..50u32 {
                    tx.send(&(id, seq)).unwrap();
                }
            })
            .unwrap()
        })
        .collect();

    let mut seen = [Vec::new(), Vec::new()];
    for _ in 0..100 {
        let (id, seq) = channel.receive_blocking().unwrap();
        seen[id as usize].push(seq);
    }
    for per_sender in &seen {
        assert_eq!(per_sender, &(0..50).collect::<Vec<u32>>());
    }

    for producer in &mut producers {
        producer.join().unwrap();
        assert_eq!(producer.exit_status().unwrap(), 0);
        producer.dispose().unwrap();
    }
    channel.dispose().unwrap();
}

#[test]
#[serial]
fn test_nonblocking_receive_eventually_sees_message() {
    let mut channel: Channel<u64> = Channel::new().unwrap();
    assert_eq!(channel.try_receive().unwrap(), None);

    let tx = &channel;
    let mut producer = spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        tx.send(&12345).unwrap();
    })
    .unwrap();

    let value = loop {
        if let Some(value) = channel.try_receive().unwrap() {
            break value;
        }
        std::thread::sleep(Duration::from_millis(5));
    };
    assert_eq!(value, 12345);

    producer.join().unwrap();
    producer.dispose().unwrap();
    channel.dispose().unwrap();
}
