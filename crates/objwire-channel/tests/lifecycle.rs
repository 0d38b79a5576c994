#![cfg(unix)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use objwire_channel::{Channel, ChannelConfig, ChannelError, Ownership, Socket};

fn pair() -> (Channel, Channel) {
    let (left, right) = Socket::pair().expect("socket pair");
    (
        Channel::new(left, Ownership::Owned).expect("left channel"),
        Channel::new(right, Ownership::Owned).expect("right channel"),
    )
}

#[test]
fn dispose_twice_is_a_no_op() {
    let (a, _b) = pair();
    a.dispose();
    a.dispose();
    assert!(a.is_disposed());
}

#[test]
fn disposed_channel_reads_default_and_drops_writes() {
    let (a, b) = pair();
    a.dispose();

    assert_eq!(a.read::<i32>(), 0);
    a.write(&[1, 2, 3]);
    assert!(matches!(a.try_read::<i32>(), Err(ChannelError::Disposed)));
    assert!(matches!(a.try_write(&[1]), Err(ChannelError::Disposed)));

    // The owned socket was shut down, so the peer sees the close.
    assert!(matches!(b.try_read::<i32>(), Err(ChannelError::Disconnected)));
}

#[test]
fn disconnect_is_not_terminal() {
    let (a, b) = pair();
    a.disconnect();

    assert!(!a.is_disposed());
    assert!(!a.is_connected());
    assert!(matches!(a.try_write(&[1]), Err(ChannelError::Disconnected)));
    assert_eq!(b.read::<i32>(), 0);
    assert!(!b.is_connected());

    a.dispose();
    assert!(a.is_disposed());
}

#[test]
fn drop_closes_the_connection() {
    let (a, b) = pair();
    drop(a);

    assert!(matches!(b.try_read::<String>(), Err(ChannelError::Disconnected)));
}

#[test]
fn dispose_wakes_blocked_reader() {
    let (a, _b) = pair();
    let a = Arc::new(a);

    let reader = {
        let a = Arc::clone(&a);
        std::thread::spawn(move || a.try_read::<i32>())
    };
    std::thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    a.dispose();
    let outcome = reader.join().unwrap();

    assert!(outcome.is_err());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn shared_ownership_leaves_connection_open() {
    let (left, right) = Socket::pair().unwrap();
    let keep = left.try_clone().unwrap();

    let a = Channel::new(left, Ownership::Shared).unwrap();
    let b = Channel::new(right, Ownership::Owned).unwrap();
    a.dispose();

    let survivor = Channel::new(keep, Ownership::Owned).unwrap();
    survivor.write_one(&11u8);
    assert_eq!(b.read::<u8>(), 11);
}

#[test]
fn error_hook_sees_swallowed_failures() {
    let (left, right) = Socket::pair().unwrap();
    let seen = Arc::new(AtomicUsize::new(0));
    let config = {
        let seen = Arc::clone(&seen);
        ChannelConfig::default().with_error_hook(move |_err| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
    };

    let a = Channel::new(left, Ownership::Owned).unwrap();
    let b = Channel::with_config(right, Ownership::Owned, config).unwrap();

    a.write_one("text");
    a.write_one(&5u8);
    assert_eq!(b.read::<u8>(), 0);
    assert_eq!(b.read::<u8>(), 5);
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    b.dispose();
    b.write_one(&1u8);
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn try_write_after_peer_gone_fails() {
    let (a, b) = pair();
    drop(b);

    // The first writes may still land in the socket buffer; keep going until
    // the broken pipe surfaces.
    let mut failure = None;
    for _ in 0..64 {
        if let Err(err) = a.try_write(&["payload"]) {
            failure = Some(err);
            break;
        }
    }
    assert!(failure.is_some());
    assert!(!a.is_connected());
}

#[test]
fn failed_write_stops_later_writes() {
    let (left, right) = Socket::pair().expect("socket pair");
    let a = Channel::builder(left)
        .ownership(Ownership::Owned)
        .write_timeout(Duration::from_millis(20))
        .build()
        .expect("writer channel");
    let _b = Channel::new(right, Ownership::Owned).expect("idle peer");

    // Nobody reads, so the frame cannot fit in the socket buffer and times
    // out with some of it already sent.
    let big = "x".repeat(4 * 1024 * 1024);
    assert!(a.try_write(&[big.as_str()]).is_err());
    assert!(!a.is_connected());

    assert!(matches!(a.try_write(&[7i32]), Err(ChannelError::Disconnected)));
}
