#![cfg(unix)]

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use objwire_channel::{Channel, Ownership, Password, Socket};

fn pair() -> (Arc<Channel>, Arc<Channel>) {
    let (left, right) = Socket::pair().expect("socket pair");
    (
        Arc::new(Channel::new(left, Ownership::Owned).expect("left channel")),
        Arc::new(Channel::new(right, Ownership::Owned).expect("right channel")),
    )
}

#[test]
fn concurrent_writers_never_interleave_batches() {
    let (a, b) = pair();
    const WRITERS: u32 = 4;
    const BATCHES: u32 = 25;

    let writers: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let a = Arc::clone(&a);
            thread::spawn(move || {
                for batch in 0..BATCHES {
                    let base = (writer * 1000 + batch) * 10;
                    a.write(&[base, base + 1, base + 2]);
                }
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for _ in 0..WRITERS * BATCHES {
        let first: u32 = b.read();
        assert_eq!(first % 10, 0, "batch started mid-way: {first}");
        assert_eq!(b.read::<u32>(), first + 1);
        assert_eq!(b.read::<u32>(), first + 2);
        assert!(seen.insert(first));
    }

    for writer in writers {
        writer.join().unwrap();
    }
}

#[test]
fn read_and_write_directions_are_independent() {
    let (a, b) = pair();
    let password = Arc::new(Password::new("pw").unwrap());

    let echo = {
        let b = Arc::clone(&b);
        let password = Arc::clone(&password);
        thread::spawn(move || {
            for _ in 0..50 {
                let n: u64 = b.read_with(&password);
                b.write_one_with(&password, &(n + 1));
            }
        })
    };

    let feeder = {
        let a = Arc::clone(&a);
        let password = Arc::clone(&password);
        thread::spawn(move || {
            for n in 0..50u64 {
                a.write_one_with(&password, &(n * 2));
            }
        })
    };

    let mut replies = Vec::new();
    for _ in 0..50 {
        replies.push(a.read_with::<u64>(&password));
    }

    feeder.join().unwrap();
    echo.join().unwrap();
    assert_eq!(replies, (0..50u64).map(|n| n * 2 + 1).collect::<Vec<_>>());
}

#[test]
fn concurrent_readers_each_get_whole_frames() {
    let (a, b) = pair();
    a.write(&(0..200u32).collect::<Vec<_>>());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let b = Arc::clone(&b);
            thread::spawn(move || (0..50).map(|_| b.read::<u32>()).collect::<Vec<_>>())
        })
        .collect();

    let mut all: Vec<u32> = readers
        .into_iter()
        .flat_map(|reader| reader.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..200u32).collect::<Vec<_>>());
}
