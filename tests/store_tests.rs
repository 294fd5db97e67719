//! Integration tests for the store's write and read paths.

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use valuelog::{Error, Location, MemoryKeyIndex, Options, OptionsBuilder, Store};
use tempfile::TempDir;

fn open_default(dir: &TempDir) -> Arc<Store> {
    Store::open(dir.path(), Arc::new(MemoryKeyIndex::new())).unwrap()
}

/// Every put round-trips through get.
#[test]
fn store_put_get_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = open_default(&dir);

    let pairs: Vec<(&[u8], &[u8])> = vec![
        (b"user:1", b"Alice"),
        (b"user:2", b"Bob"),
        (b"blob", &[0u8, 1, 2, 255][..]),
        (b"empty", b""),
    ];

    let locations: Vec<Location> = pairs
        .iter()
        .map(|(k, v)| store.put(k, v).unwrap())
        .collect();

    for ((_, value), location) in pairs.iter().zip(&locations) {
        assert_eq!(store.get(location).unwrap(), Bytes::copy_from_slice(value));
    }
}

/// First puts at a fresh store land at known offsets and sequences.
#[test]
fn store_fresh_put_locations() {
    let dir = TempDir::new().unwrap();
    let store = open_default(&dir);

    let first = store.put(b"k1", b"v1").unwrap();
    assert_eq!(
        first,
        Location {
            length: 16 + 2 + 2,
            file_number: 0,
            offset: 0,
            sequence: 0,
            level: 0,
        }
    );

    let second = store.put(b"k2", b"v2").unwrap();
    assert_eq!(second.offset, first.length);
    assert_eq!(second.sequence, 1);
    assert_eq!(second.file_number, 0);
    assert_eq!(second.level, 0);

    assert_eq!(store.get(&first).unwrap(), Bytes::from("v1"));
    assert_eq!(store.get(&second).unwrap(), Bytes::from("v2"));
}

/// Exceeding the per-file capacity rotates the active file; no record is
/// split across two files.
#[test]
fn store_file_rotation() {
    let dir = TempDir::new().unwrap();
    let options = OptionsBuilder::new().file_capacity(1024).build().unwrap();
    let store =
        Store::open_with_options(dir.path(), options, Arc::new(MemoryKeyIndex::new())).unwrap();

    let value = vec![7u8; 600];
    let mut locations = Vec::new();
    for i in 0..6 {
        let key = format!("key{}", i);
        locations.push(store.put(key.as_bytes(), &value).unwrap());
    }

    let stats = store.stats();
    assert!(stats.current_file_number > 0);
    assert_eq!(stats.levels.get(0).end, stats.current_file_number);

    // File numbers only ever grow, and each record sits whole in its file.
    let mut last_file = 0;
    for location in &locations {
        assert!(location.file_number >= last_file);
        last_file = location.file_number;
        assert_eq!(store.get(location).unwrap(), Bytes::copy_from_slice(&value));
    }
}

/// Concurrent puts receive unique sequences covering a contiguous range and
/// non-overlapping byte ranges within the file.
#[test]
fn store_concurrent_puts() {
    let dir = TempDir::new().unwrap();
    let store = open_default(&dir);

    let threads = 4;
    let puts_per_thread = 25;

    let mut handles = Vec::new();
    for t in 0..threads {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let mut locations = Vec::new();
            for i in 0..puts_per_thread {
                let key = format!("t{}-k{}", t, i);
                let value = format!("t{}-v{}", t, i);
                locations.push(store.put(key.as_bytes(), value.as_bytes()).unwrap());
            }
            locations
        }));
    }

    let mut locations: Vec<Location> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    let total = (threads * puts_per_thread) as u32;

    // Sequences are unique and cover [0, total).
    let mut sequences: Vec<u32> = locations.iter().map(|l| l.sequence).collect();
    sequences.sort_unstable();
    assert_eq!(sequences, (0..total).collect::<Vec<_>>());

    // Offsets form one contiguous, non-overlapping run within file 0.
    locations.sort_by_key(|l| l.offset);
    let mut expected_offset = 0;
    for location in &locations {
        assert_eq!(location.file_number, 0);
        assert_eq!(location.level, 0);
        assert_eq!(location.offset, expected_offset);
        expected_offset += location.length;
    }
}

/// Close then reopen restores every counter and level entry.
#[test]
fn store_close_reopen_preserves_state() {
    let dir = TempDir::new().unwrap();
    let options = OptionsBuilder::new().file_capacity(1024).build().unwrap();

    let before = {
        let store = Store::open_with_options(
            dir.path(),
            options.clone(),
            Arc::new(MemoryKeyIndex::new()),
        )
        .unwrap();

        let value = vec![1u8; 400];
        for i in 0..5 {
            let key = format!("key{}", i);
            store.put(key.as_bytes(), &value).unwrap();
        }

        let stats = store.stats();
        store.close().unwrap();
        stats
    };

    let store =
        Store::open_with_options(dir.path(), options, Arc::new(MemoryKeyIndex::new())).unwrap();
    assert_eq!(store.stats(), before);
}

/// Records written before a clean shutdown are readable after reopen.
#[test]
fn store_reopen_reads_old_records() {
    let dir = TempDir::new().unwrap();

    let location = {
        let store = open_default(&dir);
        let location = store.put(b"durable", b"payload").unwrap();
        store.close().unwrap();
        location
    };

    let store = open_default(&dir);
    assert_eq!(store.get(&location).unwrap(), Bytes::from("payload"));

    // Appends continue where the old cursor left off.
    let next = store.put(b"more", b"data").unwrap();
    assert_eq!(next.offset, location.length);
    assert_eq!(next.sequence, 1);
}

/// A location whose file is gone surfaces NotFound, not a crash.
#[test]
fn store_get_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_default(&dir);

    let fake = Location {
        length: 20,
        file_number: 99,
        offset: 0,
        sequence: 0,
        level: 5,
    };

    let err = store.get(&fake).unwrap_err();
    assert!(err.is_not_found());
}

/// Reading past the end of a real file is also NotFound.
#[test]
fn store_get_past_end_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_default(&dir);

    let real = store.put(b"k", b"v").unwrap();
    let past_end = Location {
        offset: real.length + 4096,
        ..real
    };

    let err = store.get(&past_end).unwrap_err();
    assert!(err.is_not_found());
}

/// Default options reject a second open while the first holds the lock.
#[test]
fn store_directory_lock() {
    let dir = TempDir::new().unwrap();
    let store = open_default(&dir);

    let second = Store::open(dir.path(), Arc::new(MemoryKeyIndex::new()));
    assert!(matches!(second, Err(Error::LockError(_))));

    // Releasing the first store frees the lock.
    store.close().unwrap();
    drop(store);
    assert!(Store::open(dir.path(), Arc::new(MemoryKeyIndex::new())).is_ok());
}

/// The configured file extension shows up in value file names.
#[test]
fn store_file_extension() {
    let dir = TempDir::new().unwrap();
    let options = Options {
        file_extension: Some("vlog".to_string()),
        ..Options::default()
    };
    let store =
        Store::open_with_options(dir.path(), options, Arc::new(MemoryKeyIndex::new())).unwrap();

    let location = store.put(b"k", b"v").unwrap();
    assert!(dir.path().join("level_0_number_0.vlog").exists());
    assert_eq!(store.get(&location).unwrap(), Bytes::from("v"));
}

/// Metrics track put/get traffic.
#[test]
fn store_metrics_track_traffic() {
    let dir = TempDir::new().unwrap();
    let store = open_default(&dir);

    let location = store.put(b"k1", b"value").unwrap();
    store.get(&location).unwrap();
    store.get(&location).unwrap();

    let summary = store.metrics().summary();
    assert_eq!(summary.puts, 1);
    assert_eq!(summary.gets, 2);
    assert_eq!(summary.bytes_written, location.length as u64);
    assert_eq!(summary.bytes_read, 10); // "value" twice
    assert_eq!(summary.live_size, location.length as i64);
}
