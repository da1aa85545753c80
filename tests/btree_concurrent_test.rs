use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::thread_rng;

use karstdb::common::types::Rid;
use karstdb::index::btree::BPlusTree;
use karstdb::transaction::{IsolationLevel, Transaction};

mod common;
use common::create_test_buffer_pool;

fn rid_for(key: i64) -> Rid {
    Rid::new((key / 1000) as i32, (key % 1000) as u32)
}

#[test]
fn test_concurrent_inserts_disjoint_ranges() -> Result<()> {
    const THREADS: i64 = 8;
    const PER_THREAD: i64 = 1000;

    let (buffer_pool, _file) = create_test_buffer_pool(256)?;
    let tree = Arc::new(BPlusTree::<i64>::new("idx_conc", buffer_pool, 16, 16)?);

    let mut handles = Vec::new();
    for t in 0..THREADS {
        let tree = tree.clone();
        handles.push(thread::spawn(move || {
            let txn = Transaction::new(t as u32 + 1, IsolationLevel::RepeatableRead);
            let mut keys: Vec<i64> = (0..PER_THREAD).map(|i| t * PER_THREAD + i).collect();
            keys.shuffle(&mut thread_rng());
            for key in keys {
                assert!(tree.insert(key, rid_for(key), &txn).unwrap());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // all 8000 keys present, in order, each mapped to its own rid
    let txn = Transaction::new(100, IsolationLevel::RepeatableRead);
    let mut iter = tree.begin()?;
    let mut count: i64 = 0;
    while let Some((key, rid)) = iter.current().map(|(k, rid)| (*k, rid)) {
        assert_eq!(key, count);
        assert_eq!(rid, rid_for(key));
        count += 1;
        iter.advance()?;
    }
    assert_eq!(count, THREADS * PER_THREAD);

    for key in (0..THREADS * PER_THREAD).step_by(97) {
        assert_eq!(tree.get_value(&key, &txn)?, vec![rid_for(key)]);
    }
    Ok(())
}

#[test]
fn test_concurrent_mixed_insert_delete() -> Result<()> {
    const THREADS: i64 = 4;
    const PER_THREAD: i64 = 500;

    let (buffer_pool, _file) = create_test_buffer_pool(256)?;
    let tree = Arc::new(BPlusTree::<i64>::new("idx_mixed", buffer_pool, 8, 8)?);

    // seed every key, then have each thread delete the odd half of its range
    // while re-checking the even half stays reachable
    {
        let txn = Transaction::new(1, IsolationLevel::RepeatableRead);
        for key in 0..THREADS * PER_THREAD {
            assert!(tree.insert(key, rid_for(key), &txn)?);
        }
    }

    let mut handles = Vec::new();
    for t in 0..THREADS {
        let tree = tree.clone();
        handles.push(thread::spawn(move || {
            let txn = Transaction::new(t as u32 + 10, IsolationLevel::RepeatableRead);
            let base = t * PER_THREAD;
            for i in 0..PER_THREAD {
                let key = base + i;
                if key % 2 == 1 {
                    tree.remove(&key, &txn).unwrap();
                } else {
                    let found = tree.get_value(&key, &txn).unwrap();
                    assert_eq!(found, vec![rid_for(key)]);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // survivors are exactly the even keys
    let expected: HashSet<i64> = (0..THREADS * PER_THREAD).filter(|k| k % 2 == 0).collect();
    let mut iter = tree.begin()?;
    let mut survivors = HashSet::new();
    let mut previous = i64::MIN;
    while let Some((key, _)) = iter.current().map(|(k, rid)| (*k, rid)) {
        assert!(key > previous, "iterator must ascend");
        previous = key;
        survivors.insert(key);
        iter.advance()?;
    }
    assert_eq!(survivors, expected);
    Ok(())
}

#[test]
fn test_concurrent_readers_and_writers() -> Result<()> {
    let (buffer_pool, _file) = create_test_buffer_pool(256)?;
    let tree = Arc::new(BPlusTree::<i64>::new("idx_rw", buffer_pool, 8, 8)?);

    {
        let txn = Transaction::new(1, IsolationLevel::RepeatableRead);
        for key in 0..1000 {
            tree.insert(key, rid_for(key), &txn)?;
        }
    }

    let mut handles = Vec::new();
    // two writers append beyond the seeded range
    for w in 0..2i64 {
        let tree = tree.clone();
        handles.push(thread::spawn(move || {
            let txn = Transaction::new(w as u32 + 2, IsolationLevel::RepeatableRead);
            for i in 0..500 {
                let key = 1000 + w * 500 + i;
                tree.insert(key, rid_for(key), &txn).unwrap();
            }
        }));
    }
    // two readers hammer the stable prefix
    for r in 0..2u32 {
        let tree = tree.clone();
        handles.push(thread::spawn(move || {
            let txn = Transaction::new(r + 10, IsolationLevel::RepeatableRead);
            for round in 0..5 {
                for key in (round..1000).step_by(7) {
                    let found = tree.get_value(&key, &txn).unwrap();
                    assert_eq!(found, vec![rid_for(key)]);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let txn = Transaction::new(50, IsolationLevel::RepeatableRead);
    for key in 0..2000 {
        assert_eq!(tree.get_value(&key, &txn)?, vec![rid_for(key)]);
    }
    Ok(())
}
