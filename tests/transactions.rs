//! End-to-end transaction behavior, run identically against both
//! reference backends through the `Engine` trait object.

use keyspan::{
    with_transaction, Engine, Error, KeySelector, MemoryEngine, RangeOptions, RetryConfig,
    SingleWriterEngine,
};

static_assertions::assert_impl_all!(MemoryEngine: Send, Sync);
static_assertions::assert_impl_all!(SingleWriterEngine: Send, Sync);

/// Both reference backends behind the uniform contract.
fn engines() -> Vec<(&'static str, Box<dyn Engine>)> {
    vec![
        ("memory", Box::new(MemoryEngine::new())),
        ("single-writer", Box::new(SingleWriterEngine::new())),
    ]
}

fn fast_retry() -> RetryConfig {
    RetryConfig::new().with_base_delay_ms(0).with_max_delay_ms(0)
}

#[test]
fn last_write_wins_with_clear() {
    for (name, engine) in engines() {
        let mut txn = engine.create_transaction().unwrap();
        txn.set(&[0x01], &[1]);
        txn.clear(&[0x01]);
        txn.set(&[0x01], &[2]);
        assert_eq!(txn.get(&[0x01]).unwrap(), Some(vec![2]), "{name}");
        txn.commit().unwrap();

        let reader = engine.create_transaction().unwrap();
        assert_eq!(reader.get(&[0x01]).unwrap(), Some(vec![2]), "{name}");
    }
}

#[test]
fn reverse_then_limit() {
    for (name, engine) in engines() {
        let mut setup = engine.create_transaction().unwrap();
        for i in 1u8..=5 {
            setup.set(&[i], &[i * 10]);
        }
        setup.commit().unwrap();

        let mut txn = engine.create_transaction().unwrap();
        let pairs = txn
            .get_range(
                KeySelector::first_greater_or_equal(vec![0x01]),
                KeySelector::first_greater_or_equal(vec![0x06]),
                RangeOptions::default().with_limit(2).with_reverse(true),
            )
            .unwrap()
            .into_vec()
            .unwrap();
        txn.cancel();

        assert_eq!(pairs.len(), 2, "{name}");
        assert_eq!((pairs[0].key.clone(), pairs[0].value.clone()), (vec![0x05], vec![50]), "{name}");
        assert_eq!((pairs[1].key.clone(), pairs[1].value.clone()), (vec![0x04], vec![40]), "{name}");
    }
}

#[test]
fn clear_range_boundaries_are_half_open() {
    for (name, engine) in engines() {
        let mut setup = engine.create_transaction().unwrap();
        for i in 1u8..=5 {
            setup.set(&[i], &[i]);
        }
        setup.commit().unwrap();

        let mut txn = engine.create_transaction().unwrap();
        txn.clear_range(&[0x02], &[0x05]);
        assert_eq!(txn.get(&[0x01]).unwrap(), Some(vec![1]), "{name}");
        for i in 2u8..=4 {
            assert_eq!(txn.get(&[i]).unwrap(), None, "{name} key {i}");
        }
        assert_eq!(txn.get(&[0x05]).unwrap(), Some(vec![5]), "{name}");
        txn.commit().unwrap();

        let reader = engine.create_transaction().unwrap();
        assert_eq!(reader.get(&[0x01]).unwrap(), Some(vec![1]), "{name}");
        assert_eq!(reader.get(&[0x03]).unwrap(), None, "{name}");
        assert_eq!(reader.get(&[0x05]).unwrap(), Some(vec![5]), "{name}");
    }
}

#[test]
fn range_scans_agree_with_point_reads() {
    for (name, engine) in engines() {
        let mut setup = engine.create_transaction().unwrap();
        for i in 0u8..20 {
            setup.set(&[i], &[i]);
        }
        setup.commit().unwrap();

        let mut txn = engine.create_transaction().unwrap();
        txn.set(&[3], b"replaced");
        txn.clear_range(&[5], &[9]);
        txn.set(&[7], b"revived");
        txn.clear(&[11]);

        let pairs = txn
            .get_range(
                KeySelector::first_greater_or_equal(vec![0]),
                KeySelector::first_greater_or_equal(vec![0xFF]),
                RangeOptions::default(),
            )
            .unwrap()
            .into_vec()
            .unwrap();

        // strictly ascending, and every emitted pair matches a point read
        for window in pairs.windows(2) {
            assert!(window[0].key < window[1].key, "{name}");
        }
        for pair in &pairs {
            assert_eq!(txn.get(&pair.key).unwrap(), Some(pair.value.clone()), "{name}");
        }
        // and keys the scan skipped really are absent
        for skipped in [5u8, 6, 8, 11] {
            assert!(!pairs.iter().any(|kv| kv.key == vec![skipped]), "{name}");
            assert_eq!(txn.get(&[skipped]).unwrap(), None, "{name}");
        }
        txn.cancel();
    }
}

#[test]
fn lifecycle_state_machine() {
    for (name, engine) in engines() {
        // double commit is a no-op; commit then cancel is a no-op
        let mut txn = engine.create_transaction().unwrap();
        txn.set(b"k", b"v");
        txn.commit().unwrap();
        txn.commit().unwrap();
        txn.cancel();
        drop(txn);

        let reader = engine.create_transaction().unwrap();
        assert_eq!(reader.get(b"k").unwrap(), Some(b"v".to_vec()), "{name}");
        drop(reader);

        // cancel then commit is an error; double cancel is fine
        let mut txn = engine.create_transaction().unwrap();
        txn.cancel();
        txn.cancel();
        assert!(
            matches!(txn.commit(), Err(Error::InvalidOperation { .. })),
            "{name}"
        );
        drop(txn);

        // cancelled transactions silently drop writes and reject reads
        let mut txn = engine.create_transaction().unwrap();
        txn.set(b"ghost", b"1");
        txn.cancel();
        txn.set(b"ghost", b"2");
        assert!(matches!(txn.get(b"ghost"), Err(Error::InvalidOperation { .. })), "{name}");
        drop(txn);

        let reader = engine.create_transaction().unwrap();
        assert_eq!(reader.get(b"ghost").unwrap(), None, "{name}");
    }
}

#[test]
fn rollback_on_user_failure() {
    for (name, engine) in engines() {
        let result: keyspan::Result<()> =
            with_transaction(engine.as_ref(), &fast_retry(), |txn| {
                txn.set(&[0x01], &[42]);
                Err(Error::backend("synthetic failure"))
            });
        assert!(result.is_err(), "{name}");

        let reader = engine.create_transaction().unwrap();
        assert_eq!(reader.get(&[0x01]).unwrap(), None, "{name}");
    }
}

#[test]
fn retry_loop_reaches_success() {
    for (name, engine) in engines() {
        let mut remaining_failures = 2;
        let value = with_transaction(engine.as_ref(), &fast_retry(), |txn| {
            txn.set(b"attempted", b"yes");
            if remaining_failures > 0 {
                remaining_failures -= 1;
                return Err(Error::conflict("induced"));
            }
            Ok(7)
        })
        .unwrap();
        assert_eq!(value, 7, "{name}");

        let reader = engine.create_transaction().unwrap();
        assert_eq!(reader.get(b"attempted").unwrap(), Some(b"yes".to_vec()), "{name}");
    }
}

#[test]
fn get_key_resolves_on_both_backends() {
    for (name, engine) in engines() {
        let mut setup = engine.create_transaction().unwrap();
        setup.set(b"b", b"1");
        setup.set(b"d", b"2");
        setup.set(b"f", b"3");
        setup.commit().unwrap();

        let mut txn = engine.create_transaction().unwrap();
        assert_eq!(
            txn.get_key(&KeySelector::first_greater_or_equal(b"c".to_vec())).unwrap(),
            Some(b"d".to_vec()),
            "{name}"
        );
        assert_eq!(
            txn.get_key(&KeySelector::first_greater_than(b"d".to_vec())).unwrap(),
            Some(b"f".to_vec()),
            "{name}"
        );
        assert_eq!(
            txn.get_key(&KeySelector::last_less_or_equal(b"d".to_vec())).unwrap(),
            Some(b"d".to_vec()),
            "{name}"
        );
        assert_eq!(
            txn.get_key(&KeySelector::last_less_than(b"b".to_vec())).unwrap(),
            None,
            "{name}"
        );
        txn.cancel();
    }
}

#[test]
fn empty_and_crossed_ranges_are_empty() {
    for (name, engine) in engines() {
        let mut setup = engine.create_transaction().unwrap();
        setup.set(b"m", b"1");
        setup.commit().unwrap();

        let mut txn = engine.create_transaction().unwrap();
        // begin past end
        let pairs = txn
            .get_range(
                KeySelector::first_greater_or_equal(b"z".to_vec()),
                KeySelector::first_greater_or_equal(b"a".to_vec()),
                RangeOptions::default(),
            )
            .unwrap()
            .into_vec()
            .unwrap();
        assert!(pairs.is_empty(), "{name}");

        // empty window
        let pairs = txn
            .get_range(
                KeySelector::first_greater_or_equal(b"n".to_vec()),
                KeySelector::first_greater_or_equal(b"n".to_vec()),
                RangeOptions::default(),
            )
            .unwrap()
            .into_vec()
            .unwrap();
        assert!(pairs.is_empty(), "{name}");
        txn.cancel();
    }
}

#[test]
fn snapshot_isolation_on_the_memory_backend() {
    // only the memory backend admits overlapping transactions
    let engine = MemoryEngine::new();
    let mut writer = engine.create_transaction().unwrap();
    writer.set(b"k", b"initial");
    writer.commit().unwrap();

    let reader = engine.create_transaction().unwrap();

    let mut concurrent = engine.create_transaction().unwrap();
    concurrent.set(b"k", b"changed");
    concurrent.commit().unwrap();

    // the reader's snapshot predates the concurrent commit
    assert_eq!(reader.get(b"k").unwrap(), Some(b"initial".to_vec()));

    let fresh = engine.create_transaction().unwrap();
    assert_eq!(fresh.get(b"k").unwrap(), Some(b"changed".to_vec()));
}

#[test]
fn timeout_produces_a_retryable_error() {
    for (name, engine) in engines() {
        let mut txn = engine.create_transaction().unwrap();
        txn.set_option(keyspan::TransactionOption::Timeout(0)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));

        let err = txn.get(b"k").unwrap_err();
        assert_eq!(err, Error::TransactionTooOld, "{name}");
        assert!(err.is_retryable(), "{name}");
        txn.cancel();
    }
}
