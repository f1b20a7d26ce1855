//! Model-based test: random operation sequences applied to both store
//! implementations must agree with a plain `BTreeMap` model, including
//! across a restart of the durable store.

use kvstore::{DiskKv, KvConfig, KvStore, MemKv, WriteBatch};
use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::TempDir;

#[derive(Clone, Debug)]
enum Op {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
    RemoveRange(Vec<u8>, Vec<u8>),
    Batch(Vec<(Vec<u8>, Option<Vec<u8>>)>),
}

fn arb_key() -> impl Strategy<Value = Vec<u8>> {
    // Small alphabet so operations collide often.
    (0u8..6).prop_map(|b| vec![b'k', b'a' + b])
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (arb_key(), prop::collection::vec(any::<u8>(), 0..16))
            .prop_map(|(key, value)| Op::Put(key, value)),
        arb_key().prop_map(Op::Delete),
        (arb_key(), arb_key()).prop_map(|(a, b)| {
            let (first, last) = if a <= b { (a, b) } else { (b, a) };
            Op::RemoveRange(first, last)
        }),
        prop::collection::vec(
            (arb_key(), prop::option::of(prop::collection::vec(any::<u8>(), 0..8))),
            1..4
        )
        .prop_map(Op::Batch),
    ]
}

fn apply_to_model(model: &mut BTreeMap<Vec<u8>, Vec<u8>>, op: &Op) {
    match op {
        Op::Put(key, value) => {
            model.insert(key.clone(), value.clone());
        }
        Op::Delete(key) => {
            model.remove(key);
        }
        Op::RemoveRange(first, last) => {
            model.retain(|key, _| !(key.as_slice() >= first.as_slice() && key.as_slice() < last.as_slice()));
        }
        Op::Batch(entries) => {
            for (key, value) in entries {
                match value {
                    Some(value) => {
                        model.insert(key.clone(), value.clone());
                    }
                    None => {
                        model.remove(key);
                    }
                }
            }
        }
    }
}

fn apply_to_store(store: &mut dyn KvStore, op: &Op) {
    match op {
        Op::Put(key, value) => store.put(key, value).unwrap(),
        Op::Delete(key) => store.delete(key).unwrap(),
        Op::RemoveRange(first, last) => store.remove_range(first, last).unwrap(),
        Op::Batch(entries) => {
            let mut batch = WriteBatch::new();
            for (key, value) in entries {
                match value {
                    Some(value) => batch.put(key, value),
                    None => batch.delete(key),
                }
            }
            store.commit(batch).unwrap();
        }
    }
}

fn contents(store: &dyn KvStore) -> BTreeMap<Vec<u8>, Vec<u8>> {
    let mut out = BTreeMap::new();
    store
        .scan(b"", b"z", true, &mut |key, value| {
            out.insert(key.to_vec(), value.to_vec());
            Ok(true)
        })
        .unwrap();
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn stores_agree_with_model(ops in prop::collection::vec(arb_op(), 1..40)) {
        let dir = TempDir::new().unwrap();
        let config = KvConfig::builder()
            .dir(dir.path().to_path_buf())
            .fsync(false)
            .build();

        let mut model = BTreeMap::new();
        let mut mem = MemKv::new();
        let mut disk = DiskKv::open(config.clone()).unwrap();

        for op in &ops {
            apply_to_model(&mut model, op);
            apply_to_store(&mut mem, op);
            apply_to_store(&mut disk, op);
        }

        prop_assert_eq!(&contents(&mem), &model);
        prop_assert_eq!(&contents(&disk), &model);

        // The durable store must replay to the same state.
        disk.close().unwrap();
        let reopened = DiskKv::open(config).unwrap();
        prop_assert_eq!(&contents(&reopened), &model);
    }
}
