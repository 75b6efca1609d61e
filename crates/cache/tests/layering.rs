//! End-to-end layering, flush, and rollback behavior across cache levels.

use std::sync::Arc;

use chaindb_cache::{codec, shared_op_log, KeyedCache, KeyedDomain, UndoRegistry};
use chaindb_storage::{DomainTag, MemoryStore, Store};

struct Balances;
impl KeyedDomain for Balances {
    const TAG: DomainTag = DomainTag::Account;
    type Key = String;
    type Value = u64;
}

fn three_level_chain() -> (
    Arc<KeyedCache<Balances>>,
    Arc<KeyedCache<Balances>>,
    Arc<KeyedCache<Balances>>,
    Arc<MemoryStore>,
) {
    let store = Arc::new(MemoryStore::new());
    let persistent = KeyedCache::<Balances>::of_store(Arc::clone(&store) as Arc<dyn Store>);
    let block = KeyedCache::level_over(&persistent);
    let tx = KeyedCache::level_over(&block);
    (tx, block, persistent, store)
}

#[test]
fn write_in_child_is_invisible_to_root_until_flush() {
    let (tx, block, persistent, _store) = three_level_chain();

    tx.set(&"k1".into(), 10).unwrap();
    assert_eq!(tx.get(&"k1".into()).unwrap(), Some(10));
    assert_eq!(block.get(&"k1".into()).unwrap(), None);
    assert_eq!(persistent.get(&"k1".into()).unwrap(), None);

    tx.flush().unwrap();
    assert_eq!(block.get(&"k1".into()).unwrap(), Some(10));
    assert_eq!(persistent.get(&"k1".into()).unwrap(), None);

    block.flush().unwrap();
    assert_eq!(persistent.get(&"k1".into()).unwrap(), Some(10));
}

#[test]
fn flush_then_clear_reads_through_again() {
    let (tx, block, _persistent, _store) = three_level_chain();

    tx.set(&"k1".into(), 10).unwrap();
    tx.flush().unwrap();
    tx.clear();

    assert_eq!(tx.get(&"k1".into()).unwrap(), Some(10));
    assert_eq!(block.get(&"k1".into()).unwrap(), Some(10));
}

#[test]
fn discarded_layer_leaves_no_trace() {
    let (tx, block, persistent, store) = three_level_chain();
    block.set(&"base".into(), 1).unwrap();

    tx.set(&"base".into(), 99).unwrap();
    tx.set(&"extra".into(), 5).unwrap();
    tx.clear();

    assert_eq!(tx.get(&"base".into()).unwrap(), Some(1));
    assert_eq!(tx.get(&"extra".into()).unwrap(), None);
    assert_eq!(block.get(&"base".into()).unwrap(), Some(1));
    assert_eq!(persistent.get(&"base".into()).unwrap(), None);
    assert!(store.is_empty());
}

#[test]
fn flush_propagates_modified_flag_through_levels() {
    let (tx, block, persistent, store) = three_level_chain();

    tx.set(&"k1".into(), 10).unwrap();
    tx.flush().unwrap();
    // The merged entry stays modified in the block layer, so the block's
    // own flush pushes it further down.
    block.flush().unwrap();
    persistent.flush().unwrap();

    let key_bytes = codec::encode(&"k1".to_string()).unwrap();
    assert_eq!(
        store.get(DomainTag::Account, &key_bytes).unwrap(),
        Some(codec::encode(&10u64).unwrap())
    );
}

#[test]
fn tombstone_flushes_as_store_delete() {
    let (tx, block, persistent, store) = three_level_chain();

    persistent.set(&"k1".into(), 10).unwrap();
    persistent.flush().unwrap();
    let key_bytes = codec::encode(&"k1".to_string()).unwrap();
    assert!(store.contains(DomainTag::Account, &key_bytes));

    tx.erase(&"k1".into()).unwrap();
    assert_eq!(tx.get(&"k1".into()).unwrap(), None);

    tx.flush().unwrap();
    block.flush().unwrap();
    persistent.flush().unwrap();
    assert!(!store.contains(DomainTag::Account, &key_bytes));
}

#[test]
fn erase_of_key_absent_in_store_flushes_no_delete() {
    let (tx, block, persistent, store) = three_level_chain();

    tx.erase(&"k1".into()).unwrap();
    tx.flush().unwrap();
    block.flush().unwrap();
    persistent.flush().unwrap();

    assert!(store.is_empty());
}

#[test]
fn undo_round_trip_restores_every_touched_key() {
    let (tx, _block, _persistent, _store) = three_level_chain();
    tx.set(&"k1".into(), 10).unwrap();
    tx.set(&"k3".into(), 7).unwrap();

    let sink = shared_op_log();
    tx.attach_op_log(&sink);

    // Mixed sequence, with keys touched more than once.
    tx.set(&"k1".into(), 20).unwrap();
    tx.set(&"k2".into(), 5).unwrap();
    tx.set(&"k1".into(), 30).unwrap();
    tx.erase(&"k3".into()).unwrap();
    tx.set(&"k3".into(), 8).unwrap();
    tx.detach_op_log();

    assert_eq!(tx.get(&"k1".into()).unwrap(), Some(30));
    assert_eq!(tx.get(&"k2".into()).unwrap(), Some(5));
    assert_eq!(tx.get(&"k3".into()).unwrap(), Some(8));

    let mut registry = UndoRegistry::new();
    tx.register_undo(&mut registry);
    registry.undo(&sink.read()).unwrap();

    assert_eq!(tx.get(&"k1".into()).unwrap(), Some(10));
    assert_eq!(tx.get(&"k2".into()).unwrap(), None);
    assert_eq!(tx.get(&"k3".into()).unwrap(), Some(7));
}

#[test]
fn undo_after_flush_restores_the_flushed_target() {
    // The op log protects state that was already merged down: capture at
    // the persistent layer while a block applies, then roll the persistent
    // layer back as if the block were disconnected.
    let store = Arc::new(MemoryStore::new());
    let persistent = KeyedCache::<Balances>::of_store(Arc::clone(&store) as Arc<dyn Store>);
    persistent.set(&"k1".into(), 10).unwrap();

    let sink = shared_op_log();
    persistent.attach_op_log(&sink);
    persistent.set(&"k1".into(), 20).unwrap();
    persistent.set(&"k2".into(), 1).unwrap();
    persistent.detach_op_log();

    let mut registry = UndoRegistry::new();
    persistent.register_undo(&mut registry);
    registry.undo(&sink.read()).unwrap();

    assert_eq!(persistent.get(&"k1".into()).unwrap(), Some(10));
    assert_eq!(persistent.get(&"k2".into()).unwrap(), None);

    // The restored state is what reaches the store.
    persistent.flush().unwrap();
    let k1 = codec::encode(&"k1".to_string()).unwrap();
    let k2 = codec::encode(&"k2".to_string()).unwrap();
    assert_eq!(
        store.get(DomainTag::Account, &k1).unwrap(),
        Some(codec::encode(&10u64).unwrap())
    );
    assert_eq!(store.get(DomainTag::Account, &k2).unwrap(), None);
}

#[test]
fn undo_entries_without_sink_are_not_captured() {
    let (tx, _block, _persistent, _store) = three_level_chain();
    let sink = shared_op_log();

    tx.set(&"k1".into(), 10).unwrap();
    assert!(sink.read().is_empty());

    tx.attach_op_log(&sink);
    tx.set(&"k1".into(), 20).unwrap();
    assert_eq!(sink.read().len(), 1);
}
