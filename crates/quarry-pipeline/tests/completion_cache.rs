//! The refresh-while-serving protocol of the two completion caches.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use quarry_core::Position;
use quarry_pipeline::{CompletionEngine, CompletionItem, CompletionProvider, CompletionSink};

/// Synchronous fake parser: answers every request immediately with a
/// generation-stamped list and counts how often it was asked.
struct FakeProvider {
    calls: AtomicUsize,
}

impl FakeProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl CompletionProvider for FakeProvider {
    fn code_complete(&self, _path: &str, _position: Position, done: CompletionSink) {
        let generation = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        done(vec![
            CompletionItem::new(format!("result_gen{generation}"), 0),
            CompletionItem::new("frobnicate", 1),
        ]);
    }
}

fn collect(engine: &CompletionEngine, position: Position, is_global: bool) -> (Vec<String>, bool) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    engine.complete(
        "/p/foo.cc",
        position,
        is_global,
        "",
        Box::new(move |items, is_cached| {
            let labels = items.into_iter().map(|i| i.label).collect::<Vec<_>>();
            tx.send((labels, is_cached)).unwrap();
        }),
    );
    rx.recv().expect("callback invoked exactly once")
}

#[test]
fn global_cache_serves_stale_and_refreshes_behind_it() {
    let provider = FakeProvider::new();
    let engine = CompletionEngine::new(provider.clone(), true);

    // First completion is a miss: parser runs, cache fills.
    let (labels, is_cached) = collect(&engine, Position::new(10, 3), true);
    assert!(!is_cached);
    assert!(labels.contains(&"result_gen1".to_string()));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    // Second completion at a different position: cached results come back
    // immediately AND a fresh parse replaces the cached vector.
    let (labels, is_cached) = collect(&engine, Position::new(12, 7), true);
    assert!(is_cached);
    assert!(labels.contains(&"result_gen1".to_string()));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2, "freshen ran");

    let refreshed = engine
        .global_cache
        .with_lock(|state| state.cached_results.clone());
    assert!(refreshed.iter().any(|i| i.label == "result_gen2"));
}

#[test]
fn non_global_cache_is_position_exact() {
    let provider = FakeProvider::new();
    let engine = CompletionEngine::new(provider.clone(), true);
    let position = Position::new(4, 9);

    let (_, is_cached) = collect(&engine, position, false);
    assert!(!is_cached);

    // Same position replays the cache without consulting the parser.
    let (_, is_cached) = collect(&engine, position, false);
    assert!(is_cached);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    // A different position is a miss.
    let (_, is_cached) = collect(&engine, Position::new(5, 1), false);
    assert!(!is_cached);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn cached_and_fresh_results_share_post_processing() {
    let provider = FakeProvider::new();
    let engine = CompletionEngine::new(provider, true);

    let (fresh, _) = collect(&engine, Position::new(1, 1), true);
    let (cached, is_cached) = collect(&engine, Position::new(2, 2), true);
    assert!(is_cached);
    assert_eq!(fresh, cached, "identical filter and ordering");
}
