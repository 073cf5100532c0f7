//! Exhaustion detection and live-filter behavior of the random index
//! provider.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::RwLock;

use driftframe_core::host::memory::MemoryHost;
use driftframe_core::index::IndexGateway;
use driftframe_core::providers::random::{RandomIndexProvider, RandomProviderConfig};
use driftframe_core::providers::{MediaProvider, SharedSeen};
use driftframe_model::{
    FavoriteFilter, MediaItem, MediaKind, MediaMetadata, QueryFilters,
};

fn gateway(host: &Arc<MemoryHost>) -> Arc<IndexGateway> {
    Arc::new(IndexGateway::new(
        host.clone(),
        Some("sensor.photo_index".to_string()),
        1,
        Duration::from_millis(1),
    ))
}

fn item(uri: &str) -> MediaItem {
    MediaItem::new(uri, MediaKind::Image).with_metadata(MediaMetadata {
        captured_at: Some(Utc.timestamp_opt(1_000, 0).unwrap()),
        ..Default::default()
    })
}

/// A batch where `known` of the ten ids were already seen this session.
fn batch(known: usize, fresh_tag: &str) -> Vec<MediaItem> {
    let mut out: Vec<MediaItem> = (0..known).map(|i| item(&format!("/media/h{i}.jpg"))).collect();
    for i in 0..(10 - known) {
        out.push(item(&format!("/media/{fresh_tag}_{i}.jpg")));
    }
    out
}

fn seen_history() -> SharedSeen {
    let ids: HashSet<String> = (0..9).map(|i| format!("/media/h{i}.jpg")).collect();
    Arc::new(RwLock::new(ids))
}

fn config(prioritize_recent: bool) -> RandomProviderConfig {
    RandomProviderConfig {
        filters: QueryFilters::default(),
        prioritize_recent,
        batch_size: 10,
        low_water: 10,
        high_filter_rate: 0.8,
        exhaustion_latch: 2,
    }
}

fn flag_of(call: &serde_json::Value) -> Option<bool> {
    call.get("prioritize_recent").and_then(serde_json::Value::as_bool)
}

/// Two consecutive refills filtered above 80% latch the
/// prioritize-recent flag off; the first healthy refill unlatches it.
#[tokio::test]
async fn consecutive_exhausted_refills_latch_prioritize_recent_off() {
    let host = Arc::new(MemoryHost::new());
    // Refill 1 (initialize): prioritized query + full-pool retry.
    host.push_random_batch(batch(9, "n1"));
    host.push_random_batch(batch(9, "n2"));
    // Refill 2: same shape; this is the second consecutive high rate.
    host.push_random_batch(batch(9, "n3"));
    host.push_random_batch(batch(9, "n4"));
    // Refill 3: latched, single un-prioritized query.
    host.push_random_batch(batch(9, "n5"));
    // Refill 4: all fresh, resets the latch.
    host.push_random_batch(batch(0, "n6"));
    // Refill 5: the flag is back.
    host.push_random_batch(batch(0, "n7"));

    let mut provider = RandomIndexProvider::new(
        gateway(&host),
        host.clone(),
        config(true),
        seen_history(),
    );
    provider.initialize().await.unwrap();
    // Refills fire on the calls that find the buffer under its low
    // water mark; it takes seven pulls for the healthy refill to be
    // followed by another one.
    for _ in 0..7 {
        provider.get_next().await.unwrap();
    }

    let calls = host.calls_for("get_random_items");
    let flags: Vec<Option<bool>> = calls.iter().map(flag_of).collect();
    assert_eq!(
        flags,
        vec![
            Some(true), // refill 1, prioritized
            None,       // refill 1, full-pool retry
            Some(true), // refill 2, prioritized (latch not tripped yet)
            None,       // refill 2, full-pool retry
            None,       // refill 3: latched off, no retry either
            None,       // refill 4: still latched
            Some(true), // refill 5: healthy batch unlatched it
        ],
        "prioritize_recent sequence was {flags:?}"
    );
}

/// A hard service failure during initialize surfaces as an index error;
/// an empty (but successful) result surfaces as a filter error.
#[tokio::test]
async fn initialize_distinguishes_hard_failure_from_restrictive_filters() {
    let host = Arc::new(MemoryHost::new());
    host.set_index_fail(true);
    let mut provider = RandomIndexProvider::new(
        gateway(&host),
        host.clone(),
        config(false),
        Arc::new(RwLock::new(HashSet::new())),
    );
    let err = provider.initialize().await.unwrap_err();
    assert!(matches!(err, driftframe_core::EngineError::IndexUnavailable(_)));

    let host = Arc::new(MemoryHost::new());
    // Index healthy, but nothing matches.
    let mut provider = RandomIndexProvider::new(
        gateway(&host),
        host.clone(),
        config(false),
        Arc::new(RwLock::new(HashSet::new())),
    );
    let err = provider.initialize().await.unwrap_err();
    assert!(matches!(
        err,
        driftframe_core::EngineError::FiltersTooRestrictive(_)
    ));
}

/// A state change on a referenced filter entity forces a full reset:
/// buffer dropped, session history cleared, fresh query issued.
#[tokio::test]
async fn filter_entity_change_triggers_a_full_reset() {
    let host = Arc::new(MemoryHost::new());
    host.set_state("input_boolean.favorites_only", "off");
    host.push_random_batch(batch(0, "warm"));

    let seen = seen_history();
    let mut cfg = config(false);
    cfg.filters = QueryFilters {
        favorites: Some(FavoriteFilter::Entity("input_boolean.favorites_only".into())),
        date_range: None,
    };
    let mut provider =
        RandomIndexProvider::new(gateway(&host), host.clone(), cfg, Arc::clone(&seen));
    provider.initialize().await.unwrap();
    assert_eq!(seen.read().await.len(), 9);

    // Flip the entity and let the subscription task observe it.
    host.set_state("input_boolean.favorites_only", "on");
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }

    host.push_random_batch(batch(0, "fresh"));
    let next = provider.get_next().await.unwrap();
    assert!(next.is_some());
    // The session history reference was cleared by the reset.
    assert!(seen.read().await.is_empty() || seen.read().await.len() < 9);

    // The post-reset query resolved the new entity state.
    let calls = host.calls_for("get_random_items");
    let last = calls.last().unwrap();
    assert_eq!(last.get("favorites").and_then(serde_json::Value::as_bool), Some(true));
}
