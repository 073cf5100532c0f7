//! Cursor pagination behavior of the ordered index provider.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use driftframe_core::host::memory::MemoryHost;
use driftframe_core::index::IndexGateway;
use driftframe_core::providers::paged::{PagedIndexProvider, PagedProviderConfig};
use driftframe_core::providers::MediaProvider;
use driftframe_model::{
    MediaItem, MediaKind, MediaMetadata, OrderBy, OrderDirection, PageCursor,
};

fn gateway(host: &Arc<MemoryHost>) -> Arc<IndexGateway> {
    Arc::new(IndexGateway::new(
        host.clone(),
        Some("sensor.photo_index".to_string()),
        1,
        Duration::from_millis(1),
    ))
}

fn dated(id: i64, uri: &str, ts: i64) -> MediaItem {
    MediaItem::new(uri, MediaKind::Image).with_metadata(MediaMetadata {
        captured_at: Some(Utc.timestamp_opt(ts, 0).unwrap()),
        index_id: Some(id),
        ..Default::default()
    })
}

fn undated(id: i64, uri: &str) -> MediaItem {
    MediaItem::new(uri, MediaKind::Image).with_metadata(MediaMetadata {
        index_id: Some(id),
        ..Default::default()
    })
}

fn provider(host: &Arc<MemoryHost>, queue_size: usize) -> PagedIndexProvider {
    PagedIndexProvider::new(
        gateway(host),
        PagedProviderConfig {
            order_by: OrderBy::DateTaken,
            direction: OrderDirection::Desc,
            queue_size,
            low_water: 10,
        },
    )
}

/// No item returned twice, no item skipped, even when many items share
/// the same sort value — the compound tie-break id carries the cursor
/// through runs of equal dates.
#[tokio::test]
async fn cursor_is_monotonic_across_equal_sort_values() {
    let host = Arc::new(MemoryHost::new());
    let mut dataset = Vec::new();
    // Ten items share one timestamp; twenty more descend from it.
    for id in 1..=10 {
        dataset.push(dated(id, &format!("/media/equal_{id}.jpg"), 5_000));
    }
    for id in 11..=30 {
        dataset.push(dated(id, &format!("/media/run_{id}.jpg"), 5_000 - id));
    }
    host.seed_index(dataset);

    let mut provider = provider(&host, 7);
    provider.set_auto_loop(false);
    provider.initialize().await.unwrap();

    let mut seen_ids: Vec<i64> = Vec::new();
    while let Some(item) = provider.get_next().await.unwrap() {
        seen_ids.push(item.index_id().unwrap());
    }

    let unique: HashSet<i64> = seen_ids.iter().copied().collect();
    assert_eq!(seen_ids.len(), 30, "every row exactly once: {seen_ids:?}");
    assert_eq!(unique.len(), 30);
    // The equal-date run drains in tie-break order before the rest.
    assert_eq!(&seen_ids[..10], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
}

/// Batches whose internal order the backend got wrong (its null/date
/// handling is untrusted) are re-sorted client-side, and the cursor for
/// the next page comes from the re-sorted tail, not the raw batch tail.
#[tokio::test]
async fn cursor_advances_from_the_resorted_tail() {
    let host = Arc::new(MemoryHost::new());

    let noise = |id: i64| {
        MediaItem::new(format!("/media/skip_{id}.txt"), MediaKind::Unknown).with_metadata(
            MediaMetadata {
                captured_at: Some(Utc.timestamp_opt(3_000, 0).unwrap()),
                index_id: Some(id),
                ..Default::default()
            },
        )
    };

    // Three scripted batches of 9 (6 filtered as unsupported), so one
    // fetch pass accumulates all three. The third batch is misordered:
    // its raw tail is d=1_900/id=8, but the true minimum is an item
    // with no capture date whose modified-time fallback is 1_800.
    let tail_item = MediaItem::new("/media/fallback_9.jpg", MediaKind::Image).with_metadata(
        MediaMetadata {
            modified_at: Some(Utc.timestamp_opt(1_800, 0).unwrap()),
            index_id: Some(9),
            ..Default::default()
        },
    );

    host.push_ordered_batch(vec![
        dated(1, "/media/a1.jpg", 3_000),
        dated(2, "/media/a2.jpg", 2_900),
        dated(3, "/media/a3.jpg", 2_800),
        noise(101),
        noise(102),
        noise(103),
        noise(104),
        noise(105),
        noise(106),
    ]);
    host.push_ordered_batch(vec![
        dated(4, "/media/b4.jpg", 2_700),
        dated(5, "/media/b5.jpg", 2_600),
        dated(6, "/media/b6.jpg", 2_500),
        noise(107),
        noise(108),
        noise(109),
        noise(110),
        noise(111),
        noise(112),
    ]);
    host.push_ordered_batch(vec![
        dated(7, "/media/c7.jpg", 2_000),
        tail_item,
        dated(8, "/media/c8.jpg", 1_900),
        noise(113),
        noise(114),
        noise(115),
        noise(116),
        noise(117),
        noise(118),
    ]);
    // The refill triggered by the first get_next observes the cursor.
    host.push_ordered_batch(Vec::new());

    let mut provider = provider(&host, 9);
    provider.initialize().await.unwrap();

    let first = provider.get_next().await.unwrap().unwrap();
    assert_eq!(first.index_id(), Some(1), "re-sorted buffer starts at the newest item");

    let calls = host.calls_for("get_ordered_files");
    assert_eq!(calls.len(), 4);
    let cursor: PageCursor =
        serde_json::from_value(calls[3].get("cursor").cloned().unwrap()).unwrap();
    // The re-sorted tail is the modified-time-fallback item (1_800/9),
    // not the raw batch tail (1_900/8).
    let expected = PageCursor::for_item(
        &MediaItem::new("/media/fallback_9.jpg", MediaKind::Image).with_metadata(MediaMetadata {
            modified_at: Some(Utc.timestamp_opt(1_800, 0).unwrap()),
            index_id: Some(9),
            ..Default::default()
        }),
        OrderBy::DateTaken,
    )
    .unwrap();
    assert_eq!(cursor, expected);
}

/// Undated items land after every dated item in a descending sort.
#[tokio::test]
async fn null_dates_sort_after_dated_items() {
    let host = Arc::new(MemoryHost::new());
    host.push_ordered_batch(vec![
        undated(4, "/media/undated_4.jpg"),
        dated(1, "/media/d1.jpg", 900),
        undated(5, "/media/undated_5.jpg"),
        dated(2, "/media/d2.jpg", 800),
        dated(3, "/media/d3.jpg", 700),
    ]);

    let mut provider = provider(&host, 9);
    provider.set_auto_loop(false);
    provider.initialize().await.unwrap();

    let mut order = Vec::new();
    while let Some(item) = provider.get_next().await.unwrap() {
        order.push(item.index_id().unwrap());
    }
    assert_eq!(order, vec![1, 2, 3, 4, 5]);
}

/// Exhaustion wraps to the beginning: cursor reset, exclusions cleared,
/// fresh query.
#[tokio::test]
async fn wrap_restarts_from_the_beginning_and_clears_exclusions() {
    let host = Arc::new(MemoryHost::new());
    let dataset: Vec<MediaItem> = (1..=6)
        .map(|id| dated(id, &format!("/media/w{id}.jpg"), 1_000 - id))
        .collect();
    host.seed_index(dataset);

    let mut provider = provider(&host, 6);
    provider.initialize().await.unwrap();
    provider.exclude_file("/media/w3.jpg").await;

    let mut first_pass = Vec::new();
    while let Some(item) = provider.get_next().await.unwrap() {
        first_pass.push(item.index_id().unwrap());
        if first_pass.len() > 10 {
            break;
        }
    }
    assert!(first_pass.len() > 5, "expected the traversal to wrap: {first_pass:?}");
    // The excluded row never surfaced before the wrap...
    assert_eq!(&first_pass[..5], &[1, 2, 4, 5, 6]);
    // ...and the wrap restarted at the top with exclusions cleared, so
    // the previously-404'd row gets another chance.
    assert_eq!(first_pass[5], 1);
    assert!(first_pass[5..].contains(&3));
}

/// A short collection is fully buffered by the preload pass.
#[tokio::test]
async fn small_collections_preload_entirely() {
    let host = Arc::new(MemoryHost::new());
    host.seed_index(vec![
        dated(1, "/media/s1.jpg", 300),
        dated(2, "/media/s2.jpg", 200),
    ]);

    let mut provider = provider(&host, 50);
    provider.initialize().await.unwrap();
    assert!(provider.fully_loaded());
}
