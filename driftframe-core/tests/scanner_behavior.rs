//! Folder scanner behavior against the in-memory host.

use std::sync::Arc;

use driftframe_config::{
    PriorityFolder, ResolvedFolder, SlideshowMode, Tuning,
};
use driftframe_core::host::memory::MemoryHost;
use driftframe_core::scan::{FolderScanner, ScanPhase, ScannerConfig};
use driftframe_model::{OrderBy, OrderDirection};

const ROOT: &str = "media-source://media_source/local/photos";

fn folder_cfg(mode: SlideshowMode) -> ResolvedFolder {
    ResolvedFolder {
        path: ROOT.to_string(),
        mode,
        scan_depth: None,
        estimated_total_photos: None,
        priority_folders: Vec::new(),
        use_media_index_for_discovery: false,
        priority_new_files: false,
        new_files_threshold_seconds: 86_400,
        order_by: OrderBy::DateTaken,
        order_direction: OrderDirection::Asc,
        media_root_marker: "photos".to_string(),
        folder_date_pattern: None,
    }
}

fn scanner_cfg(folder: ResolvedFolder, target: usize) -> ScannerConfig {
    ScannerConfig {
        folder,
        target_queue_size: target,
        history_size: 10,
        tuning: Tuning::default(),
    }
}

/// Wait until the scan loop settles (complete, early-stopped, or
/// paused).
async fn wait_for_settle(scanner: &Arc<FolderScanner>) {
    for _ in 0..1_000 {
        if scanner.progress().await.phase != ScanPhase::Scanning {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("scan did not settle");
}

fn subfolder(name: &str) -> String {
    format!("{ROOT}/{name}")
}

fn file_id(folder: &str, name: &str) -> String {
    format!("{ROOT}/{folder}/{name}")
}

fn root_file(name: &str) -> String {
    format!("{ROOT}/{name}")
}

/// Scenario: subfolders with {2, 50, 15000} files, unlimited depth,
/// random mode, estimate 20000, window 100. The 15000-file folder must
/// dominate in absolute accepted count, and its per-file probability
/// carries the >10000 size multiplier.
#[tokio::test]
async fn large_folders_dominate_random_sampling() {
    let host = Arc::new(MemoryHost::new());
    host.add_folder(
        ROOT,
        vec![
            driftframe_core::host::BrowseNode::folder(subfolder("tiny"), "tiny"),
            driftframe_core::host::BrowseNode::folder(subfolder("medium"), "medium"),
            driftframe_core::host::BrowseNode::folder(subfolder("big"), "big"),
        ],
    );
    let tiny: Vec<String> = (0..2).map(|i| file_id("tiny", &format!("t{i}.jpg"))).collect();
    let medium: Vec<String> = (0..50).map(|i| file_id("medium", &format!("m{i}.jpg"))).collect();
    let big: Vec<String> = (0..15_000).map(|i| file_id("big", &format!("b{i}.jpg"))).collect();
    host.add_media_folder(subfolder("tiny"), &tiny.iter().map(String::as_str).collect::<Vec<_>>());
    host.add_media_folder(
        subfolder("medium"),
        &medium.iter().map(String::as_str).collect::<Vec<_>>(),
    );
    host.add_media_folder(subfolder("big"), &big.iter().map(String::as_str).collect::<Vec<_>>());

    let mut folder = folder_cfg(SlideshowMode::Random);
    folder.estimated_total_photos = Some(20_000);
    let scanner = Arc::new(FolderScanner::new(host.clone(), scanner_cfg(folder, 100)));
    scanner.initialize().await.unwrap();
    wait_for_settle(&scanner).await;

    let snapshot = scanner.snapshot().await;
    let accepted_big = snapshot.queued().filter(|i| i.id.contains("/big/")).count();
    let accepted_medium = snapshot.queued().filter(|i| i.id.contains("/medium/")).count();
    assert!(
        accepted_big > accepted_medium,
        "big folder accepted {accepted_big}, medium {accepted_medium}"
    );
    assert!(accepted_big > 50, "expected >50 accepted from the big folder");

    // The per-file probability for the big folder carries the 1.8x
    // size multiplier relative to the medium one.
    let p_big = driftframe_core::scan::sampling::acceptance_probability(100, 20_000, 100, 15_000, 1.0);
    let p_medium =
        driftframe_core::scan::sampling::acceptance_probability(100, 20_000, 100, 50, 1.0);
    assert!((p_big / p_medium - 1.8).abs() < 1e-9);

    // Scan completion locks the estimate at the discovered count.
    let progress = scanner.progress().await;
    assert!(progress.scan_complete);
    assert_eq!(progress.files_discovered, 15_052);
    assert_eq!(progress.estimated_total, 15_052);
}

#[tokio::test]
async fn priority_folders_boost_acceptance() {
    let host = Arc::new(MemoryHost::new());
    host.add_folder(
        ROOT,
        vec![
            driftframe_core::host::BrowseNode::folder(subfolder("plain"), "plain"),
            driftframe_core::host::BrowseNode::folder(subfolder("starred"), "starred"),
        ],
    );
    let plain: Vec<String> = (0..500).map(|i| file_id("plain", &format!("p{i}.jpg"))).collect();
    let starred: Vec<String> = (0..500).map(|i| file_id("starred", &format!("s{i}.jpg"))).collect();
    host.add_media_folder(subfolder("plain"), &plain.iter().map(String::as_str).collect::<Vec<_>>());
    host.add_media_folder(
        subfolder("starred"),
        &starred.iter().map(String::as_str).collect::<Vec<_>>(),
    );

    let mut folder = folder_cfg(SlideshowMode::Random);
    folder.estimated_total_photos = Some(100_000);
    folder.priority_folders = vec![PriorityFolder {
        path: "starred".to_string(),
        weight_multiplier: 20.0,
    }];
    let scanner = Arc::new(FolderScanner::new(host.clone(), scanner_cfg(folder, 50)));
    scanner.initialize().await.unwrap();
    wait_for_settle(&scanner).await;

    let snapshot = scanner.snapshot().await;
    let starred_count = snapshot.queued().filter(|i| i.id.contains("/starred/")).count();
    let plain_count = snapshot.queued().filter(|i| i.id.contains("/plain/")).count();
    assert!(
        starred_count > plain_count,
        "starred {starred_count} should beat plain {plain_count}"
    );
}

#[tokio::test]
async fn sequential_mode_collects_in_chronological_order() {
    let host = Arc::new(MemoryHost::new());
    host.add_folder(
        ROOT,
        vec![
            // Registered newest-first; the folder-date heuristic must
            // reorder traversal oldest-first.
            driftframe_core::host::BrowseNode::folder(subfolder("2022-03"), "2022-03"),
            driftframe_core::host::BrowseNode::folder(subfolder("2021-12"), "2021-12"),
        ],
    );
    host.add_media_folder(
        subfolder("2021-12"),
        &[
            &file_id("2021-12", "20211224_180000.jpg"),
            &file_id("2021-12", "20211201_090000.jpg"),
        ],
    );
    host.add_media_folder(
        subfolder("2022-03"),
        &[
            &file_id("2022-03", "20220315_120000.jpg"),
            &file_id("2022-03", "20220301_080000.jpg"),
        ],
    );

    let scanner = Arc::new(FolderScanner::new(
        host.clone(),
        scanner_cfg(folder_cfg(SlideshowMode::Sequential), 50),
    ));
    scanner.initialize().await.unwrap();
    wait_for_settle(&scanner).await;

    let mut shown = Vec::new();
    for _ in 0..4 {
        shown.push(scanner.get_next().await.unwrap().id);
    }
    assert_eq!(
        shown,
        vec![
            file_id("2021-12", "20211201_090000.jpg"),
            file_id("2021-12", "20211224_180000.jpg"),
            file_id("2022-03", "20220301_080000.jpg"),
            file_id("2022-03", "20220315_120000.jpg"),
        ]
    );

    // The collection is spent: aging out the shown set lets the
    // slideshow start over from the oldest items.
    let wrapped = scanner.get_next().await.unwrap();
    assert_eq!(wrapped.id, file_id("2021-12", "20211201_090000.jpg"));
}

#[tokio::test]
async fn sequential_scan_stops_early_at_the_target_and_resumes_on_demand() {
    let host = Arc::new(MemoryHost::new());
    host.add_folder(
        ROOT,
        vec![
            driftframe_core::host::BrowseNode::folder(subfolder("01"), "01"),
            driftframe_core::host::BrowseNode::folder(subfolder("02"), "02"),
        ],
    );
    let first: Vec<String> = (0..30)
        .map(|i| file_id("01", &format!("20220101_1000{i:02}.jpg")))
        .collect();
    let second: Vec<String> = (0..30)
        .map(|i| file_id("02", &format!("20220201_1000{i:02}.jpg")))
        .collect();
    host.add_media_folder(subfolder("01"), &first.iter().map(String::as_str).collect::<Vec<_>>());
    host.add_media_folder(subfolder("02"), &second.iter().map(String::as_str).collect::<Vec<_>>());

    let scanner = Arc::new(FolderScanner::new(
        host.clone(),
        scanner_cfg(folder_cfg(SlideshowMode::Sequential), 10),
    ));
    scanner.initialize().await.unwrap();
    wait_for_settle(&scanner).await;

    // Early stop: the second folder was never browsed.
    let progress = scanner.progress().await;
    assert!(!progress.scan_complete);
    assert!(progress.queue_len >= 10);
    assert!(host.browse_call_count() <= 2);

    // Draining below the buffer floor resumes traversal in the
    // background.
    // The resume fires once the queue drops under the target size.
    let mut drained: Vec<String> = Vec::new();
    for _ in 0..21 {
        drained.push(scanner.get_next().await.unwrap().id);
    }
    for _ in 0..1_000 {
        if scanner.progress().await.scan_complete {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(scanner.progress().await.scan_complete, "scan should resume and finish");

    // With the rest of the tree collected, consumption continues in
    // strict order: folder 01 ascending, then folder 02 ascending.
    for _ in 0..39 {
        drained.push(scanner.get_next().await.unwrap().id);
    }
    let expected: Vec<String> = first.iter().chain(second.iter()).cloned().collect();
    assert_eq!(drained, expected);
}

#[tokio::test(start_paused = true)]
async fn browse_timeouts_skip_the_subtree_without_aborting_the_scan() {
    let host = Arc::new(MemoryHost::new());
    host.add_folder(
        ROOT,
        vec![
            driftframe_core::host::BrowseNode::folder(subfolder("stuck"), "stuck"),
            driftframe_core::host::BrowseNode::folder(subfolder("ok"), "ok"),
        ],
    );
    host.hang_browse_for(subfolder("stuck"));
    host.add_media_folder(subfolder("ok"), &[&file_id("ok", "a.jpg"), &file_id("ok", "b.jpg")]);

    let scanner = Arc::new(FolderScanner::new(
        host.clone(),
        scanner_cfg(folder_cfg(SlideshowMode::Random), 10),
    ));
    scanner.initialize().await.unwrap();
    wait_for_settle(&scanner).await;

    let progress = scanner.progress().await;
    assert!(progress.scan_complete);
    // The stuck subtree contributed zero files.
    assert_eq!(progress.files_discovered, 2);
}

#[tokio::test]
async fn excluded_files_never_surface() {
    let host = Arc::new(MemoryHost::new());
    host.add_media_folder(ROOT, &[&root_file("a.jpg"), &root_file("b.jpg")]);

    let scanner = Arc::new(FolderScanner::new(
        host.clone(),
        scanner_cfg(folder_cfg(SlideshowMode::Sequential), 10),
    ));
    scanner.initialize().await.unwrap();
    wait_for_settle(&scanner).await;

    let banned = root_file("a.jpg");
    scanner.exclude(&banned).await;
    // Only the surviving file cycles; the excluded one never surfaces,
    // not even after the shown set ages out.
    for _ in 0..4 {
        assert_eq!(scanner.get_next().await.unwrap().id, root_file("b.jpg"));
    }
}

#[tokio::test]
async fn snapshot_handoff_skips_the_rescan() {
    let host = Arc::new(MemoryHost::new());
    let files: Vec<String> = (0..20).map(|i| root_file(&format!("f{i}.jpg"))).collect();
    host.add_media_folder(ROOT, &files.iter().map(String::as_str).collect::<Vec<_>>());

    let cfg = scanner_cfg(folder_cfg(SlideshowMode::Random), 10);
    let scanner = Arc::new(FolderScanner::new(host.clone(), cfg.clone()));
    scanner.initialize().await.unwrap();
    wait_for_settle(&scanner).await;
    let browses_before = host.browse_call_count();

    let snapshot = scanner.snapshot().await;
    let restored = Arc::new(FolderScanner::from_snapshot(host.clone(), cfg, snapshot));
    restored.initialize().await.unwrap();
    assert_eq!(host.browse_call_count(), browses_before, "no re-browse after handoff");
    assert!(restored.get_next().await.is_some());
}

#[tokio::test]
async fn pause_preserves_traversal_state_for_resume() {
    let host = Arc::new(MemoryHost::new());
    host.add_folder(
        ROOT,
        vec![
            driftframe_core::host::BrowseNode::folder(subfolder("a"), "a"),
            driftframe_core::host::BrowseNode::folder(subfolder("b"), "b"),
        ],
    );
    host.add_media_folder(subfolder("a"), &[&file_id("a", "1.jpg")]);
    host.add_media_folder(subfolder("b"), &[&file_id("b", "2.jpg")]);

    let scanner = Arc::new(FolderScanner::new(
        host.clone(),
        scanner_cfg(folder_cfg(SlideshowMode::Random), 10),
    ));
    // Pause before anything runs: the first batch unwinds silently.
    scanner.pause();
    scanner.initialize().await.unwrap();
    assert_eq!(scanner.progress().await.phase, ScanPhase::Paused);

    scanner.resume().await;
    wait_for_settle(&scanner).await;
    let progress = scanner.progress().await;
    assert!(progress.scan_complete);
    assert_eq!(progress.files_discovered, 2);
}
