//! Weighted sampling math for the folder scanner. Pure functions; the
//! scanner supplies the randomness.

use driftframe_config::PriorityFolder;

/// Sampling weight of a folder when drawing refills across the
/// discovered pool. Logarithmic for real folders so a 15000-file dump
/// does not completely starve the small ones.
pub fn folder_weight(file_count: usize) -> f64 {
    if file_count == 0 {
        0.0
    } else if file_count >= 5 {
        (file_count as f64).log10() * 10.0
    } else {
        file_count as f64 * 0.5
    }
}

/// Per-file probability scale by folder size.
pub fn size_multiplier(file_count: usize) -> f64 {
    if file_count > 10_000 {
        1.8
    } else if file_count > 1_000 {
        1.5
    } else if file_count > 100 {
        1.2
    } else {
        1.0
    }
}

/// Acceptance-rate boost while the queue is still short, so a slideshow
/// can start before a huge library finishes scanning.
pub fn urgency_multiplier(queue_len: usize) -> f64 {
    if queue_len < 10 {
        10.0
    } else if queue_len < 30 {
        3.0
    } else if queue_len < 50 {
        1.5
    } else {
        1.0
    }
}

/// Largest multiplier across all priority-folder rules whose pattern
/// matches the folder path; 1.0 when none match.
pub fn priority_multiplier(folder_path: &str, rules: &[PriorityFolder]) -> f64 {
    rules
        .iter()
        .filter(|rule| folder_path.contains(&rule.path))
        .map(|rule| rule.weight_multiplier)
        .fold(1.0, f64::max)
}

/// Per-file acceptance probability: base rate `target/estimate` scaled
/// by urgency, folder size, and priority patterns, capped at 1.0.
pub fn acceptance_probability(
    target_queue_size: usize,
    estimated_total: u64,
    queue_len: usize,
    folder_file_count: usize,
    path_multiplier: f64,
) -> f64 {
    if estimated_total == 0 {
        return 1.0;
    }
    let base = target_queue_size as f64 / estimated_total as f64;
    (base * urgency_multiplier(queue_len) * size_multiplier(folder_file_count) * path_multiplier)
        .min(1.0)
}

/// Accumulated-insert count that triggers a queue shuffle. Shuffling in
/// batches keeps insertion O(1) amortized instead of re-shuffling on
/// every accepted file.
pub fn shuffle_threshold(queue_len: usize) -> usize {
    ((queue_len as f64 * 0.10) as usize).clamp(10, 1000)
}
