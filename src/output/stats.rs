//! Statistics generation from the queue database and output directories
//!
//! This module provides functionality for extracting and displaying
//! harvest progress without touching the running workers.

use crate::output::is_placeholder;
use crate::state::PageStatus;
use crate::storage::PageQueue;
use crate::HarvestError;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Harvest statistics summary
#[derive(Debug, Clone, Default)]
pub struct QueueStatistics {
    /// Total number of pages discovered
    pub total_pages: u64,

    /// Count of pages by status
    pub pages_by_status: HashMap<PageStatus, u64>,

    /// Number of page directories under the output root
    pub page_directories: u64,

    /// Images written to disk
    pub images_saved: u64,

    /// Images given up on (placeholder files)
    pub images_skipped: u64,
}

/// Loads statistics from the queue and the output root
///
/// # Arguments
///
/// * `store` - The queue to query
/// * `output_root` - Directory holding one sub-directory per page
pub fn load_statistics(
    store: &dyn PageQueue,
    output_root: &Path,
) -> Result<QueueStatistics, HarvestError> {
    let mut stats = QueueStatistics {
        total_pages: store.count_total_pages()?,
        ..Default::default()
    };

    for status in PageStatus::all_statuses() {
        let count = store.count_pages_by_status(status)?;
        if count > 0 {
            stats.pages_by_status.insert(status, count);
        }
    }

    let page_dirs = match fs::read_dir(output_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(stats),
        Err(e) => return Err(e.into()),
    };

    for page_dir in page_dirs {
        let page_dir = page_dir?;
        if !page_dir.file_type()?.is_dir() {
            continue;
        }
        stats.page_directories += 1;

        for image in fs::read_dir(page_dir.path())? {
            let name = image?.file_name();
            if is_placeholder(&name.to_string_lossy()) {
                stats.images_skipped += 1;
            } else {
                stats.images_saved += 1;
            }
        }
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &QueueStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Queue:");
    println!("  Total pages discovered: {}", stats.total_pages);
    for status in PageStatus::all_statuses() {
        let count = stats.pages_by_status.get(&status).copied().unwrap_or(0);
        let percentage = if stats.total_pages > 0 {
            (count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!("Output:");
    println!("  Page directories: {}", stats.page_directories);
    println!("  Images saved: {}", stats.images_saved);
    println!("  Images skipped: {}", stats.images_skipped);
}
