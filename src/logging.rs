//! Formatting helpers for progress and summary log lines.

use std::time::Duration;

use log::{info, warn};

use crate::external_sort::{OutputStrategy, SortStats};

/// Formats a count with thousands separators.
///
/// # Examples
///
/// ```
/// use kv_sort::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Formats a duration in human-readable form.
///
/// Sub-second durations are shown in milliseconds.
///
/// # Examples
///
/// ```
/// use kv_sort::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
/// assert_eq!(format_duration(Duration::from_secs(45)), "45s");
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// assert_eq!(format_duration(Duration::from_secs(5400)), "1h 30m");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Logs the end-of-sort summary.
pub fn log_sort_summary(stats: &SortStats, output: &std::path::Path) {
    let how = match stats.strategy {
        OutputStrategy::Empty => "no records, wrote empty output".to_string(),
        OutputStrategy::SingleRun => "single run".to_string(),
        OutputStrategy::Merged => format!("merged {} runs", stats.runs),
    };

    info!(
        "Sorted {} records into {} ({}) in {}",
        format_count(stats.records),
        output.display(),
        how,
        format_duration(stats.elapsed)
    );

    if stats.malformed_lines > 0 {
        warn!("Skipped {} malformed input lines", format_count(stats.malformed_lines));
    }
}
