// src/plugin/render.rs
// =============================================================================
// Formats a plugin's progress as a one-line status string:
//
//   Links: ██████░░░░░░░░░░░░░░ 03/10 links | ⏱ 4s | 02 passed, 01 failed
//
// The failed and skipped parts only appear when they are nonzero. Counts are
// zero-padded to the width of the total so the line doesn't jitter while the
// numbers grow.
// =============================================================================

use super::progress::Progress;

/// Number of cells in the progress bar
pub const BAR_WIDTH: usize = 20;

pub fn progress_bar(done: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (done.min(total) * width) / total
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

pub fn status_line(title: &str, check_label: &str, progress: &Progress) -> String {
    let width = progress.total.to_string().len();
    let pad = |n: usize| format!("{:0width$}", n, width = width);

    let mut results = format!("{} passed", pad(progress.passed));
    if progress.failed > 0 {
        results.push_str(&format!(", {} failed", pad(progress.failed)));
    }
    if progress.skipped > 0 {
        results.push_str(&format!(", {} skipped", pad(progress.skipped)));
    }

    format!(
        "{}: {} {}/{} {} | ⏱ {}s | {}",
        title,
        progress_bar(progress.done, progress.total, BAR_WIDTH),
        pad(progress.done),
        progress.total,
        check_label,
        progress.duration_secs,
        results
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_fills_proportionally() {
        assert_eq!(progress_bar(0, 4, 4), "░░░░");
        assert_eq!(progress_bar(2, 4, 4), "██░░");
        assert_eq!(progress_bar(4, 4, 4), "████");
    }

    #[test]
    fn test_bar_with_no_work() {
        assert_eq!(progress_bar(0, 0, 3), "░░░");
    }

    #[test]
    fn test_only_passed_clause_when_nothing_failed() {
        let progress = Progress {
            total: 1,
            done: 1,
            passed: 1,
            duration_secs: 0,
            ..Progress::default()
        };
        let line = status_line("Links", "pages", &progress);
        assert!(line.starts_with("Links: "));
        assert!(line.ends_with("1/1 pages | ⏱ 0s | 1 passed"));
    }

    #[test]
    fn test_counts_are_padded_to_total_width() {
        let progress = Progress {
            total: 120,
            done: 9,
            passed: 5,
            failed: 3,
            skipped: 1,
            duration_secs: 12,
        };
        let line = status_line("Pages", "pages", &progress);
        assert!(line.contains(" 009/120 pages "));
        assert!(line.ends_with("| ⏱ 12s | 005 passed, 003 failed, 001 skipped"));
    }
}
