//! Progress bars for seeding and query timing.
//!
//! One bar per table, advanced by the insert workers as batches commit, and
//! one per test query, advanced after every timed run.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({percent}%) {msg}";

/// Bar for inserting `rows` rows into `table`, drawn on stderr
pub fn table_bar(table: &str, rows: u64) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(rows), ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ");
    pb.set_style(style);
    pb.set_message(table.to_string());
    pb
}

const QUERY_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len} runs";

/// Bar for `runs` timed executions of test `name`, drawn on stderr
pub fn query_bar(name: &str, runs: u64) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(runs), ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template(QUERY_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ");
    pb.set_style(style);
    pb.set_message(name.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_bar_tracks_rows() {
        let pb = table_bar("users", 10);
        pb.inc(4);
        assert_eq!(pb.position(), 4);
        assert_eq!(pb.length(), Some(10));
    }

    #[test]
    fn test_query_bar_counts_runs() {
        let pb = query_bar("by email", 3);
        pb.inc(1);
        assert_eq!(pb.position(), 1);
        assert_eq!(pb.length(), Some(3));
    }
}
