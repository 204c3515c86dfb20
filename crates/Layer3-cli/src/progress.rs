//! Progress rendering for plugin runs
//!
//! Progress lines go to stderr so stdout stays clean for plugin output.

use fieldkit_core::ProgressSink;
use std::sync::Arc;

/// Sink that renders `  [ 42%] message` lines to stderr
pub fn stderr_sink() -> ProgressSink {
    Arc::new(|fraction, message| {
        eprintln!("{}", format_progress(fraction, message));
    })
}

fn format_progress(fraction: f64, message: &str) -> String {
    format!("  [{:>3.0}%] {}", fraction * 100.0, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_progress() {
        assert_eq!(format_progress(0.42, "probing"), "  [ 42%] probing");
        assert_eq!(format_progress(0.0, "start"), "  [  0%] start");
        assert_eq!(format_progress(1.0, "done"), "  [100%] done");
    }
}
