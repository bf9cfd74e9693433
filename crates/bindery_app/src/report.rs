//! Human-readable run summary on stderr.

use bindery_engine::{Disposition, FailureEntry, RunReport};
use owo_colors::OwoColorize;

pub fn print_report(report: &RunReport) {
    eprintln!(
        "{} {} ({} chapter(s), {} image(s))",
        "✓".green(),
        report.archive_path.display().to_string().bright_green(),
        report.chapters,
        report.images
    );
    if report.cancelled {
        eprintln!(
            "{} interrupted after {} article(s); the archive holds the finished ones",
            "⚠".yellow(),
            report.attempted
        );
    }
    print_failures(&report.failures);
}

pub fn print_failures(failures: &[FailureEntry]) {
    if failures.is_empty() {
        return;
    }
    eprintln!("{} {} problem(s):", "⚠".yellow(), failures.len());
    for failure in failures {
        eprintln!("  {}", summarize(failure));
    }
}

fn summarize(failure: &FailureEntry) -> String {
    let outcome = match &failure.disposition {
        Disposition::Skipped => "skipped".to_string(),
        other => other.to_string(),
    };
    format!(
        "[{}] {} ({}): {}",
        failure.kind, failure.url, outcome, failure.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_engine::ErrorKind;

    #[test]
    fn summary_names_kind_and_url() {
        let line = summarize(&FailureEntry {
            url: "https://x.test/b".to_string(),
            kind: ErrorKind::FetchFailed,
            message: "failed to fetch https://x.test/b: http status 404: 404 Not Found".to_string(),
            disposition: Disposition::Skipped,
        });
        assert!(line.starts_with("[FetchFailed] https://x.test/b (skipped)"));
    }
}
