use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{self, Severity};

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    step::banner("🧪 Running codec-core tests...");
    let total_start = Instant::now();

    let run_unit = !integration_only;
    let run_integration = !unit_only;

    if run_unit {
        let output = step::cargo(
            "Unit tests",
            &["test", "-p", "codec-core", "--lib"],
            Severity::Fatal,
        )?;
        report(&output.stdout);
    }

    if run_integration {
        // Scenarios, SSR gating, clock arbitration, registry, proptests,
        // threads and architecture checks all live under tests/.
        let output = step::cargo(
            "Integration tests",
            &["test", "-p", "codec-core", "--tests", "--features", "tracing"],
            Severity::Fatal,
        )?;
        report(&output.stdout);
    }

    // Don't fail on doc test failures.
    let output = step::cargo(
        "Doc tests",
        &["test", "-p", "codec-core", "--doc"],
        Severity::Advisory,
    )?;
    if output.status.success() {
        report(&output.stdout);
    }

    step::done("All tests completed", total_start);
    Ok(())
}

fn report(stdout: &[u8]) {
    let text = String::from_utf8_lossy(stdout);
    for summary in extract_test_summaries(&text) {
        println!("    {}", summary.dimmed());
    }
    println!();
}

/// Every "test result:" line, one per test binary.
fn extract_test_summaries(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split("test result:").nth(1))
        .map(|summary| summary.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::extract_test_summaries;

    #[test]
    fn summaries_are_collected_per_binary() {
        let output = "running 2 tests\n\
                      test result: ok. 2 passed; 0 failed\n\
                      running 1 test\n\
                      test result: ok. 1 passed; 0 failed\n";
        assert_eq!(
            extract_test_summaries(output),
            ["ok. 2 passed; 0 failed", "ok. 1 passed; 0 failed"]
        );
    }
}
