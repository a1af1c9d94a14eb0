use anyhow::Result;
use std::time::Instant;

use crate::step::{self, Severity};

/// Bare-metal target the firmware builds codec-core for.
const EMBEDDED_TARGET: &str = "thumbv7em-none-eabihf";

pub fn run() -> Result<()> {
    step::banner("🔍 Checking codec-core...");
    let total_start = Instant::now();

    // Host build with std error impls and tracing diagnostics.
    step::cargo(
        "Host check (std + tracing)",
        &["check", "-p", "codec-core", "--features", "std,tracing"],
        Severity::Fatal,
    )?;

    // no_std: no allocator, no std, silent diagnostics.
    step::cargo(
        "Embedded check (no_std)",
        &[
            "check",
            "-p",
            "codec-core",
            "--target",
            EMBEDDED_TARGET,
            "--no-default-features",
        ],
        Severity::Fatal,
    )?;

    step::cargo(
        "Embedded check (defmt)",
        &[
            "check",
            "-p",
            "codec-core",
            "--target",
            EMBEDDED_TARGET,
            "--features",
            "defmt",
        ],
        Severity::Fatal,
    )?;

    // Don't fail on clippy warnings or formatting, just show them.
    step::cargo(
        "Clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        Severity::Advisory,
    )?;
    let fmt = step::cargo("Format check", &["fmt", "--all", "--check"], Severity::Advisory)?;
    if !fmt.status.success() {
        eprintln!("     Run 'cargo fmt --all' to fix");
    }

    step::done("All checks completed", total_start);
    Ok(())
}
