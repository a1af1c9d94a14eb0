use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{self, Severity};

pub fn run(open: bool) -> Result<()> {
    step::banner("📚 Building documentation...");
    let start = Instant::now();

    let mut args = vec![
        "doc",
        "-p",
        "codec-core",
        "--no-deps",
        "--document-private-items",
        "--features",
        "std",
    ];
    if open {
        args.push("--open");
    }
    step::cargo("Documentation", &args, Severity::Fatal)?;

    if !open {
        println!(
            "   {}",
            "Open target/doc/codec_core/index.html in your browser".dimmed()
        );
        println!(
            "   {}",
            "Or run 'cargo run -p xtask -- doc --open'".dimmed()
        );
        println!();
    }

    step::done("Documentation built", start);
    Ok(())
}
