// src/bin/repokit.rs

use colored::Colorize;
use std::io::Write as _;

/// The main entry point of the `repokit` binary. It sets up logging, hands
/// the raw arguments to the CLI pipeline, and performs centralized error
/// handling: every configuration defect exits non-zero before any step runs.
fn main() {
    init_logger();

    let argv: Vec<String> = std::env::args().collect();
    if let Err(e) = repokit::cli::run(argv) {
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Compact `[level]` log format; `RUST_LOG` overrides the default level.
fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let label = match record.level() {
                log::Level::Error => "[error]".red(),
                log::Level::Warn => "[warn]".yellow(),
                log::Level::Info => "[info]".cyan(),
                log::Level::Debug => "[debug]".dimmed(),
                log::Level::Trace => "[trace]".dimmed(),
            };
            writeln!(buf, "{} {}", label, record.args())
        })
        .init();
}
