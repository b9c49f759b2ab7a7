#![warn(clippy::uninlined_format_args)]

mod config;
mod render;

use std::{borrow::Cow, env, process};

use config::AppConfig;
use render::render_report;
use splitledger_application::{LedgerProcessor, SnapshotSource};
use splitledger_infrastructure::{GreedySettlementOptimizer, JsonSnapshotSource};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Cow<'static, str>>;

fn main() {
    init_logging();

    if let Err(err) = run() {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> CliResult<()> {
    let Some(path) = env::args().nth(1) else {
        return Err("Usage: splitledger <snapshot.json>".into());
    };

    let config = AppConfig::from_env().map_err(|err| format!("Invalid configuration: {err}"))?;
    let snapshot = JsonSnapshotSource::new(&path)
        .load()
        .map_err(|err| format!("Failed to load '{path}': {err}"))?;

    let processor = LedgerProcessor::new(&GreedySettlementOptimizer, config.context);
    let reports = match config.group {
        Some(group_id) => vec![processor.report(&snapshot, group_id)],
        None => snapshot
            .groups
            .iter()
            .map(|group| processor.report(&snapshot, group.id))
            .collect(),
    };

    let mut failed = 0usize;
    for (idx, report) in reports.into_iter().enumerate() {
        if idx > 0 {
            println!();
        }
        match report {
            Ok(report) => print!("{}", render_report(&report, config.context)),
            Err(err) => {
                tracing::error!(error = %err, "Failed to build group report");
                eprintln!("Error: {err}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(format!("{failed} group report(s) could not be built").into());
    }
    Ok(())
}
