mod config;
mod enrich;
mod runner;

use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use config::AnalyzerConfig;
use enrich::NullResolver;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AnalyzerConfig::load(config_path.as_deref())?;

    info!(
        window_secs = config.detection.window_secs,
        rules = config.detection.rules.len(),
        contamination = config.detection.contamination,
        "authwatch started"
    );

    let report = match (&config.input_path, &config.output_path) {
        (Some(input), Some(output)) => {
            let reader = BufReader::new(
                std::fs::File::open(input)
                    .with_context(|| format!("opening input {}", input.display()))?,
            );
            let mut writer = BufWriter::new(
                std::fs::File::create(output)
                    .with_context(|| format!("creating output {}", output.display()))?,
            );
            let report = runner::run(&config, reader, &mut writer, &NullResolver)?;
            writer.flush().context("flushing output")?;
            report
        }
        (Some(input), None) => {
            let reader = BufReader::new(
                std::fs::File::open(input)
                    .with_context(|| format!("opening input {}", input.display()))?,
            );
            runner::run(&config, reader, &mut std::io::stdout().lock(), &NullResolver)?
        }
        (None, Some(output)) => {
            let mut writer = BufWriter::new(
                std::fs::File::create(output)
                    .with_context(|| format!("creating output {}", output.display()))?,
            );
            let report = runner::run(
                &config,
                std::io::stdin().lock(),
                &mut writer,
                &NullResolver,
            )?;
            writer.flush().context("flushing output")?;
            report
        }
        (None, None) => runner::run(
            &config,
            std::io::stdin().lock(),
            &mut std::io::stdout().lock(),
            &NullResolver,
        )?,
    };

    info!(
        records = report.total_records,
        malformed = report.malformed_records,
        alerts = report.alerts_emitted,
        "authwatch finished"
    );
    Ok(())
}
