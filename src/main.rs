use anyhow::Context;
use mtf_sr::annotation::{annotate_confluence, annotate_dominant};
use mtf_sr::{config::Config, CsvBarSource, JsonLinesSink, Replayer};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let source = Arc::new(CsvBarSource::new(config.data_dir.clone()));
    let replayer = Replayer::new(source, config.engine_settings());

    let report = replayer
        .replay(&config.timeframes)
        .await
        .with_context(|| format!("replaying bars from {}", config.data_dir.display()))?;

    for selection in &report.output.selections {
        let dominant = &selection.dominant;
        if let Some(level) = &dominant.resistance {
            tracing::info!("{} HR: {}", selection.timeframe, level.describe(" | "));
        }
        if let Some(level) = &dominant.support {
            tracing::info!("{} LS: {}", selection.timeframe, level.describe(" | "));
        }
    }
    for pair in &report.output.confluences {
        tracing::info!(
            "{}/{} signal {}",
            pair.higher,
            pair.lower,
            pair.confluence.signal.as_i8()
        );
    }

    let chart = config.chart_timeframe;
    let chart_index = report
        .engine
        .frame(chart)
        .and_then(|frame| frame.series().last_index())
        .unwrap_or(0);

    let stdout = std::io::stdout();
    let mut sink = JsonLinesSink::new(stdout.lock());
    for selection in &report.output.selections {
        annotate_dominant(
            &mut sink,
            selection,
            chart,
            chart_index,
            &config.styling(selection.timeframe),
        )
        .context("writing level annotations")?;
    }
    for pair in &report.output.confluences {
        annotate_confluence(&mut sink, pair, chart, &config.styling(pair.lower))
            .context("writing confluence annotations")?;
    }
    sink.flush().context("flushing annotations")?;

    tracing::info!(
        "Processed {} bars, {} signal changes",
        report.bars_processed,
        report.signal_changes.len()
    );
    Ok(())
}
