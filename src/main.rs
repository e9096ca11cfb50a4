use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use perfwatch::{
    init_logging, HealthMonitor, MemoryIntrospector, MonitorConfig, MonitorStatus,
    RequestStatsCollector, Result,
};

mod app_config;

use app_config::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "perfwatch failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = MonitorConfig::load(cli.config.as_deref())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging)?;

    info!(command = cli.command.name(), "Starting perfwatch");

    match cli.command {
        Commands::Run { report_every } => run_monitor(config, report_every).await,
        Commands::Status => print_status(config).await,
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Validate => {
            config.validate()?;
            println!("Configuration is valid");
            Ok(())
        }
    }
}

/// The standalone binary serves no requests, so nothing calls
/// `RequestStatsCollector::record` and request figures read zero: degradation
/// and the response-time and error-rate ceilings stay quiet. Hosts embedding
/// the library feed the collector from their request path instead.
fn build_monitor(config: MonitorConfig) -> Result<Arc<HealthMonitor>> {
    let memory: Arc<dyn MemoryIntrospector> =
        Arc::from(perfwatch::monitoring::create_introspector());
    let window = config.degradation.check_interval;
    let collector =
        RequestStatsCollector::new(window).with_memory_introspector(Arc::clone(&memory));
    info!("No request traffic in standalone mode; only memory is monitored");

    HealthMonitor::builder(config)
        .metrics_provider(Arc::new(collector))
        .memory_introspector(memory)
        .build()
}

async fn run_monitor(config: MonitorConfig, report_every: Duration) -> Result<()> {
    let monitor = build_monitor(config)?;
    let mut events = monitor.events().receiver();
    monitor.start()?;

    let mut report = tokio::time::interval(report_every);
    report.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = report.tick() => {
                print_summary(&monitor.get_status());
            }
            event = events.recv() => {
                if let Ok(event) = event {
                    info!(event = event.name(), "Monitor event");
                }
            }
        }
    }

    monitor.stop();
    Ok(())
}

async fn print_status(config: MonitorConfig) -> Result<()> {
    let monitor = build_monitor(config)?;
    monitor.run_leak_check();
    monitor.run_degradation_check().await;

    println!("{}", serde_json::to_string_pretty(&monitor.get_status())?);
    Ok(())
}

fn print_summary(status: &MonitorStatus) {
    println!(
        "heap {:.1} MB ({:.1}%) | rt {:.1} ms | errors {:.2}% | leaks {} | degradations {}",
        status.readings.memory_usage_mb,
        status.readings.heap_utilization_pct,
        status.readings.avg_response_time_ms,
        status.readings.error_rate_pct,
        status.detections.memory_leaks,
        status.detections.degradations,
    );
    for recommendation in &status.recommendations {
        println!("  - {}", recommendation);
    }
}
