use anyhow::{Context, Result};
use std::sync::Arc;
use surplus_manager::config::Config;
use surplus_manager::events::{EventBus, ItemEvent, ItemEventDispatcher};
use surplus_manager::logging::{get_logger, init_logging};
use surplus_manager::manager::EnergyManager;
use surplus_manager::output::{JsonLinesSink, OutputSink};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging).context("Failed to initialize logging")?;
    let logger = get_logger("host");
    logger.info(&format!(
        "Surplus Manager {} starting with {} manager(s)",
        env!("APP_VERSION"),
        config.managers.len()
    ));

    let dispatcher = Arc::new(ItemEventDispatcher::from_current()?);
    let bus = EventBus::new();
    bus.subscribe(dispatcher.clone());

    let sink: Arc<dyn OutputSink> = Arc::new(JsonLinesSink::stdout());
    let managers: Vec<EnergyManager> = config
        .managers
        .iter()
        .map(|section| EnergyManager::from_section(section, dispatcher.clone(), sink.clone()))
        .collect();
    for manager in &managers {
        if !manager.initialize() {
            error!("Manager {} did not start: {}", manager.id(), manager.status());
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<ItemEvent>(&line) {
                        Ok(event) => {
                            bus.publish(&event);
                        }
                        Err(e) => warn!("Ignoring malformed event line: {}", e),
                    }
                }
                Ok(None) => {
                    info!("Event feed closed, shutting down");
                    break;
                }
                Err(e) => {
                    error!("Failed to read event feed: {}", e);
                    break;
                }
            }
        }
    }

    for manager in &managers {
        manager.dispose();
    }
    dispatcher.shutdown();
    logger.info("Shutdown complete");
    Ok(())
}
