use anyhow::Result;
use chime::prelude::*;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "chime.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load the configuration; a missing file just means "no events".
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = ChimeConfig::load(Some(path.as_path()))?;
    info!(
        "{} v{} starting in {} with {} configured event(s).",
        chime::ENGINE_NAME.cyan().bold(),
        chime::VERSION,
        config.timezone,
        config.events.len()
    );

    // 3. One clock, shared by every event.
    let clock: Arc<dyn Clock> = Arc::new(config.system_clock());

    // 4. Build each event and drive it on its own task.
    for entry in &config.events {
        match Event::new(Some(&entry.spec), entry.close_event, clock.clone()) {
            Ok(event) => {
                info!("[{}] {}", entry.name.cyan(), event);
                tokio::spawn(drive(entry.clone(), event, clock.clone()));
            }
            Err(e) => warn!("[{}] skipped: {}", entry.name.red(), e),
        }
    }

    // 5. Run until Ctrl+C.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");
    Ok(())
}

/// Waits on `event` over and over, the way a job scheduler would.
async fn drive(entry: EventConfig, mut event: Event, clock: Arc<dyn Clock>) {
    loop {
        let now = clock.now();
        if event.has_final_event_occurred(now) {
            info!("[{}] final occurrence has passed; retiring.", entry.name.dimmed());
            return;
        }

        let waiter = event.waiter(now);
        info!("[{}] next at {}", entry.name.cyan(), waiter.target());
        let Some(fired_at) = waiter.await else {
            warn!("[{}] timer dropped before firing.", entry.name.red());
            return;
        };

        info!("<-- [{}] {} fired at {}", entry.name.green().bold(), event.kind(), fired_at);
        event.set_last_fired(fired_at);

        if !event.is_recurring() {
            return;
        }
    }
}
