//! Session Engine replay inspector
//!
//! Reads an exported event log (one JSON event per line), rebuilds every
//! session write model from it and prints the derived session facts:
//! - lifecycle state and identified user
//! - authentication instant and factors
//! - outstanding WebAuthN challenge and expiration

use std::io::Write;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use eventstore::{load, InMemoryEventStore};
use session_commands::SessionView;
use session_core::{Event, SessionWriteModel, SESSION_AGGREGATE_TYPE};
use telemetry::{init_tracing, metrics, TracingConfig};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_log_filter")]
    log_filter: String,
    #[serde(default)]
    log_json: bool,

    /// Exported event log to replay, one JSON event per line
    #[serde(default)]
    replay_path: Option<String>,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            log_json: false,
            replay_path: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = load_config()?;

    init_tracing(
        TracingConfig::new()
            .with_filter(config.log_filter.clone())
            .with_json(config.log_json),
    );

    info!("Starting Session Engine v{}", env!("CARGO_PKG_VERSION"));

    // A path on the command line wins over the configured one
    let path = std::env::args()
        .nth(1)
        .or_else(|| config.replay_path.clone())
        .context("No event log given: pass a path or set SESSION__REPLAY_PATH")?;

    let events = read_events(&path).await?;
    info!(path = %path, events = events.len(), "Loaded event log");

    let store = InMemoryEventStore::from_events(events)
        .with_context(|| format!("Event log {path} is out of order"))?;

    let mut stdout = std::io::stdout().lock();
    let mut failed = 0usize;
    for (aggregate_type, id) in store.aggregates() {
        if aggregate_type != SESSION_AGGREGATE_TYPE {
            warn!(aggregate_type = %aggregate_type, id = %id, "Skipping non-session aggregate");
            continue;
        }

        let mut model = SessionWriteModel::new(id.clone(), None);
        if let Err(e) = load(&store, &mut model).await {
            error!(session_id = %id, error = %e, "Failed to replay session");
            failed += 1;
            continue;
        }

        let view = SessionView::from(&model);
        let line = serde_json::to_string(&view).context("Failed to encode session view")?;
        writeln!(stdout, "{line}").context("Failed to write session view")?;
    }

    let snapshot = metrics().snapshot();
    info!(
        folded = snapshot.events_folded,
        malformed = snapshot.malformed_events,
        failed,
        "Replay complete"
    );

    if failed > 0 {
        bail!("{failed} session(s) failed to replay");
    }
    Ok(())
}

/// Reads a JSON-lines event log, skipping blank lines.
async fn read_events(path: &str) -> Result<Vec<Event>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read event log {path}"))?;

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid event on line {} of {path}", n + 1))
        })
        .collect()
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("SESSION")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
