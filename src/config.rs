use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_STRATEGY: &str = "fifo";
const DEFAULT_RESERVATION_TTL_SECS: u64 = 3600;
const DEFAULT_SWEEP_BATCH_SIZE: usize = 500;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const CONFIG_DIR: &str = "config";

/// Engine configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Allocation strategy used when a caller does not name one.
    #[serde(default = "default_strategy")]
    #[validate(length(min = 1))]
    pub default_strategy: String,

    /// Reservation expiry applied when a caller does not supply one.
    #[serde(default = "default_reservation_ttl_secs")]
    #[validate(range(min = 1))]
    pub reservation_ttl_secs: u64,

    /// Advisory upper bound on reservations processed per sweep run.
    #[serde(default = "default_sweep_batch_size")]
    #[validate(range(min = 1))]
    pub sweep_batch_size: usize,

    /// Capacity of the domain event channel.
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,
}

fn default_strategy() -> String {
    DEFAULT_STRATEGY.to_string()
}

fn default_reservation_ttl_secs() -> u64 {
    DEFAULT_RESERVATION_TTL_SECS
}

fn default_sweep_batch_size() -> usize {
    DEFAULT_SWEEP_BATCH_SIZE
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_strategy: default_strategy(),
            reservation_ttl_secs: default_reservation_ttl_secs(),
            sweep_batch_size: default_sweep_batch_size(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `config/{run_mode}.toml` (if present)
    /// layered under `BATCHSTOCK_`-prefixed environment variables,
    /// falling back to built-in defaults.
    pub fn load(run_mode: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("default_strategy", DEFAULT_STRATEGY)?
            .set_default("reservation_ttl_secs", DEFAULT_RESERVATION_TTL_SECS as i64)?
            .set_default("sweep_batch_size", DEFAULT_SWEEP_BATCH_SIZE as i64)?
            .set_default(
                "event_channel_capacity",
                DEFAULT_EVENT_CHANNEL_CAPACITY as i64,
            )?;

        let file = Path::new(CONFIG_DIR).join(format!("{}.toml", run_mode));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }

        let settings = builder
            .add_source(Environment::with_prefix("BATCHSTOCK"))
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

        info!(
            default_strategy = %config.default_strategy,
            reservation_ttl_secs = config.reservation_ttl_secs,
            "Engine configuration loaded"
        );
        Ok(config)
    }

    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.reservation_ttl_secs as i64)
    }
}
