//! Service configuration
//!
//! Loaded from TOML with [`Config::from_file`] or built from defaults plus
//! environment overrides with [`Config::from_env`]. Every section has
//! defaults, so a partial file is valid.

use crate::{Error, Result};
use message_bus::NatsConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Utbetaling store
    pub storage: utbetaling_core::Config,

    /// NATS connection
    pub nats: NatsConfig,

    /// Queue subjects
    pub queues: QueueConfig,

    /// Oppdrag dispatch
    pub dispatch: DispatchConfig,

    /// Reconciliation jobs
    pub avstemming: AvstemmingConfig,

    /// Leader election
    pub leader: LeaderConfig,
}

/// Queue subjects
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Outbound oppdrag
    pub send: String,
    /// Inbound kvitteringer
    pub reply: String,
    /// Grensesnittavstemming batches
    pub avstemming: String,
    /// Konsistensavstemming batches
    pub konsistensavstemming: String,
    /// Attested vedtak triggering dispatch
    pub vedtak: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            send: "etterlatte.oppdrag.send".to_string(),
            reply: "etterlatte.oppdrag.kvittering".to_string(),
            avstemming: "etterlatte.avstemming.grensesnitt".to_string(),
            konsistensavstemming: "etterlatte.avstemming.konsistens".to_string(),
            vedtak: "etterlatte.vedtak.attestert".to_string(),
        }
    }
}

/// Oppdrag dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Bound on a single send (ms)
    pub send_timeout_ms: u64,

    /// First retry delay (ms)
    pub retry_initial_interval_ms: u64,

    /// Longest retry delay (ms)
    pub retry_max_interval_ms: u64,

    /// Give up retrying after this long (ms)
    pub retry_max_elapsed_ms: u64,

    /// Priority for ordinary oppdrag (0-9)
    pub priority: u8,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5_000,
            retry_initial_interval_ms: 500,
            retry_max_interval_ms: 10_000,
            retry_max_elapsed_ms: 60_000,
            priority: 4,
        }
    }
}

/// Fixed-delay schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSchedule {
    /// Run the job at all
    pub enabled: bool,

    /// Delay before the first run (seconds)
    pub initial_delay_secs: u64,

    /// Delay between runs (seconds)
    pub period_secs: u64,
}

impl JobSchedule {
    /// Initial delay
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Period
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl Default for JobSchedule {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_secs: 120,
            period_secs: 24 * 60 * 60,
        }
    }
}

/// Reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvstemmingConfig {
    /// Max detail records per DATA message
    pub chunk_size: usize,

    /// Sending component code
    pub kilde_komponent: String,

    /// User reported as sender
    pub bruker_id: String,

    /// Daily interface reconciliation
    pub grensesnitt: JobSchedule,

    /// Periodic consistency reconciliation
    pub konsistens: JobSchedule,

    /// Ledger queried during konsistensavstemming; without one the
    /// ledger comparison is skipped
    pub ledger_url: Option<String>,

    /// Ledger request timeout
    pub ledger_timeout_ms: u64,
}

impl Default for AvstemmingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 70,
            kilde_komponent: "ETTERLAT".to_string(),
            bruker_id: "ETTERLAT".to_string(),
            grensesnitt: JobSchedule::default(),
            konsistens: JobSchedule {
                enabled: true,
                initial_delay_secs: 300,
                period_secs: 24 * 60 * 60,
            },
            ledger_url: None,
            ledger_timeout_ms: 5000,
        }
    }
}

/// Leader election configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderConfig {
    /// Elector endpoint; without one this instance always leads
    pub elector_url: Option<String>,

    /// Own identity, falls back to `HOSTNAME`
    pub hostname: Option<String>,

    /// Request timeout (ms)
    pub timeout_ms: u64,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            elector_url: None,
            hostname: None,
            timeout_ms: 2_000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("UTBETALING_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(url) = std::env::var("NATS_URL") {
            config.nats.url = url;
        }
        if let Ok(url) = std::env::var("ELECTOR_URL") {
            config.leader.elector_url = Some(url);
        }
        if let Ok(url) = std::env::var("OPPDRAG_LEDGER_URL") {
            config.avstemming.ledger_url = Some(url);
        }
        if let Ok(hostname) = std::env::var("HOSTNAME") {
            config.leader.hostname = Some(hostname);
        }
        if let Ok(chunk_size) = std::env::var("AVSTEMMING_CHUNK_SIZE") {
            config.avstemming.chunk_size = chunk_size
                .parse()
                .map_err(|e| Error::Config(format!("Invalid AVSTEMMING_CHUNK_SIZE: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the jobs cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.avstemming.chunk_size == 0 {
            return Err(Error::Config("avstemming.chunk_size must be positive".to_string()));
        }
        for (navn, schedule) in [
            ("grensesnitt", &self.avstemming.grensesnitt),
            ("konsistens", &self.avstemming.konsistens),
        ] {
            if schedule.enabled && schedule.period_secs == 0 {
                return Err(Error::Config(format!(
                    "avstemming.{}.period_secs must be positive",
                    navn
                )));
            }
        }
        if self.dispatch.priority > 9 {
            return Err(Error::Config("dispatch.priority must be 0-9".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.avstemming.chunk_size, 70);
        assert_eq!(config.queues.reply, "etterlatte.oppdrag.kvittering");
        assert!(config.leader.elector_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [avstemming]
            chunk_size = 2

            [avstemming.grensesnitt]
            period_secs = 60

            [leader]
            elector_url = "http://localhost:4040"
            "#,
        )
        .unwrap();

        assert_eq!(config.avstemming.chunk_size, 2);
        assert_eq!(config.avstemming.grensesnitt.period(), Duration::from_secs(60));
        assert_eq!(config.avstemming.grensesnitt.initial_delay_secs, 120);
        assert_eq!(config.leader.elector_url.as_deref(), Some("http://localhost:4040"));
        assert_eq!(config.dispatch.send_timeout_ms, 5_000);
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = Config::default();
        config.avstemming.chunk_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dispatch]\npriority = 7\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.dispatch.priority, 7);

        std::fs::write(&path, "[dispatch]\npriority = 12\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }
}
