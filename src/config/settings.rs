use clap::ArgMatches;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::devices::power_meter::{Quantity, RegisterMap};
use crate::modbus::WordOrder;
use crate::output::link::Destination;
use crate::scheduler::Ticks;
use crate::storage::models::{EnergyFile, Record};
use crate::utils::error::ConfigError;

pub const MAX_TX_POWER_DBM: u8 = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub meter: MeterConfig,
    pub measurement: MeasurementConfig,
    pub queue: QueueConfig,
    pub network: NetworkConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub uuid: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    pub parity: ParityConfig,
    pub timeout_ms: u64,
    pub turnaround_ms: u64,
    pub device_address: u8,
    pub word_order: WordOrder,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub registers: RegisterMap,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    pub interval_secs: u32,
    pub enabled: bool,
    pub step_delay_ticks: Ticks,
    pub abort_on_failure: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_entries: usize,
    pub max_item_size: usize,
    pub max_attempts: u32,
    pub debounce_ticks: Ticks,
    pub flash_on_empty: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub tx_power_dbm: u8,
    pub timeout_ticks: Ticks,
    pub destination: Destination,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub persistence_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParityConfig {
    #[default]
    None,
    Even,
    Odd,
}

impl fmt::Display for ParityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParityConfig::None => "none",
            ParityConfig::Even => "even",
            ParityConfig::Odd => "odd",
        };
        f.write_str(name)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            name: "Energy Telemetry Node".to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: 19200,
            parity: ParityConfig::None,
            timeout_ms: 500,
            turnaround_ms: 5,
            device_address: 1,
            word_order: WordOrder::Cdab,
            max_attempts: 10,
            retry_backoff_ms: 0,
            registers: RegisterMap::default(),
        }
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15 * 60,
            enabled: true,
            step_delay_ticks: 50,
            abort_on_failure: false,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_entries: 20,
            max_item_size: 70,
            max_attempts: 10,
            debounce_ticks: 50,
            flash_on_empty: true,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tx_power_dbm: 17,
            timeout_ticks: 10_000,
            destination: Destination::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Config = toml::from_str(&content)?;

        if config.node.uuid.is_empty() {
            config.node.uuid = Uuid::new_v4().to_string();
        }
        if config.node.version.is_empty() {
            config.node.version = crate::VERSION.to_string();
        }

        config.validate()?;
        info!("📋 Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ConfigError> {
        let mut config = match matches.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_matches(matches)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_matches(&mut self, matches: &ArgMatches) -> Result<(), ConfigError> {
        if let Some(port) = matches.get_one::<String>("port") {
            self.meter.serial_port = port.clone();
        }
        if let Some(baud) = matches.get_one::<String>("baud") {
            self.meter.baud_rate = baud.parse().map_err(|_| ConfigError::Invalid {
                field: "meter.baud_rate",
                reason: format!("'{}' is not a number", baud),
            })?;
        }
        if let Some(address) = matches.get_one::<String>("address") {
            self.meter.device_address = address.parse().map_err(|_| ConfigError::Invalid {
                field: "meter.device_address",
                reason: format!("'{}' is not a number", address),
            })?;
        }
        if let Some(interval) = matches.get_one::<String>("interval") {
            self.measurement.interval_secs =
                interval.parse().map_err(|_| ConfigError::Invalid {
                    field: "measurement.interval_secs",
                    reason: format!("'{}' is not a number", interval),
                })?;
        }
        if let Some(dir) = matches.get_one::<String>("data-dir") {
            self.storage.persistence_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=247).contains(&self.meter.device_address) {
            return Err(ConfigError::Invalid {
                field: "meter.device_address",
                reason: format!("{} is outside 1..=247", self.meter.device_address),
            });
        }
        if self.meter.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "meter.max_attempts",
                reason: "at least one attempt is needed".to_string(),
            });
        }
        for quantity in Quantity::ALL {
            quantity
                .group(&self.meter.registers)
                .check()
                .map_err(|reason| ConfigError::Invalid {
                    field: "meter.registers",
                    reason: format!("{}: {}", quantity, reason),
                })?;
        }
        // a zero step delay with a zero interval never lets the clock move
        if self.measurement.step_delay_ticks == 0 {
            return Err(ConfigError::Invalid {
                field: "measurement.step_delay_ticks",
                reason: "phases need at least one tick between them".to_string(),
            });
        }
        if self.queue.max_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "queue.max_entries",
                reason: "the queue needs room for one entry".to_string(),
            });
        }
        // lengths travel as one byte in the metadata ring
        if self.queue.max_item_size > u8::MAX as usize {
            return Err(ConfigError::Invalid {
                field: "queue.max_item_size",
                reason: format!("{} does not fit in one byte", self.queue.max_item_size),
            });
        }
        if self.queue.max_item_size < EnergyFile::LAYOUT.size {
            return Err(ConfigError::Invalid {
                field: "queue.max_item_size",
                reason: format!(
                    "{} is smaller than the {} byte energy record",
                    self.queue.max_item_size,
                    EnergyFile::LAYOUT.size
                ),
            });
        }
        if self.queue.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "queue.max_attempts",
                reason: "at least one attempt is needed".to_string(),
            });
        }
        if self.network.tx_power_dbm > MAX_TX_POWER_DBM {
            return Err(ConfigError::Invalid {
                field: "network.tx_power_dbm",
                reason: format!("{} dBm exceeds {} dBm", self.network.tx_power_dbm, MAX_TX_POWER_DBM),
            });
        }
        if self.network.timeout_ticks == 0 {
            warn!("⚠️  network.timeout_ticks is 0, every transmission will time out immediately");
        }
        Ok(())
    }
}
