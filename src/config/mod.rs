pub mod settings;

pub use settings::{
    Config,
    MeasurementConfig,
    MeterConfig,
    NetworkConfig,
    NodeConfig,
    ParityConfig,
    QueueConfig,
    StorageConfig,
    MAX_TX_POWER_DBM,
};
