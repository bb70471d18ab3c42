//! Energy telemetry node
//!
//! Periodically reads a three-phase power meter over Modbus RTU, stores the
//! result in a byte-packed energy file and pushes changed files to a gateway
//! through a bounded retry queue. All node logic runs as short tasks on a
//! cooperative tick scheduler.

pub mod cli;
pub mod config;
pub mod devices;
pub mod modbus;
pub mod output;
pub mod scheduler;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testing;

// Re-export commonly used types
pub use config::Config;
pub use devices::{RegisterReader, RegisterMap};
pub use modbus::{RegisterTransport, SimulatedMeter};
pub use output::{ConsoleFormatter, JsonFormatter, LinkEvent, RadioLink, RecordFormatter};
pub use scheduler::{Scheduler, Task, Ticks, TimerQueue};
pub use services::{NodeRuntime, OutboundQueue, TelemetryNode, TransmissionSession};
pub use storage::{EnergyFile, FileStore, MemoryStore};
pub use utils::error::{ModbusError, StoreError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
