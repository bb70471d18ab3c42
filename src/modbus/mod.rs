pub mod client;
pub mod crc;
pub mod protocol;
pub mod simulated;

pub use client::RegisterTransport;
#[cfg(feature = "serial")]
pub use client::RtuClient;
pub use crc::crc16_modbus;
pub use protocol::WordOrder;
pub use simulated::SimulatedMeter;
