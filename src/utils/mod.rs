pub mod error;

pub use error::{ConfigError, LinkError, ModbusError, QueueError, RecordError, SessionError, StoreError};
