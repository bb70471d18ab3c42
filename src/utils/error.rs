use thiserror::Error;

use crate::storage::models::FileId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModbusError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("CRC checksum mismatch")]
    CrcError,

    #[error("Invalid response from device")]
    InvalidResponse,

    #[error("Device {address} answered with exception code 0x{code:02X}")]
    Exception { address: u8, code: u8 },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Timeout occurred")]
    Timeout,
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            ModbusError::Timeout
        } else {
            ModbusError::CommunicationError(format!("IO error: {}", err))
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("{record} record needs {expected} bytes, got {actual}")]
    Length {
        record: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File {0} does not exist")]
    NotFound(FileId),

    #[error("File {0} already exists")]
    AlreadyExists(FileId),

    #[error("Access to file {id} out of bounds: offset {offset} + {len} > {length}")]
    OutOfBounds {
        id: FileId,
        offset: usize,
        len: usize,
        length: usize,
    },

    #[error("File {id} is corrupt: {source}")]
    Corrupt {
        id: FileId,
        #[source]
        source: RecordError,
    },

    #[error("Persistence error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejections from [`crate::services::OutboundQueue::enqueue`]. The rejected
/// item is dropped; entries already queued are never evicted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue full, file {id} ({len} bytes) dropped")]
    Full { id: FileId, len: usize },

    #[error("File {id} is {len} bytes, maximum item size is {max}")]
    TooLarge { id: FileId, len: usize, max: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Link rejected command: {0}")]
    Rejected(String),

    #[error("Link not available: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Channel busy, a transmission is already in flight")]
    Busy,

    #[error("Session not initialised")]
    NotReady,

    #[error(transparent)]
    Link(#[from] LinkError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
