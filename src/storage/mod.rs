pub mod layout;
pub mod models;
pub mod store;

pub use layout::{FieldSpec, RecordLayout};
pub use models::{
    ButtonConfigFile, ButtonFile, EnergyConfigFile, EnergyFile, FileHeader, FileId, Record,
    StorageClass,
};
pub use store::{load_or_init, read_record, write_record, FileStore, MemoryStore};
