pub mod acquisition;
pub mod power_meter;

pub use acquisition::{Acquisition, RegisterReader, ScaledReading};
pub use power_meter::{populate_demo_meter, Quantity, RegisterGroup, RegisterMap};
