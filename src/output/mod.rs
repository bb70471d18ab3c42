pub mod formatters;
pub mod indicator;
pub mod link;

pub use formatters::{ConsoleFormatter, JsonFormatter, RecordFormatter};
pub use indicator::{Indicator, LogIndicator};
pub use link::{Addressee, Command, Destination, LinkEvent, LinkStatus, LoopbackLink, RadioLink, Tag};
