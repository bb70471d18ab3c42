pub mod button_files;
pub mod energy_files;
pub mod measurement;
pub mod node;
pub mod outbound_queue;
pub mod runtime;
pub mod transmission;

pub use button_files::ButtonFiles;
pub use energy_files::EnergyFiles;
pub use measurement::{MeasurementOrchestrator, Phase, PhaseOutcome};
pub use node::TelemetryNode;
pub use outbound_queue::{ByteRing, OutboundFile, OutboundQueue};
pub use runtime::NodeRuntime;
pub use transmission::{InFlight, NetworkQuality, SessionState, TransmissionSession};
