pub mod collector;
pub mod connector;
pub mod metrics;
pub mod protocol;

pub use collector::{AcquisitionCollector, ImageCollector, MessageCollector};
pub use connector::{Connector, SessionState};
pub use metrics::TransferMetrics;
