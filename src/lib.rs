//! Room-level location inference for wearable proximity sensors.
//!
//! Each mobile mote's closest room beacon is estimated per time step from the
//! beacon powers it and its nearby motes heard, then short A -> B -> A
//! flickers are smoothed out of the resulting room sequence.

pub mod config;
pub mod error;
pub mod estimator;
pub mod io;
pub mod kernel;
pub mod observation;
pub mod pipeline;
pub mod signal;
pub mod smoothing;
pub mod store;
pub mod types;

pub use config::LocatorConfig;
pub use error::{LocatorError, Result};
pub use estimator::{Estimate, LocationEstimator, DEFAULT_THRESHOLD_MW};
pub use kernel::Kernel;
pub use observation::{InstantSnapshot, Observation, StationarySignal};
pub use smoothing::{CorrectionPattern, PatternSmoother, SmoothingReport};
pub use store::{Dataset, ObservationStore, RoomSequence};
pub use types::{MoteId, MoteKind, RoomId, TimeRange, Timestamp, UNKNOWN_ROOM};
