//! Topology Module
//!
//! Immutable, time-stamped read model of the overlay relay network.
//! The snapshot is produced by an external fetcher; the engine only
//! reads it.
//!
//! ## Structure
//! - `types`: Relay, RelayFlag, TopologySnapshot (data only)
//! - `view`: TopologyView - lookups, selection probability, path feasibility

pub mod types;
pub mod view;

pub use types::{is_valid_fingerprint, Relay, RelayFlag, TopologySnapshot};
pub use view::{PathFeasibility, TopologyView};
