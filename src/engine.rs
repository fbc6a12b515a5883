//! Decision and evaluation engine
//!
//! Pure computation over one cycle's inputs: the snapshot of live readings,
//! the available surplus, the per-channel on/off policy and the priority
//! ordered walk that applies it. Scheduling and I/O live in
//! [`crate::manager`].

pub mod balancing;
pub mod decision;
pub mod snapshot;
pub mod surplus;

pub use balancing::{BalancingEngine, CycleOutcome};
pub use decision::decide;
pub use snapshot::InputSnapshot;
pub use surplus::compute_available_surplus;
