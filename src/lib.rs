//! # Surplus Manager - priority-based energy surplus load controller
//!
//! Periodically decides which discretionary loads ("output channels") to
//! switch on or off, from live readings of production, grid exchange,
//! storage state and electricity price.
//!
//! ## Features
//!
//! - **Surplus calculation**: grid, storage and tolerated draw folded into one
//!   figure, with an optional inverter-limiting heuristic
//! - **Priority balancing**: one activation per cycle, least important loads
//!   shed first
//! - **Hysteresis**: minimum runtime and cooldown per channel
//! - **Price limits**: per-channel price ceiling and a negative-price override
//! - **Storage protection**: every load off below the minimum SOC
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration loading and validation
//! - `params`: Typed manager settings and channel parameters
//! - `value`: Item values and numeric coercion
//! - `state`: Per-manager input and output state
//! - `events`: Event bus and the item event dispatcher
//! - `engine`: Snapshot, surplus, per-channel decision and balancing
//! - `manager`: Controller lifecycle and the evaluation job
//! - `output`: Delivery of channel states
//! - `logging`: Structured logging and tracing

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod manager;
pub mod output;
pub mod params;
pub mod state;
pub mod value;

// Re-export commonly used types
pub use config::{Config, ManagerConfig};
pub use error::{ManagerError, Result};
pub use manager::{ChannelCommand, EnergyManager, ManagerStatus};
pub use value::{ItemValue, OnOff};
