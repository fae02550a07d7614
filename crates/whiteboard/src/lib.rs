//! The switchyard whiteboard engine.
//!
//! Wires the provider store to a debounced, single-worker reconciliation loop
//! and reflects every pass onto a [`Container`] through the
//! [`DeploymentDriver`]. Observers read the outcome from the [`StatusBoard`].
//!
//! # Modules
//!
//! - [`config`] - TOML configuration and runtime properties
//! - [`container`] - Container abstraction consumed by the driver
//! - [`driver`] - Diff of accepted applications against live deployments
//! - [`engine`] - The [`Whiteboard`] itself
//! - [`status`] - Introspection snapshot and its publication

pub mod config;
pub mod container;
pub mod driver;
pub mod engine;
mod error;
pub mod status;

pub use config::{ConfigError, RuntimeProperties, WhiteboardConfig};
pub use container::{Container, ContainerCall, ContainerError, MemoryContainer, MemoryHandle, Operation};
pub use driver::{DeploymentDriver, DriverReport};
pub use engine::{PassEvent, Whiteboard};
pub use error::WhiteboardError;
pub use status::{ApplicationStatus, BoardState, FailedStatus, RuntimeStatus, StatusBoard};
pub use switchyard_registry as registry;
