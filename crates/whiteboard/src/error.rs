use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the engine's own lifecycle.
///
/// Provider problems never show up here; they are reported through the
/// status snapshot.
#[derive(Debug, Error)]
pub enum WhiteboardError {
	#[error("invalid configuration: {0}")]
	Config(#[from] ConfigError),

	#[error("no tokio runtime is running on this thread")]
	NoRuntime,

	#[error("whiteboard is shut down")]
	ShutDown,

	#[error("shutdown did not finish within {0:?}")]
	ShutdownTimedOut(Duration),
}
